//! Masking engine (spec §4.4): rule-driven redaction over an arbitrary
//! record tree.
//!
//! Cycle handling (spec §4.4 "Cycles") is a non-issue for this
//! implementation: `serde_json::Value` is a strict tree — it owns its
//! children rather than sharing references — so a circular record simply
//! cannot be constructed in safe Rust. No flattening pass or visited-set is
//! needed; this is recorded as the resolved design note in `DESIGN.md`.

pub mod url;

use std::collections::HashSet;

use parking_lot::RwLock;
use regex::Regex;

use crate::value::{Record, Value};

/// Depth bound used when the caller doesn't configure one. Spec §4.4
/// suggests "3-10, configurable"; 6 covers the common
/// `{user: {address: {street: ...}}}` shapes this pipeline sees without
/// letting a maliciously deep payload blow the stack.
pub const DEFAULT_MAX_DEPTH: usize = 6;

/// Default full-replacement mask string (spec §6 `masking.maskChar`).
pub const DEFAULT_MASK: &str = "******";

/// How a matched field's value is replaced.
#[derive(Debug, Clone)]
pub enum MaskStrategy {
    /// Replace with the fixed mask string.
    Full,
    /// Mask string concatenated with the last `show_last` characters of the
    /// stringified value.
    Partial { show_last: usize },
    /// First character of the mask string repeated `|value|` times
    /// (minimum one).
    PreserveLength,
}

/// Either a literal key name or a pattern matched against dot-joined key
/// paths.
#[derive(Debug, Clone)]
pub enum Selector {
    Literal(String),
    Pattern(Regex),
}

/// A single `(selector, strategy)` masking directive.
#[derive(Debug, Clone)]
pub struct MaskRule {
    pub selector: Selector,
    pub strategy: MaskStrategy,
}

impl MaskRule {
    pub fn literal(key: impl Into<String>, strategy: MaskStrategy) -> Self {
        Self {
            selector: Selector::Literal(key.into()),
            strategy,
        }
    }

    pub fn pattern(regex: Regex, strategy: MaskStrategy) -> Self {
        Self {
            selector: Selector::Pattern(regex),
            strategy,
        }
    }
}

/// Rule set is additive-only at runtime (spec §4.4 "Configuration is
/// additive... existing rules may not be removed — this is a security
/// property"): there is no method to remove or replace a rule, only
/// [`MaskingEngine::add_rule`].
pub struct MaskingEngine {
    rules: RwLock<Vec<MaskRule>>,
    /// Lowercased literal key names, used only by the URL-segment rule
    /// (spec §4.4 step 3, §7 "known design trade-off" — pattern rules never
    /// apply to URL-segment expansion).
    literal_keys: RwLock<HashSet<String>>,
    mask_char: String,
    max_depth: usize,
}

impl MaskingEngine {
    pub fn new(mask_char: impl Into<String>, max_depth: usize) -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
            literal_keys: RwLock::new(HashSet::new()),
            mask_char: mask_char.into(),
            max_depth,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_MASK, DEFAULT_MAX_DEPTH)
    }

    /// Add a rule. Duplicate literal-key rules are silently ignored (spec
    /// §4.4 "Duplicates are silently ignored"); pattern rules are compared
    /// by source string for the same purpose.
    pub fn add_rule(&self, rule: MaskRule) {
        let mut rules = self.rules.write();
        let is_duplicate = rules.iter().any(|existing| match (&existing.selector, &rule.selector) {
            (Selector::Literal(a), Selector::Literal(b)) => a.eq_ignore_ascii_case(b),
            (Selector::Pattern(a), Selector::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        });
        if is_duplicate {
            return;
        }
        if let Selector::Literal(name) = &rule.selector {
            self.literal_keys.write().insert(name.to_ascii_lowercase());
        }
        rules.push(rule);
    }

    /// Apply every rule to `record`, returning a new, redacted tree.
    pub fn apply(&self, record: Record) -> Record {
        let rules = self.rules.read();
        let literal_keys = self.literal_keys.read();
        let mut out = Record::new();
        for (key, value) in record {
            let masked = self.mask_field(&key, &key, value, 1, &rules, &literal_keys);
            out.insert(key, masked);
        }
        out
    }

    fn mask_field(
        &self,
        key: &str,
        key_path: &str,
        value: Value,
        depth: usize,
        rules: &[MaskRule],
        literal_keys: &HashSet<String>,
    ) -> Value {
        if let Some(strategy) = self.match_rule(key, key_path, rules) {
            return self.apply_strategy(&value, &strategy);
        }
        self.recurse(value, key_path, depth, rules, literal_keys)
    }

    fn match_rule<'a>(&self, key: &str, key_path: &str, rules: &'a [MaskRule]) -> Option<MaskStrategy> {
        rules.iter().find_map(|rule| match &rule.selector {
            Selector::Literal(name) => name.eq_ignore_ascii_case(key).then(|| rule.strategy.clone()),
            Selector::Pattern(re) => re.is_match(key_path).then(|| rule.strategy.clone()),
        })
    }

    fn recurse(
        &self,
        value: Value,
        key_path: &str,
        depth: usize,
        rules: &[MaskRule],
        literal_keys: &HashSet<String>,
    ) -> Value {
        if depth > self.max_depth {
            return value;
        }
        match value {
            Value::Object(map) => {
                let mut out = Record::new();
                for (k, v) in map {
                    let child_path = format!("{key_path}.{k}");
                    let masked = self.mask_field(&k, &child_path, v, depth + 1, rules, literal_keys);
                    out.insert(k, masked);
                }
                Value::Object(out)
            }
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| self.recurse(item, key_path, depth + 1, rules, literal_keys))
                    .collect(),
            ),
            Value::String(s) => Value::String(url::mask_sensitive_segments(
                &s,
                literal_keys,
                &self.mask_char,
            )),
            other => other,
        }
    }

    fn apply_strategy(&self, value: &Value, strategy: &MaskStrategy) -> Value {
        match strategy {
            MaskStrategy::Full => Value::String(self.mask_char.clone()),
            MaskStrategy::Partial { show_last } => {
                let stringified = stringify(value);
                let tail: String = stringified
                    .chars()
                    .rev()
                    .take(*show_last)
                    .collect::<Vec<_>>()
                    .into_iter()
                    .rev()
                    .collect();
                Value::String(format!("{}{}", self.mask_char, tail))
            }
            MaskStrategy::PreserveLength => {
                let stringified = stringify(value);
                let len = stringified.chars().count().max(1);
                let fill = self.mask_char.chars().next().unwrap_or('*');
                Value::String(std::iter::repeat(fill).take(len).collect())
            }
        }
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
