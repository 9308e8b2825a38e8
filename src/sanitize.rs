//! Sanitization engine (spec §4.5): the final pre-emit pass, stripping
//! terminal control/escape sequences from every string leaf.
//!
//! Pure and infallible — this stage cannot fail by construction, matching
//! spec's "Pure; does not fail."

use lazy_static::lazy_static;
use regex::Regex;

use crate::value::{Record, Value};

lazy_static! {
    /// Matches the CSI/OSC escape-sequence family: `ESC [ ... letter` (CSI,
    /// covers ANSI color/cursor codes) and `ESC ] ... (BEL | ESC \\)` (OSC,
    /// covers hyperlinks/title-setting sequences), plus bare two-byte
    /// escapes like `ESC c`.
    static ref ESCAPE_SEQUENCE: Regex = Regex::new(
        r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]"
    )
    .expect("escape sequence pattern is a valid, pre-tested regex");
}

/// Strip escape sequences from one string.
pub fn strip_escape_sequences(input: &str) -> String {
    ESCAPE_SEQUENCE.replace_all(input, "").into_owned()
}

/// Sanitize a whole record tree. Only plain mappings, sequences, strings,
/// and primitives are descended into — byte-string leaves and other opaque
/// types this crate's [`crate::value::Value`] cannot represent are, by
/// construction, outside this function's domain.
pub fn sanitize(record: Record) -> Record {
    record
        .into_iter()
        .map(|(key, value)| (key, sanitize_value(value)))
        .collect()
}

fn sanitize_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(strip_escape_sequences(&s)),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, sanitize_value(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_value).collect()),
        other => other,
    }
}
