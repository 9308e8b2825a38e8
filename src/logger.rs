//! The logger (spec §4.7): the public entry point that composes every
//! pipeline stage, plus [`LoggerConfig`], which assembles one from the
//! options in spec §6.
//!
//! Dispatch to sinks runs on a dedicated background task drained from an
//! unbounded channel, one record at a time, in the order they were sent —
//! the same decoupling idiom `slog-async` uses (see the `logging` crate in
//! the Kata Containers pack this project's teacher sits beside). This is
//! what gives fire-and-forget semantics (spec §8 scenario 10: a sink whose
//! `log` never resolves must not block the next call) while still
//! satisfying the per-sink ordering invariant (spec §8 property 4),
//! because one task draining one channel can never reorder what it
//! received.
//!
//! Building a [`Logger`] spawns that background task, so
//! [`LoggerConfig::build`] must run inside a Tokio runtime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tokio::sync::{mpsc, oneshot};

use crate::context;
use crate::context::matrix::LoggingMatrix;
use crate::error::{ConfigError, ShutdownError};
use crate::level::{is_enabled, Level};
use crate::masking::{MaskRule, MaskStrategy, MaskingEngine, Selector, DEFAULT_MASK, DEFAULT_MAX_DEPTH};
use crate::sanitize::sanitize;
use crate::serializer::{RenderFn, ReportSink, SerializerRegistry, DEFAULT_TIMEOUT_MS};
use crate::sink::Sink;
use crate::value::{merge_into, merged, Record, Value};

/// A sensitive field named by the simple configuration surface
/// (`masking.fields`). For heterogeneous per-field strategies, add rules
/// directly to [`Logger::masking_engine`] instead.
pub enum MaskField {
    Literal(String),
    Pattern(String),
}

/// Global strategy applied to every [`MaskField`] listed in
/// [`LoggerConfig::masking_fields`] (spec §6 `masking.style`).
#[derive(Debug, Clone, Copy)]
pub enum MaskStyle {
    Fixed,
    PreserveLength,
}

/// Mirrors the configuration object of spec §6.
pub struct LoggerConfig {
    pub service_name: String,
    pub level: Level,
    pub sinks: Vec<Arc<dyn Sink>>,
    pub serializers: HashMap<String, RenderFn>,
    pub serializer_timeout_ms: u64,
    pub correlation_id_header: String,
    pub transaction_id_header: String,
    pub masking_fields: Vec<MaskField>,
    pub mask_char: String,
    pub mask_style: MaskStyle,
    pub mask_max_depth: usize,
    pub logging_matrix: Option<LoggingMatrix>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            service_name: String::new(),
            level: Level::Info,
            sinks: Vec::new(),
            serializers: HashMap::new(),
            serializer_timeout_ms: DEFAULT_TIMEOUT_MS,
            correlation_id_header: "x-correlation-id".to_string(),
            transaction_id_header: "x-trace-id".to_string(),
            masking_fields: Vec::new(),
            mask_char: DEFAULT_MASK.to_string(),
            mask_style: MaskStyle::Fixed,
            mask_max_depth: DEFAULT_MAX_DEPTH,
            logging_matrix: None,
        }
    }
}

impl LoggerConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Self::default()
        }
    }

    /// Validate the configuration and assemble a root [`Logger`]. Must be
    /// called from within a Tokio runtime.
    pub fn build(self) -> Result<Logger, ConfigError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::EmptyServiceName);
        }
        if self.serializer_timeout_ms == 0 {
            return Err(ConfigError::InvalidSerializerTimeout(0));
        }
        if self.mask_char.is_empty() {
            return Err(ConfigError::EmptyMaskChar);
        }
        if self.mask_max_depth == 0 {
            return Err(ConfigError::InvalidMaxDepth(0));
        }

        context::configure_headers(&self.correlation_id_header, &self.transaction_id_header);
        context::configure_matrix(self.logging_matrix);

        let masking = Arc::new(MaskingEngine::new(self.mask_char.clone(), self.mask_max_depth));
        for field in self.masking_fields {
            let strategy = match self.mask_style {
                MaskStyle::Fixed => MaskStrategy::Full,
                MaskStyle::PreserveLength => MaskStrategy::PreserveLength,
            };
            let rule = match field {
                MaskField::Literal(name) => MaskRule {
                    selector: Selector::Literal(name),
                    strategy,
                },
                MaskField::Pattern(source) => {
                    let regex = Regex::new(&source)
                        .map_err(|_| ConfigError::InvalidMaskPattern(source.clone()))?;
                    MaskRule {
                        selector: Selector::Pattern(regex),
                        strategy,
                    }
                }
            };
            masking.add_rule(rule);
        }

        let serializers = SerializerRegistry::new(self.serializers, self.serializer_timeout_ms);
        let sinks: Arc<Vec<Arc<dyn Sink>>> = Arc::new(self.sinks);

        let (tx, rx) = mpsc::unbounded_channel::<DispatchMsg>();
        spawn_dispatch_task(sinks, rx);

        Ok(Logger {
            service_name: Arc::new(self.service_name),
            level: Arc::new(LevelCell::new(self.level)),
            bindings: Record::new(),
            serializers,
            masking,
            dispatch: tx,
        })
    }
}

enum DispatchMsg {
    Record(Level, Record),
    Shutdown {
        budget: Duration,
        reply: oneshot::Sender<Vec<ShutdownError>>,
    },
}

fn spawn_dispatch_task(sinks: Arc<Vec<Arc<dyn Sink>>>, mut rx: mpsc::UnboundedReceiver<DispatchMsg>) {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match msg {
                DispatchMsg::Record(level, record) => {
                    for sink in sinks.iter() {
                        if is_enabled(level, sink.level()) {
                            if let Err(err) = sink.log(&record).await {
                                eprintln!(
                                    "logforge: sink '{}' failed to accept a record: {}",
                                    sink.name(),
                                    err
                                );
                            }
                        }
                    }
                }
                DispatchMsg::Shutdown { budget, reply } => {
                    let mut errors = Vec::new();
                    for sink in sinks.iter().rev() {
                        match tokio::time::timeout(budget, sink.flush()).await {
                            Ok(Ok(())) => {}
                            Ok(Err(source)) => errors.push(ShutdownError::SinkError {
                                sink: sink.name().to_string(),
                                source,
                            }),
                            Err(_elapsed) => errors.push(ShutdownError::SinkTimeout {
                                sink: sink.name().to_string(),
                            }),
                        }
                        let _ = sink.shutdown().await;
                    }
                    let _ = reply.send(errors);
                    break;
                }
            }
        }
    });
}

/// Small interior-mutable cell for a logger's own level, independent from
/// its parent's (spec §4.7 "Level is inherited at creation and may be
/// changed independently thereafter"). `Level` isn't `Copy`-as-`u8` by
/// itself, so this stores the discriminant.
struct LevelCell(AtomicU8);

impl LevelCell {
    fn new(level: Level) -> Self {
        Self(AtomicU8::new(level_to_tag(level)))
    }

    fn get(&self) -> Level {
        tag_to_level(self.0.load(Ordering::Relaxed))
    }

    fn set(&self, level: Level) {
        self.0.store(level_to_tag(level), Ordering::Relaxed);
    }
}

fn level_to_tag(level: Level) -> u8 {
    match level {
        Level::Trace => 0,
        Level::Debug => 1,
        Level::Info => 2,
        Level::Audit => 3,
        Level::Warn => 4,
        Level::Error => 5,
        Level::Fatal => 6,
        Level::Silent => 7,
    }
}

fn tag_to_level(tag: u8) -> Level {
    match tag {
        0 => Level::Trace,
        1 => Level::Debug,
        2 => Level::Info,
        3 => Level::Audit,
        4 => Level::Warn,
        5 => Level::Error,
        6 => Level::Fatal,
        _ => Level::Silent,
    }
}

/// The public emitter. Cheap to clone — every clone shares the same
/// sinks, serializer registry, and masking engine; only `bindings` and
/// `level` are logger-specific.
#[derive(Clone)]
pub struct Logger {
    service_name: Arc<String>,
    level: Arc<LevelCell>,
    bindings: Record,
    serializers: SerializerRegistry,
    masking: Arc<MaskingEngine>,
    dispatch: mpsc::UnboundedSender<DispatchMsg>,
}

impl Logger {
    pub fn level(&self) -> Level {
        self.level.get()
    }

    pub fn set_level(&self, level: Level) {
        self.level.set(level);
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Direct access to the shared masking engine, for callers that need
    /// per-field strategies beyond the uniform `masking.fields` +
    /// `masking.style` configuration surface.
    pub fn masking_engine(&self) -> &Arc<MaskingEngine> {
        &self.masking
    }

    /// `child(bindings)` from spec §4.7: shares every pipeline stage, new
    /// bindings win over the parent's on key collision, level is a fresh
    /// independent copy of the parent's level at this moment.
    pub fn child(&self, bindings: Record) -> Logger {
        Logger {
            service_name: self.service_name.clone(),
            level: Arc::new(LevelCell::new(self.level())),
            bindings: merged(&self.bindings, &bindings),
            serializers: self.serializers.clone(),
            masking: self.masking.clone(),
            dispatch: self.dispatch.clone(),
        }
    }

    pub fn with_source(&self, name: impl Into<Value>) -> Logger {
        let mut b = Record::new();
        b.insert("source".to_string(), name.into());
        self.child(b)
    }

    pub fn with_transaction_id(&self, id: impl Into<Value>) -> Logger {
        let mut b = Record::new();
        b.insert("transactionId".to_string(), id.into());
        self.child(b)
    }

    pub fn with_retention(&self, rules: impl Into<Value>) -> Logger {
        let mut b = Record::new();
        b.insert("retention".to_string(), rules.into());
        self.child(b)
    }

    /// The core pipeline (spec §4.7 assembly steps). Never panics, never
    /// returns an error — failures are recovered and reported on a
    /// separate record, or silently dropped at the very last resort.
    async fn emit(&self, level: Level, mut metadata: Record, message_template: String, args: &[Value]) {
        if !is_enabled(level, self.level()) {
            return;
        }

        // spec §4.7 Inputs: "(metadata-mapping, message?, ...). If both
        // message-in-metadata and positional message are provided,
        // concatenate with a single space." `message` is a reserved key
        // (spec §3), so it never survives as ordinary metadata either way.
        let embedded_message = metadata
            .remove("message")
            .and_then(|v| v.as_str().map(str::to_string));
        let positional_message = format_message(&message_template, args);
        let message = match embedded_message {
            Some(embedded) if positional_message.is_empty() => embedded,
            Some(embedded) => format!("{embedded} {positional_message}"),
            None => positional_message,
        };
        let processed_metadata = self.serializers.process(metadata, self).await;

        let mut record = self.bindings.clone();
        merge_into(&mut record, context::get_filtered_context(level));
        merge_into(&mut record, processed_metadata);
        record.insert("level".to_string(), Value::String(level.as_str().to_string()));
        record.insert("timestamp".to_string(), Value::String(now_iso8601()));
        record.insert("service".to_string(), Value::String(self.service_name.as_str().to_string()));
        record.insert("message".to_string(), Value::String(message));

        let masked = self.masking.apply(record);
        let sanitized = sanitize(masked);

        let _ = self.dispatch.send(DispatchMsg::Record(level, sanitized));
    }

    /// Flush every sink in reverse construction order and release their
    /// resources. Intended to be called once, on the root logger, during
    /// orderly shutdown (spec §3 "Loggers" lifecycle).
    pub async fn shutdown(&self, budget: Duration) -> Result<(), ShutdownError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .dispatch
            .send(DispatchMsg::Shutdown {
                budget,
                reply: reply_tx,
            })
            .is_err()
        {
            return Ok(());
        }
        let errors = reply_rx.await.unwrap_or_default();
        match errors.into_iter().next() {
            Some(first) => Err(first),
            None => Ok(()),
        }
    }
}

impl ReportSink for Logger {
    fn report_warning(&self, message: String, context: Record) {
        let logger = self.clone();
        tokio::spawn(async move {
            logger.emit(Level::Warn, context, message, &[]).await;
        });
    }
}

fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// printf-style substitution: `%s` (display), `%d` (integer/display),
/// `%j` (JSON), `%f` (float/display), `%%` (literal percent). Missing args
/// leave the placeholder text in place.
fn format_message(template: &str, args: &[Value]) -> String {
    let mut out = String::new();
    let mut arg_iter = args.iter();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('s') | Some('d') | Some('f') => {
                chars.next();
                match arg_iter.next() {
                    Some(value) => out.push_str(&plain(value)),
                    None => {
                        out.push('%');
                        out.push(c);
                    }
                }
            }
            Some('j') => {
                chars.next();
                match arg_iter.next() {
                    Some(value) => out.push_str(&serde_json::to_string(value).unwrap_or_default()),
                    None => out.push_str("%j"),
                }
            }
            Some('%') => {
                chars.next();
                out.push('%');
            }
            _ => out.push('%'),
        }
    }
    out
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

macro_rules! level_methods {
    ($name:ident, $name_fmt:ident, $name_meta:ident, $level:expr) => {
        impl Logger {
            pub async fn $name(&self, message: impl Into<String>) {
                self.emit($level, Record::new(), message.into(), &[]).await
            }

            pub async fn $name_fmt(&self, template: impl Into<String>, args: &[Value]) {
                self.emit($level, Record::new(), template.into(), args).await
            }

            pub async fn $name_meta(&self, metadata: Record, message: impl Into<String>, args: &[Value]) {
                self.emit($level, metadata, message.into(), args).await
            }
        }
    };
}

level_methods!(trace, trace_fmt, trace_meta, Level::Trace);
level_methods!(debug, debug_fmt, debug_meta, Level::Debug);
level_methods!(info, info_fmt, info_meta, Level::Info);
level_methods!(warn, warn_fmt, warn_meta, Level::Warn);
level_methods!(error, error_fmt, error_meta, Level::Error);
level_methods!(fatal, fatal_fmt, fatal_meta, Level::Fatal);
level_methods!(audit, audit_fmt, audit_meta, Level::Audit);
