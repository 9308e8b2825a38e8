//! Serializer registry (spec §4.3): turns typed metadata values into
//! record-safe representations before masking ever sees them.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::value::{Record, Value};

/// Default deadline for a single render call (spec §6 `logger.serializerTimeoutMs`).
pub const DEFAULT_TIMEOUT_MS: u64 = 50;

/// A render function: maps one metadata value to either a scalar or a
/// further record. Treated as potentially unsafe by the registry — it may
/// panic-unwind-safe-fail by returning `Err`, and it runs under a deadline.
pub type RenderFn = Arc<
    dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send>> + Send + Sync,
>;

/// Anything the registry can report a render failure to. [`crate::Logger`]
/// implements this so `process` can warn through the normal pipeline
/// without the serializer module depending on the logger module.
pub trait ReportSink: Send + Sync {
    fn report_warning(&self, message: String, context: Record);
}

/// Read-only after construction (spec §5 "serializer registry is
/// read-only after construction"): built once via [`SerializerRegistry::builder`]
/// or [`SerializerRegistry::with_default_err`], then shared behind an `Arc`.
#[derive(Clone)]
pub struct SerializerRegistry {
    renderers: Arc<HashMap<String, RenderFn>>,
    timeout: Duration,
}

impl SerializerRegistry {
    /// An empty registry — every key passes through untouched.
    pub fn empty(timeout_ms: u64) -> Self {
        Self {
            renderers: Arc::new(HashMap::new()),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    /// Build a registry from caller-supplied renderers, merged with the
    /// default `err` renderer unless the caller overrides that key (spec §6
    /// "merged with the default err renderer unless overridden").
    pub fn new(mut renderers: HashMap<String, RenderFn>, timeout_ms: u64) -> Self {
        renderers
            .entry("err".to_string())
            .or_insert_with(default_err_renderer);
        Self {
            renderers: Arc::new(renderers),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    /// `process(metadata, reportingLogger)` from spec §4.3: replaces every
    /// key present in both `metadata` and the registry with its rendered
    /// value, in place, preserving key order. Keys without a renderer pass
    /// through untouched.
    pub async fn process(&self, metadata: Record, report: &dyn ReportSink) -> Record {
        let mut out = Record::new();
        for (key, value) in metadata {
            match self.renderers.get(&key) {
                None => {
                    out.insert(key, value);
                }
                Some(render) => {
                    let rendered = self.run_one(&key, value, render).await;
                    let rendered = match rendered {
                        Ok(v) => v,
                        Err(()) => {
                            report.report_warning(
                                format!(
                                    "serializer for key '{key}' failed or timed out; \
                                     substituting placeholder"
                                ),
                                Record::new(),
                            );
                            Value::String(format!(
                                "[SERIALIZER_ERROR: Failed to process key '{key}']"
                            ))
                        }
                    };
                    out.insert(key, rendered);
                }
            }
        }
        out
    }

    /// Runs `render` on a dedicated task so a panic inside a caller-supplied
    /// render function unwinds only that task, not the calling task running
    /// [`Logger::emit`] (spec §4.3 "may throw"; spec §7 "the emitter's
    /// public log methods never throw"). `tokio::spawn` is the isolation
    /// boundary Rust gives a `Send + 'static` future; `JoinHandle` surfaces
    /// a panic as an `Err(JoinError)` instead of propagating the unwind.
    async fn run_one(&self, _key: &str, value: Value, render: &RenderFn) -> Result<Value, ()> {
        let handle = tokio::spawn(render(value));
        let abort = handle.abort_handle();
        match tokio::time::timeout(self.timeout, handle).await {
            Ok(Ok(Ok(rendered))) => Ok(rendered),
            Ok(Ok(Err(_render_err))) => Err(()),
            Ok(Err(_join_err)) => Err(()),
            Err(_elapsed) => {
                abort.abort();
                Err(())
            }
        }
    }
}

/// The built-in `err` renderer (spec §4.3): canonicalizes an exception-like
/// object into `{name, message, stack, code?, cause?}`; anything else is
/// JSON-stringified.
pub fn default_err_renderer() -> RenderFn {
    Arc::new(|value: Value| {
        Box::pin(async move {
            if let Value::Object(obj) = &value {
                if obj.contains_key("message") || obj.contains_key("name") {
                    let mut canonical = Record::new();
                    canonical.insert(
                        "name".to_string(),
                        obj.get("name").cloned().unwrap_or_else(|| json!("Error")),
                    );
                    canonical.insert(
                        "message".to_string(),
                        obj.get("message").cloned().unwrap_or_else(|| json!("")),
                    );
                    canonical.insert(
                        "stack".to_string(),
                        obj.get("stack").cloned().unwrap_or(Value::Null),
                    );
                    if let Some(code) = obj.get("code") {
                        canonical.insert("code".to_string(), code.clone());
                    }
                    if let Some(cause) = obj.get("cause") {
                        canonical.insert("cause".to_string(), cause.clone());
                    }
                    return Ok(Value::Object(canonical));
                }
            }
            Ok(Value::String(
                serde_json::to_string(&value).unwrap_or_else(|_| "null".to_string()),
            ))
        })
    })
}

/// Convert a `std::error::Error` into the same exception-like shape the
/// default `err` renderer expects, so callers can do
/// `logger.error().metadata("err", error_to_value(&e))`.
pub fn error_to_value(err: &(dyn std::error::Error + 'static)) -> Value {
    let mut obj = Record::new();
    obj.insert("name".to_string(), json!(std::any::type_name_of_val(err)));
    obj.insert("message".to_string(), json!(err.to_string()));
    if let Some(source) = err.source() {
        obj.insert("cause".to_string(), json!(source.to_string()));
    }
    Value::Object(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    struct NullReport;
    impl ReportSink for NullReport {
        fn report_warning(&self, _message: String, _context: Record) {}
    }

    struct CapturingReport(parking_lot::Mutex<Vec<String>>);
    impl ReportSink for CapturingReport {
        fn report_warning(&self, message: String, _context: Record) {
            self.0.lock().push(message);
        }
    }

    #[tokio::test]
    async fn keys_without_a_renderer_pass_through_untouched() {
        let registry = SerializerRegistry::new(HashMap::new(), DEFAULT_TIMEOUT_MS);
        let mut meta = Record::new();
        meta.insert("userId".into(), json!(42));
        let out = registry.process(meta, &NullReport).await;
        assert_eq!(out["userId"], json!(42));
    }

    #[tokio::test]
    async fn default_err_renderer_canonicalizes_exception_like_values() {
        let registry = SerializerRegistry::new(HashMap::new(), DEFAULT_TIMEOUT_MS);
        let mut meta = Record::new();
        meta.insert(
            "err".into(),
            json!({"name": "Error", "message": "boom", "code": "E1"}),
        );
        let out = registry.process(meta, &NullReport).await;
        assert_eq!(out["err"]["name"], json!("Error"));
        assert_eq!(out["err"]["message"], json!("boom"));
        assert_eq!(out["err"]["code"], json!("E1"));
        assert!(out["err"].get("stack").is_some());
    }

    #[tokio::test]
    async fn default_err_renderer_json_stringifies_non_exception_values() {
        let registry = SerializerRegistry::new(HashMap::new(), DEFAULT_TIMEOUT_MS);
        let mut meta = Record::new();
        meta.insert("err".into(), json!(404));
        let out = registry.process(meta, &NullReport).await;
        assert_eq!(out["err"], json!("404"));
    }

    #[tokio::test]
    async fn render_that_exceeds_the_deadline_yields_exactly_one_placeholder_and_warning() {
        let mut renderers: HashMap<String, RenderFn> = HashMap::new();
        renderers.insert(
            "slow".to_string(),
            Arc::new(|value: Value| {
                Box::pin(async move {
                    tokio::time::sleep(StdDuration::from_millis(200)).await;
                    Ok(value)
                })
            }),
        );
        let registry = SerializerRegistry::new(renderers, 10);
        let mut meta = Record::new();
        meta.insert("slow".into(), json!("value"));

        let report = CapturingReport(parking_lot::Mutex::new(Vec::new()));
        let out = registry.process(meta, &report).await;

        assert_eq!(out["slow"], json!("[SERIALIZER_ERROR: Failed to process key 'slow']"));
        assert_eq!(report.0.lock().len(), 1);
    }

    #[tokio::test]
    async fn render_that_panics_yields_a_placeholder_instead_of_unwinding() {
        let mut renderers: HashMap<String, RenderFn> = HashMap::new();
        renderers.insert(
            "explodes".to_string(),
            Arc::new(|_value: Value| {
                Box::pin(async move {
                    panic!("render functions are user-supplied and untrusted");
                    #[allow(unreachable_code)]
                    Ok(Value::Null)
                })
            }),
        );
        let registry = SerializerRegistry::new(renderers, DEFAULT_TIMEOUT_MS);
        let mut meta = Record::new();
        meta.insert("explodes".into(), json!("value"));
        meta.insert("untouched".into(), json!(1));

        let report = CapturingReport(parking_lot::Mutex::new(Vec::new()));
        let out = registry.process(meta, &report).await;

        assert_eq!(
            out["explodes"],
            json!("[SERIALIZER_ERROR: Failed to process key 'explodes']")
        );
        assert_eq!(out["untouched"], json!(1));
        assert_eq!(report.0.lock().len(), 1);
    }

    #[tokio::test]
    async fn render_that_returns_an_error_yields_a_placeholder() {
        let mut renderers: HashMap<String, RenderFn> = HashMap::new();
        renderers.insert(
            "bad".to_string(),
            Arc::new(|_value: Value| Box::pin(async move { Err("nope".to_string()) })),
        );
        let registry = SerializerRegistry::new(renderers, DEFAULT_TIMEOUT_MS);
        let mut meta = Record::new();
        meta.insert("bad".into(), json!("value"));
        let out = registry.process(meta, &NullReport).await;
        assert_eq!(out["bad"], json!("[SERIALIZER_ERROR: Failed to process key 'bad']"));
    }

    #[tokio::test]
    async fn key_order_is_preserved_across_processing() {
        let registry = SerializerRegistry::new(HashMap::new(), DEFAULT_TIMEOUT_MS);
        let mut meta = Record::new();
        meta.insert("z".into(), json!(1));
        meta.insert("a".into(), json!(2));
        meta.insert("err".into(), json!("oops"));
        let out = registry.process(meta, &NullReport).await;
        let keys: Vec<&String> = out.keys().collect();
        assert_eq!(keys, vec!["z", "a", "err"]);
    }
}
