//! Per-task context propagation (spec §4.2).
//!
//! The frame backing this module lives in a [`tokio::task_local!`], the
//! native task-local primitive spec §9 says platforms with one "may use".
//! Reads and writes outside any [`run_scoped`]/[`run_nested`] region are not
//! errors — they return empty/are dropped, so library code can log before
//! a scope exists without crashing (spec §4.2 "Failure").
//!
//! Header names and the level->key logging matrix are process-wide
//! configuration, set once by [`crate::LoggerConfig::build`], and are
//! intentionally free functions rather than an object passed around: every
//! [`crate::Logger`] obtained from the same configuration shares this exact
//! substrate, which is the design note in spec §9 ("Global logger singleton
//! vs. explicit plumbing") resolved in favor of a shared global substrate.

pub mod matrix;

use std::cell::RefCell;
use std::future::Future;

use parking_lot::RwLock;
use serde_json::Value;

use crate::level::Level;
use crate::value::{merge_into, Record};
use matrix::LoggingMatrix;

tokio::task_local! {
    static FRAME: RefCell<Record>;
}

#[derive(Debug, Clone)]
struct HeaderNames {
    correlation: String,
    transaction: String,
}

impl Default for HeaderNames {
    fn default() -> Self {
        Self {
            correlation: "x-correlation-id".to_string(),
            transaction: "x-trace-id".to_string(),
        }
    }
}

lazy_static::lazy_static! {
    static ref HEADERS: RwLock<HeaderNames> = RwLock::new(HeaderNames::default());
    static ref MATRIX: RwLock<Option<LoggingMatrix>> = RwLock::new(None);
}

/// Reconfigure the wire header names backing [`get_correlation_id`] /
/// [`get_transaction_id`]. Defaults are `x-correlation-id` / `x-trace-id`.
pub fn configure_headers(correlation_header: impl Into<String>, transaction_header: impl Into<String>) {
    let mut headers = HEADERS.write();
    headers.correlation = correlation_header.into();
    headers.transaction = transaction_header.into();
}

/// Install (or clear) the `level -> permitted keys` logging matrix
/// (spec §4.2 `getFilteredContext`, §6 `loggingMatrix`).
pub fn configure_matrix(matrix: Option<LoggingMatrix>) {
    *MATRIX.write() = matrix;
}

/// Execute `body` with a brand new frame. When `body` returns the frame is
/// torn down; nothing it wrote is visible afterwards.
pub async fn run_scoped<F, T>(initial: Record, body: F) -> T
where
    F: Future<Output = T>,
{
    FRAME.scope(RefCell::new(initial), body).await
}

/// Execute `body` with the *current* frame extended (not replaced) by
/// `extra`. This is the nested-scope form: the inner region sees a snapshot
/// of the outer frame plus its own additions, and on exit the outer view is
/// restored unchanged (spec §4.2 "Must correctly handle nested scopes").
pub async fn run_nested<F, T>(extra: Record, body: F) -> T
where
    F: Future<Output = T>,
{
    let mut snapshot = get_all();
    merge_into(&mut snapshot, extra);
    FRAME.scope(RefCell::new(snapshot), body).await
}

/// Read one key from the current frame. Returns `None` outside any scope.
pub fn get(key: &str) -> Option<Value> {
    FRAME
        .try_with(|cell| cell.borrow().get(key).cloned())
        .unwrap_or(None)
}

/// Write one key into the current frame. Silently dropped outside any scope.
pub fn set(key: impl Into<String>, value: impl Into<Value>) {
    let _ = FRAME.try_with(|cell| {
        cell.borrow_mut().insert(key.into(), value.into());
    });
}

/// A snapshot of every key currently in the frame. Empty outside any scope.
pub fn get_all() -> Record {
    FRAME
        .try_with(|cell| cell.borrow().clone())
        .unwrap_or_default()
}

/// Remove every key from the current frame without leaving the scope.
pub fn clear() {
    let _ = FRAME.try_with(|cell| cell.borrow_mut().clear());
}

pub fn get_correlation_id() -> Option<String> {
    let key = HEADERS.read().correlation.clone();
    get(&key).and_then(|v| v.as_str().map(str::to_string))
}

pub fn set_correlation_id(id: impl Into<String>) {
    let key = HEADERS.read().correlation.clone();
    set(key, Value::String(id.into()));
}

pub fn get_transaction_id() -> Option<String> {
    let key = HEADERS.read().transaction.clone();
    get(&key).and_then(|v| v.as_str().map(str::to_string))
}

pub fn set_transaction_id(id: impl Into<String>) {
    let key = HEADERS.read().transaction.clone();
    set(key, Value::String(id.into()));
}

/// The configured wire header name backing [`get_correlation_id`] /
/// [`set_correlation_id`] (spec §6 `context.correlationIdHeader`). Collaborator
/// wrappers that inject the correlation id onto an outgoing message must use
/// this instead of a hardcoded header name, since a caller may have
/// reconfigured it via [`configure_headers`].
pub fn correlation_header() -> String {
    HEADERS.read().correlation.clone()
}

/// The configured wire header name backing [`get_transaction_id`] /
/// [`set_transaction_id`] (spec §6 `context.transactionIdHeader`).
pub fn transaction_header() -> String {
    HEADERS.read().transaction.clone()
}

/// The subset of the current frame permitted to flow into a record at
/// `level`, per the configured logging matrix. With no matrix configured,
/// every key flows through (spec §4.2).
pub fn get_filtered_context(level: Level) -> Record {
    let all = get_all();
    let guard = MATRIX.read();
    match guard.as_ref().and_then(|m| m.get(&level)) {
        Some(allowed) => all
            .into_iter()
            .filter(|(key, _)| allowed.contains(key.as_str()))
            .collect(),
        None => all,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn reads_outside_any_scope_are_empty_and_writes_are_dropped() {
        set("k", json!("v"));
        assert_eq!(get("k"), None);
        assert!(get_all().is_empty());
    }

    #[tokio::test]
    async fn scoped_writes_are_visible_within_the_same_scope() {
        run_scoped(Record::new(), async {
            set("user_id", json!(42));
            assert_eq!(get("user_id"), Some(json!(42)));
        })
        .await;
    }

    #[tokio::test]
    async fn scope_teardown_hides_writes_from_a_later_re_entry() {
        run_scoped(Record::new(), async {
            set("leftover", json!(true));
        })
        .await;

        run_scoped(Record::new(), async {
            assert_eq!(get("leftover"), None);
        })
        .await;
    }

    #[tokio::test]
    async fn nested_scope_extends_outer_and_restores_it_on_exit() {
        run_scoped(Record::new(), async {
            set("correlationId", json!("outer"));

            let mut extra = Record::new();
            extra.insert("component".into(), json!("db"));
            run_nested(extra, async {
                assert_eq!(get("correlationId"), Some(json!("outer")));
                assert_eq!(get("component"), Some(json!("db")));
                set("component", json!("db-overwritten"));
            })
            .await;

            assert_eq!(get("correlationId"), Some(json!("outer")));
            assert_eq!(get("component"), None);
        })
        .await;
    }

    #[tokio::test]
    #[serial_test::serial(context_globals)]
    async fn correlation_and_transaction_id_accessors_use_configured_headers() {
        configure_headers("x-correlation-id", "x-trace-id");
        run_scoped(Record::new(), async {
            assert_eq!(get_correlation_id(), None);
            set_correlation_id("abc-123");
            assert_eq!(get_correlation_id(), Some("abc-123".to_string()));
            assert_eq!(get("x-correlation-id"), Some(json!("abc-123")));

            set_transaction_id("txn-1");
            assert_eq!(get_transaction_id(), Some("txn-1".to_string()));
        })
        .await;
    }

    #[tokio::test]
    #[serial_test::serial(context_globals)]
    async fn header_getters_reflect_a_reconfigured_header_name() {
        configure_headers("x-my-correlation", "x-my-transaction");
        assert_eq!(correlation_header(), "x-my-correlation");
        assert_eq!(transaction_header(), "x-my-transaction");

        run_scoped(Record::new(), async {
            set_correlation_id("abc-123");
            assert_eq!(get("x-my-correlation"), Some(json!("abc-123")));
        })
        .await;

        configure_headers("x-correlation-id", "x-trace-id");
    }

    #[tokio::test]
    #[serial_test::serial(context_globals)]
    async fn filtered_context_respects_the_configured_matrix() {
        let mut matrix = LoggingMatrix::new();
        matrix.insert(Level::Info, ["userId".to_string()].into_iter().collect());
        configure_matrix(Some(matrix));

        run_scoped(Record::new(), async {
            set("userId", json!(1));
            set("secret", json!("nope"));
            let filtered = get_filtered_context(Level::Info);
            assert!(filtered.contains_key("userId"));
            assert!(!filtered.contains_key("secret"));
        })
        .await;

        configure_matrix(None);
    }
}
