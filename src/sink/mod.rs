//! Sinks: terminal consumers of a finished record (spec §4.6).
//!
//! The core ships exactly two full sinks — [`JsonSink`] and [`CaptureSink`]
//! — plus [`AdapterSink`], which lets an externally supplied object stand
//! in for a sink without this crate knowing its concrete type. Colored
//! human-readable sinks are out of core scope; they only need to satisfy
//! the same [`Sink`] trait.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::level::Level;
use crate::value::Record;

/// Error type returned by a sink's fallible operations.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// A terminal consumer of records. Implementations must not modify the
/// record they're handed (spec §4.6 "may only read").
#[async_trait]
pub trait Sink: Send + Sync {
    /// Minimum level this sink accepts; the emitter checks this before
    /// calling [`Sink::log`].
    fn level(&self) -> Level;

    /// A short identifying name, used in shutdown diagnostics.
    fn name(&self) -> &str;

    /// Consume one record. Best-effort; failures are caught by the emitter
    /// and must not affect other sinks.
    async fn log(&self, record: &Record) -> Result<(), SinkError>;

    /// Block until buffered records are persisted.
    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Release any held resources.
    async fn shutdown(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Structured JSON sink: one line of JSON per record to stdout, or stderr
/// once the record's level reaches `error` (spec §4.6).
pub struct JsonSink {
    level: Level,
    name: String,
}

impl JsonSink {
    pub fn new(level: Level) -> Self {
        Self {
            level,
            name: "json".to_string(),
        }
    }
}

#[async_trait]
impl Sink for JsonSink {
    fn level(&self) -> Level {
        self.level
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn log(&self, record: &Record) -> Result<(), SinkError> {
        let line = serde_json::to_string(record)?;
        let is_error_or_worse = record
            .get("level")
            .and_then(|v| v.as_str())
            .map(|lvl| matches!(lvl, "error" | "fatal"))
            .unwrap_or(false);
        if is_error_or_worse {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
        Ok(())
    }
}

/// Bounded in-memory capture sink for tests (spec §4.6). Evicts the oldest
/// entry once `capacity` is reached.
pub struct CaptureSink {
    level: Level,
    name: String,
    capacity: usize,
    entries: Mutex<VecDeque<Record>>,
}

impl CaptureSink {
    pub fn new(level: Level) -> Self {
        Self::with_capacity(level, 1024)
    }

    pub fn with_capacity(level: Level, capacity: usize) -> Self {
        Self {
            level,
            name: "capture".to_string(),
            capacity,
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// All captured records, oldest first.
    pub fn entries(&self) -> Vec<Record> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Captured records matching `predicate`.
    pub fn find_entries(&self, predicate: impl Fn(&Record) -> bool) -> Vec<Record> {
        self.entries
            .lock()
            .iter()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }

    /// Drop every captured record.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[async_trait]
impl Sink for CaptureSink {
    fn level(&self) -> Level {
        self.level
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn log(&self, record: &Record) -> Result<(), SinkError> {
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(record.clone());
        Ok(())
    }
}

/// Wraps an externally supplied [`Sink`] implementation, optionally
/// overriding the level threshold at the adapter boundary (spec §4.6
/// "Adapter sink").
pub struct AdapterSink {
    inner: Arc<dyn Sink>,
    level: Level,
    name: String,
}

impl AdapterSink {
    pub fn new(inner: Arc<dyn Sink>) -> Self {
        let level = inner.level();
        let name = format!("adapter({})", inner.name());
        Self { inner, level, name }
    }

    pub fn with_level(inner: Arc<dyn Sink>, level: Level) -> Self {
        let name = format!("adapter({})", inner.name());
        Self { inner, level, name }
    }
}

#[async_trait]
impl Sink for AdapterSink {
    fn level(&self) -> Level {
        self.level
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn log(&self, record: &Record) -> Result<(), SinkError> {
        self.inner.log(record).await
    }

    async fn flush(&self) -> Result<(), SinkError> {
        self.inner.flush().await
    }

    async fn shutdown(&self) -> Result<(), SinkError> {
        self.inner.shutdown().await
    }
}
