//! Structured logging and observability pipeline for service code: level
//! gating, per-task context propagation, a serializer registry, a masking
//! engine, escape-sequence sanitization, and pluggable sinks, composed by
//! a single [`Logger`] emitter.
//!
//! ```no_run
//! use logforge::{Level, Logger, LoggerConfig};
//! use logforge::sink::JsonSink;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mut config = LoggerConfig::new("payments-api");
//! config.level = Level::Info;
//! config.sinks.push(std::sync::Arc::new(JsonSink::new(Level::Trace)));
//! let logger = config.build().expect("valid configuration");
//!
//! logger.info("service started").await;
//! # }
//! ```

pub mod collaborators;
pub mod context;
pub mod error;
pub mod level;
pub mod logger;
pub mod masking;
pub mod sanitize;
pub mod serializer;
pub mod sink;
pub mod value;

pub use error::{ConfigError, ShutdownError};
pub use level::{is_enabled, Level, ParseLevelError};
pub use logger::{Logger, LoggerConfig, MaskField, MaskStyle};
pub use value::{Record, Value};
