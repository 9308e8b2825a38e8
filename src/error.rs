//! Error types for the two fallible entry points: construction and shutdown.
//!
//! Every other public method on [`crate::Logger`] is infallible at the call
//! site — failures inside the pipeline are recovered and reported on a
//! separate record instead of propagated.

use thiserror::Error;

/// Returned by [`crate::LoggerConfig::build`] when the configuration itself
/// is invalid. Surfaced once, at construction, never while logging.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("serializerTimeoutMs must be positive, got {0}")]
    InvalidSerializerTimeout(i64),

    #[error("masking.maskChar must not be empty")]
    EmptyMaskChar,

    #[error("masking.maxDepth must be at least 1, got {0}")]
    InvalidMaxDepth(i64),

    #[error("service name must not be empty")]
    EmptyServiceName,

    #[error("invalid masking pattern '{0}'")]
    InvalidMaskPattern(String),
}

/// Returned by [`crate::Logger::shutdown`] when one or more sinks could not
/// be flushed within the caller-supplied budget.
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("sink '{sink}' did not flush within the shutdown budget")]
    SinkTimeout { sink: String },

    #[error("sink '{sink}' failed during flush: {source}")]
    SinkError {
        sink: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
