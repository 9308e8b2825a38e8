//! Message-broker collaborator interface (spec §6 "Instrumented broker").
//!
//! Core ships the interface and the one well-defined instrumentation point
//! — correlation propagation and lifecycle logging around a publish call —
//! never a concrete broker client. Wiring an actual broker SDK in behind
//! [`BrokerAdapter`] is out of scope here.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::json;

use crate::context;
use crate::logger::Logger;
use crate::sink::SinkError;

/// A header value as carried on a broker message. Brokers that only support
/// byte payloads for headers still round-trip text through [`HeaderValue::Text`].
#[derive(Debug, Clone)]
pub enum HeaderValue {
    Text(String),
    Bytes(Vec<u8>),
}

/// A message in flight to or from a broker.
#[derive(Debug, Clone, Default)]
pub struct BrokerMessage {
    pub payload: Vec<u8>,
    pub headers: HashMap<String, HeaderValue>,
}

impl BrokerMessage {
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            headers: HashMap::new(),
        }
    }
}

/// The ack/nack lifecycle a consumer drives once it has decided what to do
/// with a delivered message.
#[async_trait]
pub trait MessageLifecycle: Send + Sync {
    async fn ack(&self) -> Result<(), SinkError>;
    async fn nack(&self, requeue: bool) -> Result<(), SinkError>;
}

/// The seam a concrete broker client implements. Connection lifecycle and
/// publish/subscribe are the minimum surface an instrumented wrapper needs.
#[async_trait]
pub trait BrokerAdapter: Send + Sync {
    async fn connect(&self) -> Result<(), SinkError>;
    async fn disconnect(&self) -> Result<(), SinkError>;
    async fn publish(&self, topic: &str, message: BrokerMessage) -> Result<(), SinkError>;
}

/// Publish through `adapter`, injecting the current task's correlation id
/// (if any) into the outgoing headers and logging the lifecycle at debug
/// level, with the failure logged at error level and re-raised. This is
/// the "one well-defined point" spec §6 asks the broker collaborator to
/// instrument — everything else about the broker call is the adapter's
/// business.
pub async fn publish_instrumented<A: BrokerAdapter>(
    adapter: &A,
    logger: &Logger,
    topic: &str,
    mut message: BrokerMessage,
) -> Result<(), SinkError> {
    if let Some(correlation_id) = context::get_correlation_id() {
        message
            .headers
            .insert(context::correlation_header(), HeaderValue::Text(correlation_id));
    }

    let mut meta = crate::value::Record::new();
    meta.insert("topic".to_string(), json!(topic));
    logger.debug_meta(meta.clone(), "publishing message", &[]).await;

    match adapter.publish(topic, message).await {
        Ok(()) => Ok(()),
        Err(err) => {
            let mut error_meta = meta;
            error_meta.insert("err".to_string(), crate::serializer::error_to_value(err.as_ref()));
            logger.error_meta(error_meta, "broker publish failed", &[]).await;
            Err(err)
        }
    }
}
