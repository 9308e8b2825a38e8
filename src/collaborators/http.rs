//! HTTP collaborator interface (spec §6 "Instrumented HTTP client").
//!
//! Mirrors [`crate::collaborators::broker`]: core defines the request/
//! response shape, the adapter seam, and one instrumented wrapper that
//! injects the correlation header and logs timing — never a concrete HTTP
//! client.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;

use crate::context;
use crate::logger::Logger;
use crate::sink::SinkError;

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: HashMap::new(),
            body: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// The seam a concrete HTTP client implements.
#[async_trait]
pub trait HttpAdapter: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, SinkError>;
}

/// Send through `adapter`, injecting the current task's correlation id into
/// the outgoing request headers and logging request start, completion, and
/// duration — the one well-defined instrumentation point for HTTP calls.
pub async fn send_instrumented<A: HttpAdapter>(
    adapter: &A,
    logger: &Logger,
    mut request: HttpRequest,
) -> Result<HttpResponse, SinkError> {
    if let Some(correlation_id) = context::get_correlation_id() {
        request.headers.insert(context::correlation_header(), correlation_id);
    }

    let mut meta = crate::value::Record::new();
    meta.insert("method".to_string(), json!(request.method));
    meta.insert("url".to_string(), json!(request.url));
    logger.debug_meta(meta.clone(), "sending request", &[]).await;

    let started = Instant::now();
    let result = adapter.send(request).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(response) => {
            let mut done_meta = meta;
            done_meta.insert("status".to_string(), json!(response.status));
            done_meta.insert("durationMs".to_string(), json!(duration_ms));
            logger.debug_meta(done_meta, "request completed", &[]).await;
            Ok(response)
        }
        Err(err) => {
            let mut error_meta = meta;
            error_meta.insert("durationMs".to_string(), json!(duration_ms));
            error_meta.insert("err".to_string(), crate::serializer::error_to_value(err.as_ref()));
            logger.error_meta(error_meta, "request failed", &[]).await;
            Err(err)
        }
    }
}
