//! Relays GET and POST calls to the upstream API with a single bounded retry.

use log::debug;
use serde_json::Value;

use crate::{
    credentials::{UpstreamCredentials, inject_headers},
    diagnostics::{DiagnosticSink, LogSink},
    http::{HttpForwarder, RetryDecision, UpstreamError, evaluate},
    request::{Headers, Method, OutboundRequest},
};

pub const STARTED_NOTICE: &str = "Endpoint started";
pub const RETRY_NOTICE: &str = "Retrying request";

/// Entry point for relayed calls.
///
/// Holds the forwarding collaborator, the process-wide credentials and the
/// diagnostic sink. Calls share nothing else, so one dispatcher can serve
/// concurrent callers through a shared reference.
pub struct Dispatcher<F: HttpForwarder, S: DiagnosticSink = LogSink> {
    forwarder: F,
    credentials: UpstreamCredentials,
    sink: S,
}

impl<F: HttpForwarder> Dispatcher<F, LogSink> {
    /// Dispatcher reporting diagnostics through the `log` facade.
    pub fn with_log_sink(forwarder: F, credentials: UpstreamCredentials) -> Self {
        Self::new(forwarder, credentials, LogSink)
    }
}

impl<F: HttpForwarder, S: DiagnosticSink> Dispatcher<F, S> {
    pub fn new(forwarder: F, credentials: UpstreamCredentials, sink: S) -> Self {
        Self {
            forwarder,
            credentials,
            sink,
        }
    }

    /// Emits the startup notice. Call once before serving requests.
    pub fn started(&self) {
        self.sink.info(STARTED_NOTICE);
    }

    /// Forwards the request as a GET, whatever its `method` field says.
    #[tracing::instrument(skip(self, request), fields(path = %request.path))]
    pub async fn get(&self, request: OutboundRequest) -> Result<Value, UpstreamError> {
        self.relay(Method::Get, request).await
    }

    /// Forwards the request as a POST, whatever its `method` field says.
    #[tracing::instrument(skip(self, request), fields(path = %request.path))]
    pub async fn post(&self, request: OutboundRequest) -> Result<Value, UpstreamError> {
        self.relay(Method::Post, request).await
    }

    /// Routes on the request's own `method`.
    pub async fn dispatch(&self, request: OutboundRequest) -> Result<Value, UpstreamError> {
        match request.method {
            Method::Get => self.get(request).await,
            Method::Post => self.post(request).await,
        }
    }

    async fn relay(&self, method: Method, mut request: OutboundRequest) -> Result<Value, UpstreamError> {
        inject_headers(&mut request, &self.credentials);

        let OutboundRequest {
            path,
            params,
            headers,
            body,
            ..
        } = request;
        let headers = headers.unwrap_or_default();
        let body = body.unwrap_or(Value::Null);

        let first = self.forward(method, &path, &params, &headers, &body).await;
        let error = match first {
            Ok(result) => return Ok(result),
            Err(error) => error,
        };

        match evaluate(&error, &self.sink) {
            RetryDecision::Retry => {
                self.sink.info(RETRY_NOTICE);
                // The second outcome is final, success or not.
                self.forward(method, &path, &params, &headers, &body).await
            }
            RetryDecision::NoRetry => {
                debug!("{} {} failed: {}", method, path, error);
                Err(error)
            }
        }
    }

    async fn forward(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        headers: &Headers,
        body: &Value,
    ) -> Result<Value, UpstreamError> {
        match method {
            Method::Get => self.forwarder.forward_get(path, params, headers).await,
            Method::Post => {
                self.forwarder
                    .forward_post(path, params, headers, body)
                    .await
            }
        }
    }
}
