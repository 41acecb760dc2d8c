//! Error surfaced by the forwarder for a failed round trip.

use serde_json::Value;

/// Status reported for failures that never produced an HTTP response.
pub const TRANSPORT_FAILURE_STATUS: u16 = 0;

/// A non-2xx response, or a transport failure, from the upstream API.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamError {
    pub status: u16,
    pub body: Value,
}

impl UpstreamError {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// A failure with no HTTP response behind it (connect, timeout, bad header).
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: TRANSPORT_FAILURE_STATUS,
            body: Value::String(message.into()),
        }
    }

    pub fn is_transport(&self) -> bool {
        self.status == TRANSPORT_FAILURE_STATUS
    }
}

impl std::fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_transport() {
            write!(f, "Upstream request failed: {}", body_text(&self.body))
        } else {
            write!(
                f,
                "Upstream returned HTTP {}: {}",
                self.status,
                body_text(&self.body)
            )
        }
    }
}

impl std::error::Error for UpstreamError {}

fn body_text(body: &Value) -> String {
    match body {
        Value::String(s) => s.clone(),
        Value::Null => "<empty body>".to_string(),
        other => other.to_string(),
    }
}
