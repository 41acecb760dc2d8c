//! Single-shot retry decision for failed upstream calls.

use log::debug;
use reqwest::StatusCode;

use super::error::UpstreamError;
use crate::diagnostics::DiagnosticSink;

/// Upstream failure classes, keyed on HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// HTTP 401: bad or missing credentials, or no organization membership.
    AuthFailure,
    /// HTTP 429: rate limit or quota exceeded, or the engine is overloaded.
    RateLimited,
    /// HTTP 500.
    ServerFault,
    /// Anything else, transport failures included.
    OtherUpstreamError,
}

/// Outcome of evaluating the first failure of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    NoRetry,
}

impl FailureKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, FailureKind::RateLimited | FailureKind::ServerFault)
    }

    /// Message reported to the diagnostic sink, if this class has one.
    pub fn diagnostic(self) -> Option<&'static str> {
        match self {
            FailureKind::AuthFailure => Some(
                "401 - Invalid Authentication or 401 - Incorrect API key provided or \
                 401 - You must be a member of an organization to use the API.",
            ),
            FailureKind::RateLimited => Some(
                "429 - Rate limit reached for requests or 429 - You exceeded your current \
                 quota, please check your plan and billing details or 429 - The engine is \
                 currently overloaded, please try again later.",
            ),
            FailureKind::ServerFault => {
                Some("500 - The server had an error while processing your request.")
            }
            FailureKind::OtherUpstreamError => None,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::AuthFailure => write!(f, "authentication failure"),
            FailureKind::RateLimited => write!(f, "rate limited"),
            FailureKind::ServerFault => write!(f, "upstream server fault"),
            FailureKind::OtherUpstreamError => write!(f, "upstream error"),
        }
    }
}

/// Classifies a raw status code. The body is never inspected.
pub fn classify_status(status: u16) -> FailureKind {
    match StatusCode::from_u16(status) {
        Ok(StatusCode::UNAUTHORIZED) => FailureKind::AuthFailure,
        Ok(StatusCode::TOO_MANY_REQUESTS) => FailureKind::RateLimited,
        Ok(StatusCode::INTERNAL_SERVER_ERROR) => FailureKind::ServerFault,
        // 503 and other 5xx codes are not retried.
        _ => FailureKind::OtherUpstreamError,
    }
}

pub fn classify_error(error: &UpstreamError) -> FailureKind {
    classify_status(error.status)
}

/// Decides whether the first failure of a call earns one more attempt,
/// reporting the failure class to the sink on the way.
pub fn evaluate<S: DiagnosticSink + ?Sized>(error: &UpstreamError, sink: &S) -> RetryDecision {
    let kind = classify_error(error);

    if let Some(message) = kind.diagnostic() {
        sink.error(message);
    }

    if kind.is_retryable() {
        debug!("HTTP {} classified as {}, retrying once", error.status, kind);
        RetryDecision::Retry
    } else {
        debug!("HTTP {} classified as {}, not retrying", error.status, kind);
        RetryDecision::NoRetry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MockDiagnosticSink;
    use serde_json::{Value, json};

    fn sink_expecting_error(fragment: &'static str) -> MockDiagnosticSink {
        let mut sink = MockDiagnosticSink::new();
        sink.expect_error()
            .withf(move |m| m.contains(fragment))
            .times(1)
            .return_const(());
        sink.expect_info().never();
        sink
    }

    #[test]
    fn test_classify_status_table() {
        assert_eq!(classify_status(401), FailureKind::AuthFailure);
        assert_eq!(classify_status(429), FailureKind::RateLimited);
        assert_eq!(classify_status(500), FailureKind::ServerFault);
        assert_eq!(classify_status(404), FailureKind::OtherUpstreamError);
        assert_eq!(classify_status(503), FailureKind::OtherUpstreamError);
        assert_eq!(classify_status(0), FailureKind::OtherUpstreamError);
    }

    #[test]
    fn test_evaluate_unauthorized_is_fatal() {
        let sink = sink_expecting_error("401 - Invalid Authentication");
        let err = UpstreamError::new(401, json!({"error": "bad key"}));
        assert_eq!(evaluate(&err, &sink), RetryDecision::NoRetry);
    }

    #[test]
    fn test_evaluate_rate_limited_retries() {
        let sink = sink_expecting_error("429 - Rate limit reached");
        let err = UpstreamError::new(429, Value::Null);
        assert_eq!(evaluate(&err, &sink), RetryDecision::Retry);
    }

    #[test]
    fn test_evaluate_server_fault_retries() {
        let sink = sink_expecting_error("500 - The server had an error");
        let err = UpstreamError::new(500, Value::Null);
        assert_eq!(evaluate(&err, &sink), RetryDecision::Retry);
    }

    #[test]
    fn test_evaluate_other_status_is_silent() {
        let mut sink = MockDiagnosticSink::new();
        sink.expect_error().never();
        sink.expect_info().never();

        for status in [400, 403, 404, 502, 503] {
            let err = UpstreamError::new(status, Value::Null);
            assert_eq!(evaluate(&err, &sink), RetryDecision::NoRetry);
        }
    }

    #[test]
    fn test_evaluate_ignores_body() {
        let mut sink = MockDiagnosticSink::new();
        sink.expect_error().never();
        let err = UpstreamError::new(400, json!({"error": {"code": "rate_limit_exceeded"}}));
        assert_eq!(evaluate(&err, &sink), RetryDecision::NoRetry);
    }

    #[test]
    fn test_evaluate_transport_failure_not_retried() {
        let mut sink = MockDiagnosticSink::new();
        sink.expect_error().never();
        let err = UpstreamError::transport("connection refused");
        assert_eq!(evaluate(&err, &sink), RetryDecision::NoRetry);
    }

    #[test]
    fn test_failure_kind_display() {
        assert_eq!(FailureKind::AuthFailure.to_string(), "authentication failure");
        assert!(FailureKind::RateLimited.is_retryable());
        assert!(!FailureKind::OtherUpstreamError.is_retryable());
        assert!(FailureKind::OtherUpstreamError.diagnostic().is_none());
    }
}
