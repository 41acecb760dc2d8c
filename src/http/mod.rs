//! Upstream HTTP plumbing: the forwarding collaborator, its error type, and
//! the retry classification applied to that error.

mod error;
mod forwarder;
mod retry;

pub use error::{TRANSPORT_FAILURE_STATUS, UpstreamError};
#[cfg(test)]
pub use forwarder::MockHttpForwarder;
pub use forwarder::{DEFAULT_BASE_URL, HttpForwarder, ReqwestForwarder};
pub use retry::{FailureKind, RetryDecision, classify_error, classify_status, evaluate};
