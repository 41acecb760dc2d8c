//! Relays GET and POST calls to an OpenAI-compatible REST API, injecting
//! credentials and retrying once on rate limiting or server faults.

pub mod config;
pub mod credentials;
pub mod diagnostics;
pub mod dispatcher;
pub mod http;
pub mod request;
pub mod runtime;

pub use config::{Config, ConfigOverrides};
pub use credentials::{UpstreamCredentials, inject_headers};
pub use diagnostics::{DiagnosticSink, LogSink};
pub use dispatcher::Dispatcher;
pub use http::{HttpForwarder, ReqwestForwarder, UpstreamError};
pub use request::{Headers, Method, OutboundRequest};
