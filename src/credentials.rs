//! Authentication material merged into every relayed request.

use log::debug;

use crate::request::{Headers, OutboundRequest};

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const ORGANIZATION_HEADER: &str = "OpenAI-Organization";

/// Process-wide upstream credentials, loaded once at startup.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct UpstreamCredentials {
    pub api_token: Option<String>,
    pub organization_id: Option<String>,
}

impl UpstreamCredentials {
    /// Builds credentials, dropping blank values.
    pub fn new(api_token: Option<String>, organization_id: Option<String>) -> Self {
        Self {
            api_token: api_token.filter(|t| !is_blank(t)),
            organization_id: organization_id.filter(|o| !is_blank(o)),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.api_token.as_deref().filter(|t| !is_blank(t))
    }

    pub fn organization(&self) -> Option<&str> {
        self.organization_id.as_deref().filter(|o| !is_blank(o))
    }
}

impl std::fmt::Debug for UpstreamCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamCredentials")
            .field("api_token", &self.token().map(mask_secret))
            .field("organization_id", &self.organization_id)
            .finish()
    }
}

/// True when the value is empty or whitespace only.
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Masks a secret for logs, keeping a short prefix and suffix.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 12 {
        return "*********".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}*********{}", head, tail)
}

/// Merges credentials into the request headers.
///
/// Caller-set headers are kept, except `Authorization` and
/// `OpenAI-Organization`, which are overwritten when the matching credential
/// is present. Header names match case-insensitively, as on the wire, so a
/// caller's `authorization` is replaced too. The header map is always present
/// afterwards.
pub fn inject_headers<'a>(
    request: &'a mut OutboundRequest,
    credentials: &UpstreamCredentials,
) -> &'a Headers {
    let headers = request.headers.get_or_insert_with(Headers::new);

    if let Some(token) = credentials.token() {
        set_header(headers, AUTHORIZATION_HEADER, format!("Bearer {}", token));
        debug!("Injected bearer token {}", mask_secret(token));
    }

    if let Some(organization) = credentials.organization() {
        set_header(headers, ORGANIZATION_HEADER, organization.to_string());
    }

    headers
}

/// Inserts `name`, dropping any existing key equal to it ignoring ASCII case.
fn set_header(headers: &mut Headers, name: &str, value: String) {
    headers.retain(|key, _| !key.eq_ignore_ascii_case(name));
    headers.insert(name.to_string(), value);
}
