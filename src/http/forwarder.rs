//! Forwarding collaborator: one round trip to the upstream API per call.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::{
    Client, RequestBuilder,
    header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue},
};
use serde_json::Value;

use super::error::UpstreamError;
use crate::request::Headers;

/// Root of the OpenAI-compatible REST API.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/";

/// Performs a single upstream round trip. Owns connection handling, TLS and timeouts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpForwarder: Send + Sync {
    async fn forward_get(
        &self,
        path: &str,
        params: &[(String, String)],
        headers: &Headers,
    ) -> Result<Value, UpstreamError>;

    /// A `Value::Null` body is sent as no body at all.
    async fn forward_post(
        &self,
        path: &str,
        params: &[(String, String)],
        headers: &Headers,
        body: &Value,
    ) -> Result<Value, UpstreamError>;
}

/// [`HttpForwarder`] backed by a reqwest client and a fixed base URL.
#[derive(Clone)]
pub struct ReqwestForwarder {
    client: Client,
    base_url: String,
}

impl ReqwestForwarder {
    /// Wraps an existing client. `base_url` defaults to [`DEFAULT_BASE_URL`].
    pub fn new(client: Client, base_url: Option<String>) -> Self {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self { client, base_url }
    }

    /// Builds the underlying client with the relay's user agent and an optional timeout.
    pub fn build(base_url: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder().user_agent(concat!(
            "whisper-relay/",
            env!("WHISPER_RELAY_VERSION")
        ));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build HTTP client")?;
        Ok(Self::new(client, base_url))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolves a request path against the base URL. Absolute URLs pass through.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, UpstreamError> {
        let response = request
            .send()
            .await
            .map_err(|e| UpstreamError::transport(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            UpstreamError::transport(format!("Failed to read response body: {}", e))
        })?;
        let body = decode_body(&bytes);

        if status.is_success() {
            debug!("Upstream answered HTTP {}", status.as_u16());
            Ok(body)
        } else {
            debug!("Upstream failed with HTTP {}", status.as_u16());
            Err(UpstreamError::new(status.as_u16(), body))
        }
    }
}

#[async_trait]
impl HttpForwarder for ReqwestForwarder {
    #[tracing::instrument(skip(self, params, headers))]
    async fn forward_get(
        &self,
        path: &str,
        params: &[(String, String)],
        headers: &Headers,
    ) -> Result<Value, UpstreamError> {
        let url = self.url_for(path);
        debug!("GET {} with params {:?}...", url, params);

        let request = self
            .client
            .get(&url)
            .query(params)
            .headers(to_header_map(headers)?);

        self.send(request).await
    }

    #[tracing::instrument(skip(self, params, headers, body))]
    async fn forward_post(
        &self,
        path: &str,
        params: &[(String, String)],
        headers: &Headers,
        body: &Value,
    ) -> Result<Value, UpstreamError> {
        let url = self.url_for(path);
        debug!("POST {} with params {:?}...", url, params);

        let mut request = self
            .client
            .post(&url)
            .query(params)
            .headers(to_header_map(headers)?);
        if !body.is_null() {
            request = request.json(body);
        }

        self.send(request).await
    }
}

/// Converts caller headers to a reqwest map, marking the credential header sensitive.
/// Names differing only by case are all sent.
fn to_header_map(headers: &Headers) -> Result<HeaderMap, UpstreamError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| UpstreamError::transport(format!("Invalid header name '{}': {}", name, e)))?;
        let mut header_value = HeaderValue::from_str(value).map_err(|e| {
            UpstreamError::transport(format!("Invalid value for header '{}': {}", name, e))
        })?;
        if header_name == AUTHORIZATION {
            header_value.set_sensitive(true);
        }
        map.append(header_name, header_value);
    }
    Ok(map)
}

/// Empty bodies become `null`, non-JSON bodies a JSON string.
fn decode_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
