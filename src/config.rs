//! Startup configuration: credentials, upstream root and client timeout.

use std::time::Duration;

use anyhow::Result;
use log::debug;

use crate::{
    credentials::{UpstreamCredentials, is_blank, mask_secret},
    dispatcher::Dispatcher,
    http::{DEFAULT_BASE_URL, ReqwestForwarder},
    runtime::Runtime,
};

pub const API_TOKEN_ENV: &str = "WHISPER_API_TOKEN";
pub const ORGANIZATION_ID_ENV: &str = "WHISPER_ORGANIZATION_ID";

/// Values given explicitly on the command line. They win over the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_token: Option<String>,
    pub organization_id: Option<String>,
    pub api_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: UpstreamCredentials,
    pub api_url: String,
    pub timeout: Option<Duration>,
}

impl Config {
    /// Resolves configuration once, before any call is served.
    pub fn load<R: Runtime>(runtime: &R, overrides: ConfigOverrides) -> Self {
        let api_token = first_non_blank(overrides.api_token, runtime.env_var(API_TOKEN_ENV).ok());
        let organization_id = first_non_blank(
            overrides.organization_id,
            runtime.env_var(ORGANIZATION_ID_ENV).ok(),
        );

        match api_token.as_deref() {
            Some(token) => debug!("Using API token for authentication: {}", mask_secret(token)),
            None => debug!("No API token configured, requests are sent unauthenticated"),
        }
        if let Some(org) = organization_id.as_deref() {
            debug!("Using organization {}", org);
        }

        let api_url = overrides
            .api_url
            .filter(|url| !is_blank(url))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Self {
            credentials: UpstreamCredentials::new(api_token, organization_id),
            api_url,
            timeout: overrides.timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn build_forwarder(&self) -> Result<ReqwestForwarder> {
        ReqwestForwarder::build(Some(self.api_url.clone()), self.timeout)
    }

    /// Builds a dispatcher that logs diagnostics through the `log` facade.
    pub fn build_dispatcher(self) -> Result<Dispatcher<ReqwestForwarder>> {
        let forwarder = self.build_forwarder()?;
        Ok(Dispatcher::with_log_sink(forwarder, self.credentials))
    }
}

fn first_non_blank(preferred: Option<String>, fallback: Option<String>) -> Option<String> {
    preferred
        .filter(|v| !is_blank(v))
        .or_else(|| fallback.filter(|v| !is_blank(v)))
}
