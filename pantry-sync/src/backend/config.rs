//! Remote backend configuration

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::SelectorError;

/// Settings key of the saved remote configuration
pub const BACKEND_CONFIG_KEY: &str = "backend_config";

/// Remote mode configuration (`{endpoint, credential}`)
///
/// Persisted in the local settings table while remote mode is active;
/// its absence means local mode.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Backend base URL (e.g. "https://xyz.example.co")
    pub endpoint: String,
    /// API key sent with every request
    pub credential: String,
}

impl RemoteConfig {
    pub fn new(endpoint: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim().to_string(),
            credential: credential.into().trim().to_string(),
        }
    }

    /// Check the endpoint/credential and return the parsed endpoint URL
    pub fn validate(&self) -> Result<Url, SelectorError> {
        if self.credential.is_empty() {
            return Err(SelectorError::MissingCredential);
        }
        let url = Url::parse(&self.endpoint)
            .map_err(|e| SelectorError::InvalidEndpoint(format!("{}: {e}", self.endpoint)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SelectorError::InvalidEndpoint(format!(
                "{}: unsupported scheme '{}'",
                self.endpoint,
                url.scheme()
            )));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(SelectorError::InvalidEndpoint(format!(
                "{}: missing host",
                self.endpoint
            )));
        }
        Ok(url)
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("endpoint", &self.endpoint)
            .field("credential", &"***")
            .finish()
    }
}
