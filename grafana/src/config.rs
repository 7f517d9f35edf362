//! Provider configuration
//!
//! Values come from the provider block and fall back to environment
//! variables when the block leaves them unset.

use std::fmt;
use tfplug::types::{AttributePath, DynamicValue};
use url::Url;

pub const URL_ENV: &str = "GRAFANA_URL";
pub const AUTH_ENV: &str = "GRAFANA_AUTH";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("url is required (set in provider config or GRAFANA_URL env var)")]
    MissingUrl,

    #[error("auth is required (set in provider config or GRAFANA_AUTH env var)")]
    MissingAuth,

    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("org_id must be a positive whole number, got {0}")]
    InvalidOrgId(f64),
}

#[derive(Clone)]
pub struct ProviderConfig {
    pub url: Url,
    /// API token or `user:password`
    pub auth: String,
    pub org_id: Option<i64>,
}

impl ProviderConfig {
    pub fn from_config(config: &DynamicValue) -> Result<Self, ConfigError> {
        let url = string_or_env(config, "url", URL_ENV).ok_or(ConfigError::MissingUrl)?;
        let auth = string_or_env(config, "auth", AUTH_ENV).ok_or(ConfigError::MissingAuth)?;

        let org_id = match config.get_number(&AttributePath::new("org_id")) {
            Ok(n) if n.fract() == 0.0 && n >= 1.0 => Some(n as i64),
            Ok(n) => return Err(ConfigError::InvalidOrgId(n)),
            Err(_) => None,
        };

        Ok(Self {
            url: parse_url(&url)?,
            auth,
            org_id,
        })
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("url", &self.url.as_str())
            .field("auth", &"<redacted>")
            .field("org_id", &self.org_id)
            .finish()
    }
}

fn string_or_env(config: &DynamicValue, name: &str, env_var: &str) -> Option<String> {
    config
        .get_string(&AttributePath::new(name))
        .ok()
        .filter(|s| !s.is_empty())
        .or_else(|| std::env::var(env_var).ok().filter(|s| !s.is_empty()))
}

/// Parses the Grafana root URL. Only http and https are accepted.
pub fn parse_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!(
            "scheme must be http or https, got {}",
            other
        ))),
    }
}
