//! Client configuration from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use storedesk_shared::api;
use thiserror::Error;
use url::Url;

use crate::stream::BackoffPolicy;

const DEFAULT_API_URL: &str = "http://localhost:8080";
const DEFAULT_TOAST_TTL_MS: u64 = 5000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is not a valid URL: {source}")]
    Url {
        var: &'static str,
        source: url::ParseError,
    },
    #[error("{var} must be an http(s) URL, got scheme '{scheme}'")]
    Scheme { var: &'static str, scheme: String },
    #[error("{var} must be a non-negative integer in range, got '{value}'")]
    Number { var: &'static str, value: String },
}

/// Everything the notification client needs to know about its backend.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the back-office API (http or https).
    pub api_url: Url,
    pub backoff: BackoffPolicy,
    /// How long a toast stays visible.
    pub toast_ttl: Duration,
    /// Override for the credential storage directory.
    pub data_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            backoff: BackoffPolicy::default(),
            toast_ttl: Duration::from_millis(DEFAULT_TOAST_TTL_MS),
            data_dir: None,
        }
    }
}

impl ClientConfig {
    /// Build the configuration from the process environment.
    ///
    /// Environment variables:
    /// - `STOREDESK_API_URL`: API base URL (default: "http://localhost:8080")
    /// - `STOREDESK_BACKOFF_STEP_MS`: reconnect delay per consecutive failure (default: 5000)
    /// - `STOREDESK_BACKOFF_CAP_MS`: upper bound on the reconnect delay (default: 30000)
    /// - `STOREDESK_REFRESH_AFTER`: consecutive failures before refreshing credentials (default: 2)
    /// - `STOREDESK_TOAST_TTL_MS`: toast lifetime (default: 5000)
    /// - `STOREDESK_DATA_DIR`: credential storage directory (default: platform config dir)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_url = match lookup("STOREDESK_API_URL") {
            Some(raw) => {
                let url = Url::parse(raw.trim()).map_err(|source| ConfigError::Url {
                    var: "STOREDESK_API_URL",
                    source,
                })?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(ConfigError::Scheme {
                        var: "STOREDESK_API_URL",
                        scheme: url.scheme().to_string(),
                    });
                }
                url
            }
            None => defaults.api_url,
        };

        let millis = |var: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            parse_number::<u64>(&lookup, var)
                .map(|value| value.map(Duration::from_millis).unwrap_or(default))
        };

        let backoff = BackoffPolicy {
            step: millis("STOREDESK_BACKOFF_STEP_MS", defaults.backoff.step)?,
            cap: millis("STOREDESK_BACKOFF_CAP_MS", defaults.backoff.cap)?,
            refresh_after: parse_number::<u32>(&lookup, "STOREDESK_REFRESH_AFTER")?
                .unwrap_or(defaults.backoff.refresh_after),
        };

        Ok(Self {
            api_url,
            backoff,
            toast_ttl: millis("STOREDESK_TOAST_TTL_MS", defaults.toast_ttl)?,
            data_dir: lookup("STOREDESK_DATA_DIR").map(PathBuf::from),
        })
    }

    /// Config pointing at a specific backend, everything else default.
    pub fn for_api(api_url: Url) -> Self {
        Self {
            api_url,
            ..Self::default()
        }
    }

    /// Push channel URL carrying `access_token`.
    pub fn stream_url(&self, access_token: &str) -> Url {
        let mut url = self.api_url.clone();
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        // http -> ws and https -> wss are always permitted by the url crate
        let _ = url.set_scheme(scheme);
        let path = format!("{}{}", url.path().trim_end_matches('/'), api::STREAM_PATH);
        url.set_path(&path);
        url.set_query(None);
        url.query_pairs_mut()
            .append_pair(api::TOKEN_QUERY_PARAM, access_token);
        url
    }
}

fn parse_number<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Number { var, value: raw }),
        None => Ok(None),
    }
}
