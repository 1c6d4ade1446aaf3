//! Server configuration from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;

const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEFAULT_ACCESS_TTL_SECS: u64 = 900;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Lifetime of an issued access credential.
    pub access_ttl: Duration,
    pub admin_user: String,
    pub admin_password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            access_ttl: Duration::from_secs(DEFAULT_ACCESS_TTL_SECS),
            admin_user: "admin".to_string(),
            admin_password: "admin".to_string(),
        }
    }
}

impl ServerConfig {
    /// Parse the configuration from environment variables.
    ///
    /// Environment variables:
    /// - `STOREDESK_BIND`: listen address (default: "0.0.0.0:8080")
    /// - `STOREDESK_ACCESS_TTL_SECS`: access credential lifetime (default: 900)
    /// - `STOREDESK_ADMIN_USER`: login name accepted by `/api/auth/login` (default: "admin")
    /// - `STOREDESK_ADMIN_PASSWORD`: its password (default: "admin")
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let bind = std::env::var("STOREDESK_BIND")
            .unwrap_or_else(|_| DEFAULT_BIND.to_string())
            .parse()
            .context("STOREDESK_BIND must be a socket address")?;

        let access_ttl = match std::env::var("STOREDESK_ACCESS_TTL_SECS") {
            Ok(raw) => Duration::from_secs(
                raw.trim()
                    .parse()
                    .context("STOREDESK_ACCESS_TTL_SECS must be a whole number of seconds")?,
            ),
            Err(_) => defaults.access_ttl,
        };

        Ok(Self {
            bind,
            access_ttl,
            admin_user: std::env::var("STOREDESK_ADMIN_USER").unwrap_or(defaults.admin_user),
            admin_password: std::env::var("STOREDESK_ADMIN_PASSWORD")
                .unwrap_or(defaults.admin_password),
        })
    }
}
