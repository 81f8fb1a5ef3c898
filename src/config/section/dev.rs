//! `[dev]` section configuration.
//!
//! Watch mode and hot reload settings.
//!
//! # Example
//!
//! ```toml
//! [dev]
//! port = 4414                 # Local fallback restart endpoint
//! debounce_ms = 300           # Quiet period per changed file
//!
//! [dev.remote]                # Session-authenticated reload (optional)
//! endpoint = "http://127.0.0.1:40120"
//! username = "admin"
//! password = "secret"
//! csrf_header = "x-csrf-token"
//! cookie = "session"          # Cookie name prefix to capture
//! session_ttl_secs = 900      # Reuse a login this long
//! ```
//!
//! `RESFORGE_DEV_PORT`, `RESFORGE_REMOTE_ENDPOINT`,
//! `RESFORGE_REMOTE_USERNAME` and `RESFORGE_REMOTE_PASSWORD` override the
//! file.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ConfigDiagnostics;

pub const DEFAULT_DEV_PORT: u16 = 4414;
pub const DEFAULT_CSRF_HEADER: &str = "x-csrf-token";
/// Shorter than the server-side session expiry.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 15 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevConfig {
    /// Port of the local restart endpoint.
    pub port: u16,

    pub debounce_ms: u64,

    pub remote: RemoteConfig,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_DEV_PORT,
            debounce_ms: 300,
            remote: RemoteConfig::default(),
        }
    }
}

impl DevConfig {
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Apply `RESFORGE_*` overrides from `lookup` (normally the process env).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("RESFORGE_DEV_PORT").and_then(|p| p.trim().parse().ok()) {
            self.port = port;
        }
        if let Some(endpoint) = lookup("RESFORGE_REMOTE_ENDPOINT") {
            self.remote.endpoint = Some(endpoint);
        }
        if let Some(username) = lookup("RESFORGE_REMOTE_USERNAME") {
            self.remote.username = Some(username);
        }
        if let Some(password) = lookup("RESFORGE_REMOTE_PASSWORD") {
            self.remote.password = Some(password);
        }
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.port == 0 {
            diag.error("dev.port", "port must be non-zero");
        }
        self.remote.validate(diag);
    }
}

/// Remote-control endpoint of a running instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub endpoint: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,

    /// Header carrying the CSRF token on command requests.
    pub csrf_header: String,

    /// Name prefix of the session cookie. `None` takes the first cookie.
    pub cookie: Option<String>,

    /// How long a login is reused before logging in again.
    pub session_ttl_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            username: None,
            password: None,
            csrf_header: DEFAULT_CSRF_HEADER.to_string(),
            cookie: None,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
        }
    }
}

/// Complete remote credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub endpoint: String,
    pub username: String,
    pub password: String,
}

impl RemoteConfig {
    pub const fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// All three of endpoint, username and password, or nothing.
    pub fn credentials(&self) -> Option<Credentials> {
        Some(Credentials {
            endpoint: non_empty(&self.endpoint)?.trim_end_matches('/').to_string(),
            username: non_empty(&self.username)?.to_string(),
            password: non_empty(&self.password)?.to_string(),
        })
    }

    fn validate(&self, diag: &mut ConfigDiagnostics) {
        let set = [&self.endpoint, &self.username, &self.password]
            .iter()
            .filter(|v| non_empty(v).is_some())
            .count();

        if set > 0 && set < 3 {
            diag.error_with_hint(
                "dev.remote",
                "remote credentials are partially configured",
                "set endpoint, username and password, or none of them",
            );
        }

        if let Some(endpoint) = non_empty(&self.endpoint) {
            match url::Url::parse(endpoint) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                Ok(url) => diag.error(
                    "dev.remote.endpoint",
                    format!("unsupported scheme `{}`", url.scheme()),
                ),
                Err(e) => diag.error_with_hint(
                    "dev.remote.endpoint",
                    format!("invalid URL `{endpoint}`: {e}"),
                    "e.g. http://127.0.0.1:40120",
                ),
            }
        }

        if self.csrf_header.trim().is_empty() {
            diag.error("dev.remote.csrf_header", "header name is empty");
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}
