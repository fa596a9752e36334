//! Client configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8080/ws";
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 3_000;
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Fixed-delay retry schedule for abnormal closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub delay: Duration,
    /// Consecutive abnormal closes tolerated before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS), max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS }
    }
}

/// Who is connecting, and to which collaboration room.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionIdentity {
    pub session_id: String,
    pub client_id: String,
}

impl SessionIdentity {
    pub fn new(session_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self { session_id: session_id.into(), client_id: client_id.into() }
    }

    /// Identity with a freshly generated client id.
    pub fn generated(session_id: impl Into<String>) -> Self {
        Self::new(session_id, uuid::Uuid::new_v4().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub server_url: Url,
    pub reconnect: ReconnectPolicy,
    /// How long a terminal may stay `creating` before it is failed locally.
    /// `None` keeps it waiting until the session ends.
    pub create_timeout: Option<Duration>,
}

impl ClientConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `SHELLSYNC_WS_URL`: default `ws://localhost:8080/ws`
    /// - `SHELLSYNC_RECONNECT_DELAY_MS`: default 3000
    /// - `SHELLSYNC_MAX_RECONNECT_ATTEMPTS`: default 10
    /// - `SHELLSYNC_CREATE_TIMEOUT_SECS`: unset means no timeout
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_url = lookup("SHELLSYNC_WS_URL").unwrap_or_else(|| DEFAULT_SERVER_URL.to_owned());
        let server_url = parse_server_url(&raw_url)?;
        let delay_ms = parse_var(&lookup, "SHELLSYNC_RECONNECT_DELAY_MS")?.unwrap_or(DEFAULT_RECONNECT_DELAY_MS);
        let max_attempts =
            parse_var(&lookup, "SHELLSYNC_MAX_RECONNECT_ATTEMPTS")?.unwrap_or(DEFAULT_MAX_RECONNECT_ATTEMPTS);
        let create_timeout = parse_var::<u64>(&lookup, "SHELLSYNC_CREATE_TIMEOUT_SECS")?.map(Duration::from_secs);

        Ok(Self {
            server_url,
            reconnect: ReconnectPolicy { delay: Duration::from_millis(delay_ms), max_attempts },
            create_timeout,
        })
    }

    /// Replace the base endpoint, validating it the same way `from_env` does.
    pub fn with_server_url(mut self, raw: &str) -> Result<Self, ConfigError> {
        self.server_url = parse_server_url(raw)?;
        Ok(self)
    }

    /// Session-scoped endpoint: `<base>?session_id=..&client_id=..`.
    #[must_use]
    pub fn endpoint(&self, identity: &SessionIdentity) -> Url {
        let mut url = self.server_url.clone();
        url.query_pairs_mut()
            .append_pair("session_id", &identity.session_id)
            .append_pair("client_id", &identity.client_id);
        url
    }
}

fn parse_server_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|err| ConfigError::InvalidUrl { url: raw.into(), reason: err.to_string() })?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(ConfigError::InvalidUrl { url: raw.into(), reason: format!("unsupported scheme '{other}'") }),
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value: raw }),
    }
}
