use std::fmt;

use roomq_core::carrier::{DEFAULT_COOKIE_PREFIX, DEFAULT_COOKIE_TTL_SECS};
use roomq_core::error::{Result, RoomQError};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

pub const DEFAULT_STATUS_ENDPOINT: &str = "https://roomq-dev.noqstatus.com/api/rooms";
pub const LOCKER_BASE_URL: &str = "https://roomq-locker.noq.guru";
pub const LOCKER_DEV_BASE_URL: &str = "https://roomq-locker-dev.noq.guru";

fn secret<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<SecretString, D::Error> {
    String::deserialize(d).map(SecretString::from)
}

fn require_http_url(field: &str, v: &str) -> Result<()> {
    if v.starts_with("http://") || v.starts_with("https://") {
        Ok(())
    } else {
        Err(RoomQError::BadRequest(format!(
            "{field} must be an http(s) URL"
        )))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoomQConfig {
    pub version: u32,

    /// Room id (`noq_c`).
    pub client_id: String,

    #[serde(deserialize_with = "secret")]
    pub jwt_secret: SecretString,

    pub ticket_issuer: String,

    #[serde(default = "default_status_endpoint")]
    pub status_endpoint: String,

    #[serde(default)]
    pub backend_scheme: BackendScheme,

    #[serde(default = "default_cookie_prefix")]
    pub token_cookie_prefix: String,

    #[serde(default = "default_cookie_ttl_secs")]
    pub cookie_ttl_secs: u64,

    #[serde(default)]
    pub http: HttpSection,

    #[serde(default)]
    pub locker: Option<LockerSection>,
}

impl RoomQConfig {
    /// Programmatic config with every optional field at its default.
    pub fn new(
        client_id: impl Into<String>,
        jwt_secret: SecretString,
        ticket_issuer: impl Into<String>,
    ) -> Self {
        Self {
            version: 1,
            client_id: client_id.into(),
            jwt_secret,
            ticket_issuer: ticket_issuer.into(),
            status_endpoint: default_status_endpoint(),
            backend_scheme: BackendScheme::default(),
            token_cookie_prefix: default_cookie_prefix(),
            cookie_ttl_secs: default_cookie_ttl_secs(),
            http: HttpSection::default(),
            locker: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(RoomQError::UnsupportedVersion);
        }
        if self.client_id.trim().is_empty() {
            return Err(RoomQError::BadRequest("client_id must not be empty".into()));
        }
        if self.jwt_secret.expose_secret().is_empty() {
            return Err(RoomQError::BadRequest("jwt_secret must not be empty".into()));
        }
        require_http_url("ticket_issuer", &self.ticket_issuer)?;
        require_http_url("status_endpoint", &self.status_endpoint)?;

        let prefix_ok = !self.token_cookie_prefix.is_empty()
            && self
                .token_cookie_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !prefix_ok {
            return Err(RoomQError::BadRequest(
                "token_cookie_prefix must be non-empty [A-Za-z0-9_-]".into(),
            ));
        }
        if !(60..=604_800).contains(&self.cookie_ttl_secs) {
            return Err(RoomQError::BadRequest(
                "cookie_ttl_secs must be between 60 and 604800".into(),
            ));
        }

        self.http.validate()?;
        if let Some(locker) = &self.locker {
            locker.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendScheme {
    #[default]
    Https,
    Http,
}

impl BackendScheme {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendScheme::Https => "https",
            BackendScheme::Http => "http",
        }
    }
}

impl fmt::Display for BackendScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpSection {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl HttpSection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=60_000).contains(&self.connect_timeout_ms) {
            return Err(RoomQError::BadRequest(
                "http.connect_timeout_ms must be between 100 and 60000".into(),
            ));
        }
        if !(100..=300_000).contains(&self.timeout_ms) {
            return Err(RoomQError::BadRequest(
                "http.timeout_ms must be between 100 and 300000".into(),
            ));
        }
        if self.timeout_ms < self.connect_timeout_ms {
            return Err(RoomQError::BadRequest(
                "http.timeout_ms must not be less than connect_timeout_ms".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LockerSection {
    #[serde(deserialize_with = "secret")]
    pub api_key: SecretString,

    /// Use the development locker service.
    #[serde(default)]
    pub dev: bool,

    /// Explicit base URL; wins over `dev`.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl LockerSection {
    pub fn validate(&self) -> Result<()> {
        if self.api_key.expose_secret().is_empty() {
            return Err(RoomQError::BadRequest("locker.api_key must not be empty".into()));
        }
        if let Some(url) = &self.base_url {
            require_http_url("locker.base_url", url)?;
        }
        Ok(())
    }

    pub fn resolved_base_url(&self) -> &str {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/'),
            None if self.dev => LOCKER_DEV_BASE_URL,
            None => LOCKER_BASE_URL,
        }
    }
}

fn default_status_endpoint() -> String {
    DEFAULT_STATUS_ENDPOINT.into()
}
fn default_cookie_prefix() -> String {
    DEFAULT_COOKIE_PREFIX.into()
}
fn default_cookie_ttl_secs() -> u64 {
    DEFAULT_COOKIE_TTL_SECS
}
fn default_connect_timeout_ms() -> u64 {
    5_000
}
fn default_timeout_ms() -> u64 {
    15_000
}
