//! Per-room client and per-request visitor state.
//!
//! `RoomQ` is built once per room and shared (cheap `Clone`). Each inbound
//! request gets a `Visitor`, which owns the request's token and the cookie
//! write the host must emit. Nothing is shared between visitors.

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use secrecy::{ExposeSecret, SecretString};

use roomq_core::carrier::{cookie_name, inbound_token, SetCookie};
use roomq_core::error::{Result, RoomQError};
use roomq_core::{AdmissionEngine, AdmissionRequest, Leeway, TokenCodec, ValidationResult};

use crate::backend::{BackendResolver, QueueBackendClient, StatusEndpointResolver};
use crate::config::{self, RoomQConfig};
use crate::http::build_http_client;
use crate::locker::LockerClient;
use crate::obs::AdmissionMetrics;

pub(crate) fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

#[derive(Clone)]
pub struct RoomQ {
    inner: Arc<RoomQInner>,
}

struct RoomQInner {
    cfg: RoomQConfig,
    engine: AdmissionEngine,
    http: reqwest::Client,
    backend: QueueBackendClient,
    locker_api_key: Option<Arc<SecretString>>,
    cookie_name: String,
    metrics: Arc<AdmissionMetrics>,
}

impl RoomQ {
    /// Build the room client; the backend is resolved via the configured
    /// status endpoint.
    pub fn new(cfg: RoomQConfig) -> Result<Self> {
        let http = build_http_client(&cfg.http)?;
        let metrics = Arc::new(AdmissionMetrics::default());
        let resolver = Arc::new(StatusEndpointResolver::new(
            http.clone(),
            cfg.status_endpoint.clone(),
            Arc::clone(&metrics),
        ));
        Self::build(cfg, http, resolver, metrics)
    }

    /// Build with a custom backend resolver.
    pub fn with_resolver(cfg: RoomQConfig, resolver: Arc<dyn BackendResolver>) -> Result<Self> {
        let http = build_http_client(&cfg.http)?;
        Self::build(cfg, http, resolver, Arc::new(AdmissionMetrics::default()))
    }

    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(config::load_from_file(path)?)
    }

    fn build(
        cfg: RoomQConfig,
        http: reqwest::Client,
        resolver: Arc<dyn BackendResolver>,
        metrics: Arc<AdmissionMetrics>,
    ) -> Result<Self> {
        cfg.validate()?;

        let codec = TokenCodec::new(&cfg.jwt_secret);
        let engine = AdmissionEngine::new(cfg.client_id.clone(), cfg.ticket_issuer.clone(), codec);
        let backend = QueueBackendClient::new(
            http.clone(),
            cfg.client_id.clone(),
            cfg.backend_scheme,
            resolver,
            Arc::clone(&metrics),
        );
        let locker_api_key = cfg
            .locker
            .as_ref()
            .map(|l| Arc::new(SecretString::from(l.api_key.expose_secret().to_string())));
        let cookie_name = cookie_name(&cfg.token_cookie_prefix, &cfg.client_id);

        tracing::debug!(room = %cfg.client_id, issuer = %cfg.ticket_issuer, "roomq client ready");

        Ok(Self {
            inner: Arc::new(RoomQInner {
                cfg,
                engine,
                http,
                backend,
                locker_api_key,
                cookie_name,
                metrics,
            }),
        })
    }

    pub fn cfg(&self) -> &RoomQConfig {
        &self.inner.cfg
    }

    pub fn room_id(&self) -> &str {
        &self.inner.cfg.client_id
    }

    pub fn engine(&self) -> &AdmissionEngine {
        &self.inner.engine
    }

    pub fn cookie_name(&self) -> &str {
        &self.inner.cookie_name
    }

    pub fn metrics(&self) -> &AdmissionMetrics {
        &self.inner.metrics
    }

    /// Backend address currently serving this room.
    pub async fn backend(&self) -> Result<String> {
        self.inner.backend.backend().await
    }

    /// Start per-request state. `current_url` is the full inbound URL;
    /// `cookie_header` the raw `Cookie` header, if any.
    pub fn visitor(&self, current_url: impl Into<String>, cookie_header: Option<&str>) -> Visitor {
        let current_url = current_url.into();
        let token = inbound_token(&current_url, cookie_header, self.cookie_name());
        Visitor {
            room: self.clone(),
            current_url,
            token,
            cookie: None,
        }
    }
}

/// Per-request admission state.
pub struct Visitor {
    room: RoomQ,
    current_url: String,
    token: Option<String>,
    cookie: Option<SetCookie>,
}

impl Visitor {
    /// Token the visitor currently holds.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Latest pending cookie write.
    pub fn cookie(&self) -> Option<&SetCookie> {
        self.cookie.as_ref()
    }

    pub fn take_cookie(&mut self) -> Option<SetCookie> {
        self.cookie.take()
    }

    fn require_token(&self) -> Result<&str> {
        self.token.as_deref().ok_or(RoomQError::InvalidToken)
    }

    fn store_token(&mut self, token: String, now: i64) {
        let ttl = self.room.cfg().cookie_ttl_secs;
        self.cookie = Some(SetCookie::new(
            self.room.cookie_name().to_string(),
            token.clone(),
            ttl,
            now,
        ));
        self.token = Some(token);
    }

    /// Decide whether the visitor may proceed. `return_url` defaults to the
    /// current URL; `session_id` binds the token to a caller-known session.
    pub fn validate(&mut self, return_url: Option<&str>, session_id: Option<&str>) -> Result<ValidationResult> {
        self.validate_at(return_url, session_id, now_epoch())
    }

    /// [`Visitor::validate`] with an explicit clock.
    pub fn validate_at(
        &mut self,
        return_url: Option<&str>,
        session_id: Option<&str>,
        now: i64,
    ) -> Result<ValidationResult> {
        let outcome = self.room.engine().evaluate(&AdmissionRequest {
            token: self.token.as_deref(),
            session_id,
            return_url,
            current_url: &self.current_url,
            now,
        })?;

        self.room.metrics().decisions.inc(&[
            ("outcome", outcome.admission.outcome()),
            ("reason", outcome.admission.reason()),
        ]);

        self.store_token(outcome.token, now);
        Ok(outcome.result)
    }

    /// Extend the serving window by `minutes`; the backend's replacement
    /// token becomes the visitor's token.
    pub async fn extend(&mut self, minutes: u64) -> Result<()> {
        let token = self.require_token()?.to_string();
        let new_token = self.room.inner.backend.extend(&token, minutes).await?;
        self.store_token(new_token, now_epoch());
        Ok(())
    }

    /// Serving deadline (epoch seconds) of the current token.
    pub async fn serving_deadline(&self) -> Result<i64> {
        let token = self.require_token()?;
        self.room.inner.backend.serving_deadline(token).await
    }

    /// Drop serving state on the backend and fall back to a self-signed token
    /// for the same session.
    pub async fn delete_serving(&mut self) -> Result<()> {
        let token = self.require_token()?.to_string();
        let claims = self.room.engine().codec().verify(&token, Leeway::Unbounded)?;

        self.room.inner.backend.delete_serving(&token).await?;

        let fresh = self.room.engine().mint_self_signed(Some(&claims.session_id))?;
        self.store_token(fresh, now_epoch());
        Ok(())
    }

    /// Locker bound to the current token.
    pub fn locker(&self) -> Result<LockerClient> {
        let inner = &self.room.inner;
        let (Some(section), Some(api_key)) = (inner.cfg.locker.as_ref(), inner.locker_api_key.as_ref()) else {
            return Err(RoomQError::BadRequest("locker is not configured".into()));
        };
        Ok(LockerClient::new(
            inner.http.clone(),
            section.resolved_base_url(),
            inner.cfg.client_id.clone(),
            Arc::clone(api_key),
            self.require_token()?,
            Arc::clone(&inner.metrics),
        ))
    }
}
