//! Session-scoped locker client.
//!
//! Every call carries the static `Api-Key` header. A 401 always maps to
//! `InvalidApiKey`; a 403 on `put` maps to `ReachedLimit`.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use reqwest::{RequestBuilder, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use roomq_core::error::{Result, RoomQError};

use crate::http::{check_status, endpoint, read_json, transport_error};
use crate::obs::AdmissionMetrics;

const API_KEY_HEADER: &str = "Api-Key";

/// One key/value pair with its quotas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockerItem {
    pub key: String,
    pub value: String,
    /// Max number of values this session may hold under `key`.
    pub limit: u32,
    /// Max number of lockers in the room that may hold this exact pair.
    #[serde(rename = "kvLimit")]
    pub kv_limit: u32,
}

impl LockerItem {
    pub fn new(key: impl Into<String>, value: impl Into<String>, limit: u32, kv_limit: u32) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            limit,
            kv_limit,
        }
    }
}

/// Items currently stored for a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockerSnapshot {
    #[serde(default)]
    pub data: Vec<LockerItem>,
    #[serde(rename = "expireAt", default, skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<i64>,
}

#[derive(Serialize)]
struct PutBody<'a> {
    data: &'a [LockerItem],
    #[serde(rename = "expireAt")]
    expire_at: i64,
}

#[derive(Deserialize)]
struct SessionsResponse {
    #[serde(default)]
    sessions: Vec<String>,
}

fn map_auth(status: StatusCode) -> Option<RoomQError> {
    (status == StatusCode::UNAUTHORIZED).then_some(RoomQError::InvalidApiKey)
}

fn map_put(status: StatusCode) -> Option<RoomQError> {
    match status {
        StatusCode::FORBIDDEN => Some(RoomQError::ReachedLimit),
        s => map_auth(s),
    }
}

/// Locker bound to one visitor token.
pub struct LockerClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    api_key: Arc<SecretString>,
    token: String,
    metrics: Arc<AdmissionMetrics>,
}

impl fmt::Debug for LockerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockerClient")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl LockerClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        api_key: Arc<SecretString>,
        token: impl Into<String>,
        metrics: Arc<AdmissionMetrics>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            client_id: client_id.into(),
            api_key,
            token: token.into(),
            metrics,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    fn url(&self, tail: &[&str]) -> Result<Url> {
        let mut segments = vec!["api", "lockers", self.client_id.as_str(), "sessions"];
        segments.extend_from_slice(tail);
        endpoint(&self.base_url, &segments)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header(API_KEY_HEADER, self.api_key.expose_secret())
    }

    async fn timed<T, F>(&self, op: &str, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let res = fut.await;
        self.metrics.observe_call(op, started.elapsed(), &res);
        match &res {
            Err(RoomQError::InvalidApiKey) => tracing::warn!(op, "locker rejected api key"),
            Err(RoomQError::ReachedLimit) => tracing::warn!(op, "locker limit reached"),
            Err(e) => tracing::debug!(op, code = e.code().as_str(), "locker call failed"),
            Ok(_) => tracing::debug!(op, "locker call ok"),
        }
        res
    }

    /// Session ids (tokens) whose locker holds `key = value`.
    pub async fn find_sessions(&self, key: &str, value: &str) -> Result<Vec<String>> {
        self.timed("locker_find", async {
            let url = self.url(&[])?;
            let req = self.http.get(url).query(&[("key", key), ("value", value)]);
            let resp = self.authed(req).send().await.map_err(transport_error)?;
            let resp = check_status(resp, map_auth).await?;
            let body: SessionsResponse = read_json(resp).await?;
            Ok(body.sessions)
        })
        .await
    }

    /// Items stored for this session.
    pub async fn fetch(&self) -> Result<LockerSnapshot> {
        self.timed("locker_fetch", async {
            let url = self.url(&[self.token.as_str()])?;
            let resp = self.authed(self.http.get(url)).send().await.map_err(transport_error)?;
            let resp = check_status(resp, map_auth).await?;
            read_json(resp).await
        })
        .await
    }

    /// Replace this session's items; `expire_at` is epoch seconds.
    pub async fn put(&self, items: &[LockerItem], expire_at: i64) -> Result<()> {
        self.timed("locker_put", async {
            let url = self.url(&[self.token.as_str()])?;
            let body = PutBody {
                data: items,
                expire_at,
            };
            let req = self.authed(self.http.put(url).json(&body));
            let resp = req.send().await.map_err(transport_error)?;
            check_status(resp, map_put).await?;
            Ok(())
        })
        .await
    }

    /// Remove one key from this session's locker.
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.timed("locker_delete", async {
            let url = self.url(&[self.token.as_str(), key])?;
            let resp = self.authed(self.http.delete(url)).send().await.map_err(transport_error)?;
            check_status(resp, map_auth).await?;
            Ok(())
        })
        .await
    }

    /// Remove every item of this session's locker.
    pub async fn flush(&self) -> Result<()> {
        self.timed("locker_flush", async {
            let url = self.url(&[self.token.as_str()])?;
            let resp = self.authed(self.http.delete(url)).send().await.map_err(transport_error)?;
            check_status(resp, map_auth).await?;
            Ok(())
        })
        .await
    }
}
