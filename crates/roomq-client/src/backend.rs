//! Queue backend client.
//!
//! Every operation first resolves the room's backend through the status
//! endpoint. A `stopped` room fails with `QueueStopped` before any backend
//! call is made.
//!
//! Status mapping for serving operations:
//! - 401 -> `InvalidToken`
//! - 404 / 410 -> `NotServing`

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};

use roomq_core::error::{Result, RoomQError};

use crate::config::BackendScheme;
use crate::http::{check_status, endpoint, read_json, transport_error};
use crate::obs::AdmissionMetrics;

/// Resolves the backend address (`host[:port]`) serving a room.
#[async_trait]
pub trait BackendResolver: Send + Sync {
    async fn resolve(&self, room_id: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct RoomStatus {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    backend: Option<String>,
}

/// `GET <status_endpoint>/<room_id>` -> `{state, backend}`.
pub struct StatusEndpointResolver {
    http: reqwest::Client,
    endpoint: String,
    metrics: Arc<AdmissionMetrics>,
}

impl StatusEndpointResolver {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>, metrics: Arc<AdmissionMetrics>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            metrics,
        }
    }

    async fn fetch(&self, room_id: &str) -> Result<String> {
        let url = endpoint(&self.endpoint, &[room_id])?;
        let resp = self.http.get(url).send().await.map_err(transport_error)?;
        let resp = check_status(resp, |_| None).await?;
        let status: RoomStatus = read_json(resp).await?;

        if status.state.as_deref() == Some("stopped") {
            tracing::warn!(room = %room_id, "queue stopped");
            return Err(RoomQError::QueueStopped);
        }
        status
            .backend
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| RoomQError::Protocol("room status has no backend".into()))
    }
}

#[async_trait]
impl BackendResolver for StatusEndpointResolver {
    async fn resolve(&self, room_id: &str) -> Result<String> {
        let started = Instant::now();
        let res = self.fetch(room_id).await;
        self.metrics.observe_call("status", started.elapsed(), &res);
        res
    }
}

#[derive(Serialize)]
struct QueueAction<'a> {
    action: &'static str,
    client_id: &'a str,
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    extend_serving_duration: Option<u64>,
}

#[derive(Deserialize)]
struct BeepResponse {
    id: String,
}

#[derive(Deserialize)]
struct ServingResponse {
    deadline: i64,
}

fn map_serving_status(status: StatusCode) -> Option<RoomQError> {
    match status {
        StatusCode::UNAUTHORIZED => Some(RoomQError::InvalidToken),
        StatusCode::NOT_FOUND | StatusCode::GONE => Some(RoomQError::NotServing),
        _ => None,
    }
}

/// Serving-window operations against a room's queue backend.
pub struct QueueBackendClient {
    http: reqwest::Client,
    room_id: String,
    scheme: BackendScheme,
    resolver: Arc<dyn BackendResolver>,
    metrics: Arc<AdmissionMetrics>,
}

impl QueueBackendClient {
    pub fn new(
        http: reqwest::Client,
        room_id: impl Into<String>,
        scheme: BackendScheme,
        resolver: Arc<dyn BackendResolver>,
        metrics: Arc<AdmissionMetrics>,
    ) -> Self {
        Self {
            http,
            room_id: room_id.into(),
            scheme,
            resolver,
            metrics,
        }
    }

    /// Backend address for this room.
    pub async fn backend(&self) -> Result<String> {
        self.resolver.resolve(&self.room_id).await
    }

    fn backend_url(&self, backend: &str, segments: &[&str]) -> Result<Url> {
        let base = if backend.contains("://") {
            backend.to_string()
        } else {
            format!("{}://{}", self.scheme, backend)
        };
        endpoint(&base, segments)
    }

    async fn post_action(&self, backend: &str, body: &QueueAction<'_>) -> Result<reqwest::Response> {
        let url = self.backend_url(backend, &["queue", self.room_id.as_str()])?;
        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(resp, map_serving_status).await
    }

    async fn timed<T, F>(&self, op: &str, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let res = fut.await;
        self.metrics.observe_call(op, started.elapsed(), &res);
        if let Err(e) = &res {
            tracing::debug!(room = %self.room_id, op, code = e.code().as_str(), "backend call failed");
        }
        res
    }

    /// Extend the serving window of `token` by `minutes`; returns the
    /// replacement token issued by the backend.
    pub async fn extend(&self, token: &str, minutes: u64) -> Result<String> {
        let backend = self.backend().await?;
        self.timed("extend", async {
            let body = QueueAction {
                action: "beep",
                client_id: &self.room_id,
                id: token,
                extend_serving_duration: Some(minutes.saturating_mul(60)),
            };
            let resp = self.post_action(&backend, &body).await?;
            let beep: BeepResponse = read_json(resp).await?;
            if beep.id.is_empty() {
                return Err(RoomQError::Protocol("backend returned an empty token".into()));
            }
            Ok(beep.id)
        })
        .await
    }

    /// Serving deadline (epoch seconds) of `token`.
    pub async fn serving_deadline(&self, token: &str) -> Result<i64> {
        let backend = self.backend().await?;
        self.timed("serving", async {
            let url = self.backend_url(&backend, &["rooms", self.room_id.as_str(), "servings", token])?;
            let resp = self.http.get(url).send().await.map_err(transport_error)?;
            let resp = check_status(resp, map_serving_status).await?;
            let serving: ServingResponse = read_json(resp).await?;
            Ok(serving.deadline)
        })
        .await
    }

    /// Drop the serving state of `token` on the backend.
    pub async fn delete_serving(&self, token: &str) -> Result<()> {
        let backend = self.backend().await?;
        self.timed("delete_serving", async {
            let body = QueueAction {
                action: "delete_serving",
                client_id: &self.room_id,
                id: token,
                extend_serving_duration: None,
            };
            self.post_action(&backend, &body).await?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serving_status_mapping() {
        assert!(matches!(map_serving_status(StatusCode::UNAUTHORIZED), Some(RoomQError::InvalidToken)));
        assert!(matches!(map_serving_status(StatusCode::NOT_FOUND), Some(RoomQError::NotServing)));
        assert!(matches!(map_serving_status(StatusCode::GONE), Some(RoomQError::NotServing)));
        assert!(map_serving_status(StatusCode::INTERNAL_SERVER_ERROR).is_none());
    }

    #[test]
    fn action_body_shape() {
        let body = QueueAction {
            action: "beep",
            client_id: "room-1",
            id: "tok",
            extend_serving_duration: Some(300),
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"action": "beep", "client_id": "room-1", "id": "tok", "extend_serving_duration": 300})
        );

        let body = QueueAction {
            extend_serving_duration: None,
            action: "delete_serving",
            ..body
        };
        let v = serde_json::to_value(&body).unwrap();
        assert!(v.get("extend_serving_duration").is_none());
    }
}
