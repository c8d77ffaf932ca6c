//! In-process stand-ins for the status endpoint, queue backend and locker.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use dashmap::{DashMap, DashSet};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::json;

use roomq_client::config::{BackendScheme, LockerSection};
use roomq_client::{LockerItem, RoomQConfig};
use roomq_core::{AdmissionClaims, Leeway, TokenCodec, TokenKind};

pub const ROOM: &str = "room-1";
pub const SECRET: &str = "shared-secret";
pub const API_KEY: &str = "locker-key";
pub const ISSUER: &str = "https://issuer.example/ticket";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn codec() -> TokenCodec {
    TokenCodec::new(&SecretString::from(SECRET.to_string()))
}

pub fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

pub fn serving_claims(session_id: &str, deadline: i64) -> AdmissionClaims {
    AdmissionClaims {
        room_id: ROOM.into(),
        session_id: session_id.into(),
        kind: Some(TokenKind::Other("serving".into())),
        deadline: Some(deadline),
    }
}

pub fn base_config() -> RoomQConfig {
    RoomQConfig::new(ROOM, SecretString::from(SECRET.to_string()), ISSUER)
}

pub struct MockState {
    pub addr: String,
    pub codec: TokenCodec,
    pub room_state: DashMap<String, String>,
    pub status_hits: AtomicUsize,
    pub backend_hits: AtomicUsize,
    /// token -> serving deadline
    pub serving: DashMap<String, i64>,
    pub revoked: DashSet<String>,
    /// token -> items
    pub lockers: DashMap<String, Vec<LockerItem>>,
    pub expire_at: DashMap<String, i64>,
}

pub struct MockRoomQ {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
}

impl MockRoomQ {
    pub async fn spawn() -> Self {
        init_tracing();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let state = Arc::new(MockState {
            addr: addr.to_string(),
            codec: codec(),
            room_state: DashMap::new(),
            status_hits: AtomicUsize::new(0),
            backend_hits: AtomicUsize::new(0),
            serving: DashMap::new(),
            revoked: DashSet::new(),
            lockers: DashMap::new(),
            expire_at: DashMap::new(),
        });

        let app = Router::new()
            .route("/api/rooms/:room", get(room_status))
            .route("/queue/:room", post(queue_action))
            .route("/rooms/:room/servings/:token", get(serving))
            .route("/api/lockers/:client/sessions", get(find_sessions))
            .route(
                "/api/lockers/:client/sessions/:token",
                get(fetch_locker).put(put_locker).delete(flush_locker),
            )
            .route("/api/lockers/:client/sessions/:token/:key", delete(delete_key))
            .with_state(Arc::clone(&state));

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    /// A server answering every request with `500 boom`.
    pub async fn spawn_failing() -> SocketAddr {
        init_tracing();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().fallback(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") });
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    /// Config pointing every remote at this mock.
    pub fn config(&self) -> RoomQConfig {
        let mut cfg = base_config();
        cfg.status_endpoint = format!("http://{}/api/rooms", self.addr);
        cfg.backend_scheme = BackendScheme::Http;
        cfg.locker = Some(LockerSection {
            api_key: SecretString::from(API_KEY.to_string()),
            dev: false,
            base_url: Some(format!("http://{}", self.addr)),
        });
        cfg
    }

    /// Sign a serving token and register it with the backend.
    pub fn serving_token(&self, session_id: &str, deadline: i64) -> String {
        let token = self.state.codec.sign(&serving_claims(session_id, deadline)).unwrap();
        self.state.serving.insert(token.clone(), deadline);
        token
    }

    pub fn stop_room(&self) {
        self.state.room_state.insert(ROOM.into(), "stopped".into());
    }

    pub fn status_hits(&self) -> usize {
        self.state.status_hits.load(Ordering::SeqCst)
    }

    pub fn backend_hits(&self) -> usize {
        self.state.backend_hits.load(Ordering::SeqCst)
    }
}

// --------------------
// Status endpoint
// --------------------
async fn room_status(State(s): State<Arc<MockState>>, Path(room): Path<String>) -> Response {
    s.status_hits.fetch_add(1, Ordering::SeqCst);
    let state = s
        .room_state
        .get(&room)
        .map(|v| v.value().clone())
        .unwrap_or_else(|| "running".into());
    Json(json!({ "state": state, "backend": s.addr })).into_response()
}

// --------------------
// Queue backend
// --------------------
#[derive(Debug, Deserialize)]
struct QueueAction {
    action: String,
    client_id: String,
    id: String,
    #[serde(default)]
    extend_serving_duration: Option<i64>,
}

async fn queue_action(
    State(s): State<Arc<MockState>>,
    Path(room): Path<String>,
    Json(a): Json<QueueAction>,
) -> Response {
    s.backend_hits.fetch_add(1, Ordering::SeqCst);
    if a.client_id != room {
        return StatusCode::BAD_REQUEST.into_response();
    }
    if s.revoked.contains(&a.id) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let Some((_, deadline)) = s.serving.remove(&a.id) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match a.action.as_str() {
        "beep" => {
            let Ok(claims) = s.codec.verify(&a.id, Leeway::Unbounded) else {
                return StatusCode::UNAUTHORIZED.into_response();
            };
            let extended = deadline + a.extend_serving_duration.unwrap_or(0);
            let token = s.codec.sign(&serving_claims(&claims.session_id, extended)).unwrap();
            s.serving.insert(token.clone(), extended);
            Json(json!({ "id": token })).into_response()
        }
        "delete_serving" => Json(json!({})).into_response(),
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn serving(
    State(s): State<Arc<MockState>>,
    Path((_room, token)): Path<(String, String)>,
) -> Response {
    s.backend_hits.fetch_add(1, Ordering::SeqCst);
    if s.revoked.contains(&token) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match s.serving.get(&token) {
        Some(d) => Json(json!({ "deadline": *d.value() })).into_response(),
        None => StatusCode::GONE.into_response(),
    }
}

// --------------------
// Locker
// --------------------
fn authorized(headers: &HeaderMap) -> bool {
    headers.get("api-key").and_then(|v| v.to_str().ok()) == Some(API_KEY)
}

async fn find_sessions(
    State(s): State<Arc<MockState>>,
    Path(_client): Path<String>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let (Some(key), Some(value)) = (q.get("key"), q.get("value")) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let mut sessions: Vec<String> = s
        .lockers
        .iter()
        .filter(|e| e.value().iter().any(|i| &i.key == key && &i.value == value))
        .map(|e| e.key().clone())
        .collect();
    sessions.sort();
    Json(json!({ "sessions": sessions })).into_response()
}

async fn fetch_locker(
    State(s): State<Arc<MockState>>,
    Path((_client, token)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let data = s.lockers.get(&token).map(|v| v.value().clone()).unwrap_or_default();
    let expire_at = s.expire_at.get(&token).map(|v| *v.value());
    Json(json!({ "data": data, "expireAt": expire_at })).into_response()
}

#[derive(Debug, Deserialize)]
struct PutReq {
    data: Vec<LockerItem>,
    #[serde(rename = "expireAt")]
    expire_at: i64,
}

async fn put_locker(
    State(s): State<Arc<MockState>>,
    Path((_client, token)): Path<(String, String)>,
    headers: HeaderMap,
    Json(req): Json<PutReq>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    for item in &req.data {
        let per_key = req.data.iter().filter(|i| i.key == item.key).count();
        if per_key > item.limit as usize {
            return StatusCode::FORBIDDEN.into_response();
        }
        let holders = s
            .lockers
            .iter()
            .filter(|e| e.key() != &token)
            .filter(|e| e.value().iter().any(|i| i.key == item.key && i.value == item.value))
            .count();
        if holders + 1 > item.kv_limit as usize {
            return StatusCode::FORBIDDEN.into_response();
        }
    }
    s.lockers.insert(token.clone(), req.data);
    s.expire_at.insert(token, req.expire_at);
    StatusCode::NO_CONTENT.into_response()
}

async fn delete_key(
    State(s): State<Arc<MockState>>,
    Path((_client, token, key)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if let Some(mut items) = s.lockers.get_mut(&token) {
        items.retain(|i| i.key != key);
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn flush_locker(
    State(s): State<Arc<MockState>>,
    Path((_client, token)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    s.lockers.remove(&token);
    s.expire_at.remove(&token);
    StatusCode::NO_CONTENT.into_response()
}
