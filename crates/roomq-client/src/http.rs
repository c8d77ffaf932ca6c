//! Shared HTTP plumbing for the remote clients.
//!
//! - One `reqwest::Client` per `RoomQ`, built from `HttpSection`.
//! - No retries: a failed call surfaces to the caller immediately.
//! - Status codes a caller must tell apart are mapped per operation; every
//!   other non-success becomes `RoomQError::Http` with the status attached.

use std::time::Duration;

use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use roomq_core::error::{Result, RoomQError};

use crate::config::HttpSection;

/// Longest response body excerpt kept in an error message.
const ERROR_BODY_LIMIT: usize = 256;

pub fn build_http_client(cfg: &HttpSection) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_millis(cfg.connect_timeout_ms))
        .timeout(Duration::from_millis(cfg.timeout_ms))
        .build()
        .map_err(transport_error)
}

pub(crate) fn transport_error(e: reqwest::Error) -> RoomQError {
    RoomQError::Http {
        status: e.status().map(|s| s.as_u16()),
        message: e.to_string(),
    }
}

/// `base` with `segments` appended as percent-encoded path segments.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| RoomQError::BadRequest(format!("invalid url {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| RoomQError::BadRequest(format!("url cannot take a path: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Pass 2xx through; otherwise apply `map`, then fall back to `Http`.
pub(crate) async fn check_status<F>(resp: Response, map: F) -> Result<Response>
where
    F: FnOnce(StatusCode) -> Option<RoomQError>,
{
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if let Some(e) = map(status) {
        return Err(e);
    }
    let mut body = resp.text().await.unwrap_or_default();
    if body.len() > ERROR_BODY_LIMIT {
        let mut cut = ERROR_BODY_LIMIT;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    Err(RoomQError::Http {
        status: Some(status.as_u16()),
        message: body,
    })
}

pub(crate) async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T> {
    resp.json::<T>().await.map_err(|e| {
        if e.is_decode() {
            RoomQError::Protocol(format!("unexpected response body: {e}"))
        } else {
            transport_error(e)
        }
    })
}
