//! URL helpers for the admission flow.
//!
//! The admission token must never linger in the address bar, so every URL
//! the engine hands back (entry or issuer `noq_r`) goes through
//! [`strip_admission_param`] first. Stripping works on the raw string: other
//! parameters keep their order and their original percent-encoding.

use serde::Serialize;

use crate::error::{Result, RoomQError};

/// Query parameter carrying the admission token.
pub const TOKEN_PARAM: &str = "noq_t";
/// Query parameter carrying the room (client) id on issuer redirects.
pub const ROOM_PARAM: &str = "noq_c";
/// Query parameter carrying the return URL on issuer redirects.
pub const RETURN_PARAM: &str = "noq_r";

fn is_token_pair(pair: &str) -> bool {
    let key = pair.split_once('=').map_or(pair, |(k, _)| k);
    key.eq_ignore_ascii_case(TOKEN_PARAM)
}

/// Remove every `noq_t` parameter from `url`.
///
/// Returns the input unchanged when it carries no such parameter. A query
/// left empty after stripping loses its `?`.
pub fn strip_admission_param(url: &str) -> String {
    let (head, fragment) = match url.find('#') {
        Some(i) => url.split_at(i),
        None => (url, ""),
    };
    let Some((base, query)) = head.split_once('?') else {
        return url.to_string();
    };

    let pairs: Vec<&str> = query.split('&').collect();
    let kept: Vec<&str> = pairs.iter().copied().filter(|p| !is_token_pair(p)).collect();
    if kept.len() == pairs.len() {
        return url.to_string();
    }

    // Separators next to a removed pair would otherwise survive as `?&` / `&&`.
    let kept: Vec<&str> = kept.into_iter().filter(|p| !p.is_empty()).collect();
    let mut out = String::with_capacity(url.len());
    out.push_str(base);
    if !kept.is_empty() {
        out.push('?');
        out.push_str(&kept.join("&"));
    }
    out.push_str(fragment);
    out
}

#[derive(Serialize)]
struct IssuerQuery<'a> {
    noq_t: &'a str,
    noq_c: &'a str,
    noq_r: &'a str,
}

/// Build `<issuer>?noq_t=<token>&noq_c=<room>&noq_r=<return>`.
///
/// `return_url` is stripped of its own `noq_t` before encoding.
pub fn issuer_redirect_url(issuer: &str, token: &str, room_id: &str, return_url: &str) -> Result<String> {
    let cleaned = strip_admission_param(return_url);
    let query = serde_urlencoded::to_string(IssuerQuery {
        noq_t: token,
        noq_c: room_id,
        noq_r: &cleaned,
    })
    .map_err(|e| RoomQError::Internal(format!("issuer query encode failed: {e}")))?;

    let sep = if issuer.ends_with('?') || issuer.ends_with('&') {
        ""
    } else if issuer.contains('?') {
        "&"
    } else {
        "?"
    };
    Ok(format!("{issuer}{sep}{query}"))
}
