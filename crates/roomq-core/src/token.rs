//! Admission token codec (HS256 compact JWS).
//!
//! Rules:
//! - Every parse/signature/claim failure collapses into `RoomQError::InvalidToken`.
//! - Clock-skew tolerance is an argument of each `verify` call. Nothing here
//!   holds mutable state, so a codec can be shared across threads.

use std::fmt;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{Result, RoomQError};

/// Largest finite leeway accepted by [`Leeway::Seconds`]. Anything wider
/// should use [`Leeway::Unbounded`].
pub const MAX_LEEWAY_SECS: u64 = 365 * 24 * 60 * 60;

/// Token `type` claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TokenKind {
    /// Issued by the remote ticket issuer once the visitor joined the queue.
    Queue,
    /// Minted locally before the visitor was queued (probe state).
    SelfSign,
    /// Anything else the issuer may put there (e.g. serving tokens).
    Other(String),
}

impl TokenKind {
    pub fn as_str(&self) -> &str {
        match self {
            TokenKind::Queue => "queue",
            TokenKind::SelfSign => "self-sign",
            TokenKind::Other(s) => s,
        }
    }
}

impl From<String> for TokenKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "queue" => TokenKind::Queue,
            "self-sign" => TokenKind::SelfSign,
            _ => TokenKind::Other(s),
        }
    }
}

impl From<TokenKind> for String {
    fn from(kind: TokenKind) -> Self {
        match kind {
            TokenKind::Other(s) => s,
            k => k.as_str().to_string(),
        }
    }
}

/// Claims carried by an admission token.
///
/// Claims outside this set (`exp`, `iat`, issuer extras) are ignored on
/// decode and never re-emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionClaims {
    /// Protected room (tenant) id.
    #[serde(default)]
    pub room_id: String,
    /// Stable visitor session id (UUID for self-signed tokens).
    pub session_id: String,
    /// `type` claim; absent on some issuer tokens.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TokenKind>,
    /// Serving deadline in epoch seconds.
    #[serde(default, deserialize_with = "epoch_secs", skip_serializing_if = "Option::is_none")]
    pub deadline: Option<i64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EpochSecs {
    Whole(i64),
    Fractional(f64),
}

/// Issuers may send fractional seconds; floor keeps `deadline < now` exact
/// for whole-second `now`.
fn epoch_secs<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<i64>, D::Error> {
    Ok(Option::<EpochSecs>::deserialize(d)?.map(|v| match v {
        EpochSecs::Whole(s) => s,
        EpochSecs::Fractional(s) => s.floor() as i64,
    }))
}

impl AdmissionClaims {
    /// Claims for a fresh self-signed probe token. A new UUID v4 is used when
    /// no session id is supplied.
    pub fn self_signed(room_id: &str, session_id: Option<&str>) -> Self {
        let session_id = match session_id {
            Some(s) => s.to_string(),
            None => Uuid::new_v4().to_string(),
        };
        Self {
            room_id: room_id.to_string(),
            session_id,
            kind: Some(TokenKind::SelfSign),
            deadline: None,
        }
    }

    /// True when the token carries a deadline strictly before `now`.
    pub fn deadline_elapsed(&self, now: i64) -> bool {
        matches!(self.deadline, Some(d) if d < now)
    }
}

/// Clock-skew tolerance for a single verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leeway {
    /// Enforce `exp`/`nbf` with this many seconds of tolerance
    /// (clamped to [`MAX_LEEWAY_SECS`]).
    Seconds(u64),
    /// Check the signature only; time-based claims are ignored.
    Unbounded,
}

impl Leeway {
    /// Strict expiry semantics.
    pub const NONE: Leeway = Leeway::Seconds(0);

    fn validation(self) -> Validation {
        let mut v = Validation::new(Algorithm::HS256);
        v.required_spec_claims.clear();
        v.validate_aud = false;
        match self {
            Leeway::Seconds(secs) => {
                v.leeway = secs.min(MAX_LEEWAY_SECS);
                v.validate_exp = true;
                v.validate_nbf = true;
            }
            Leeway::Unbounded => {
                v.validate_exp = false;
                v.validate_nbf = false;
            }
        }
        v
    }
}

/// Signs and verifies admission tokens with a pre-shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &SecretString) -> Self {
        let key = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
        }
    }

    /// Sign claims into a compact token. Deterministic for equal claims.
    pub fn sign(&self, claims: &AdmissionClaims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| RoomQError::Internal(format!("token signing failed: {e}")))
    }

    /// Verify a token and return its claims.
    pub fn verify(&self, token: &str, leeway: Leeway) -> Result<AdmissionClaims> {
        decode::<AdmissionClaims>(token, &self.decoding, &leeway.validation())
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::trace!(kind = ?e.kind(), "token verification failed");
                RoomQError::InvalidToken
            })
    }
}
