//! Admission engine: verify, decide, then build the redirect (if any).
//!
//! The engine is pure with respect to the request: current URL, carrier
//! token and wall-clock time all come in through [`AdmissionRequest`].

use std::fmt;

use crate::decision::{decide, Admission, TokenState};
use crate::error::{Result, RoomQError};
use crate::redirect::{issuer_redirect_url, strip_admission_param};
use crate::result::ValidationResult;
use crate::token::{AdmissionClaims, Leeway, TokenCodec};

/// Inputs of one validate() evaluation.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionRequest<'a> {
    /// Token from the carrier (query or cookie), if any.
    pub token: Option<&'a str>,
    /// Caller-known session id; empty strings count as absent.
    pub session_id: Option<&'a str>,
    /// Where the issuer should send the visitor back; defaults to `current_url`.
    pub return_url: Option<&'a str>,
    /// Full URL of the inbound request.
    pub current_url: &'a str,
    /// Epoch seconds.
    pub now: i64,
}

/// Result of an evaluation plus the token the carrier must now hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionOutcome {
    pub admission: Admission,
    /// New or unchanged token; written back to the cookie on every branch.
    pub token: String,
    pub result: ValidationResult,
}

/// Per-room admission engine. Immutable; share freely.
#[derive(Clone)]
pub struct AdmissionEngine {
    room_id: String,
    ticket_issuer: String,
    codec: TokenCodec,
}

impl fmt::Debug for AdmissionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionEngine")
            .field("room_id", &self.room_id)
            .field("ticket_issuer", &self.ticket_issuer)
            .finish_non_exhaustive()
    }
}

impl AdmissionEngine {
    pub fn new(room_id: impl Into<String>, ticket_issuer: impl Into<String>, codec: TokenCodec) -> Self {
        Self {
            room_id: room_id.into(),
            ticket_issuer: ticket_issuer.into(),
            codec,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Sign a fresh self-signed probe token for this room.
    pub fn mint_self_signed(&self, session_id: Option<&str>) -> Result<String> {
        self.codec
            .sign(&AdmissionClaims::self_signed(&self.room_id, session_id))
    }

    /// Run the state machine for one request.
    ///
    /// Invalid or tampered tokens never surface as errors; only failures
    /// other than `InvalidToken` (e.g. signing) propagate.
    pub fn evaluate(&self, req: &AdmissionRequest<'_>) -> Result<AdmissionOutcome> {
        let session_id = req.session_id.filter(|s| !s.is_empty());

        // Expiry is judged through `deadline` below, so signature only here.
        let claims = match req.token {
            None => None,
            Some(t) => match self.codec.verify(t, Leeway::Unbounded) {
                Ok(c) => Some(c),
                Err(RoomQError::InvalidToken) => None,
                Err(e) => return Err(e),
            },
        };
        let state = match (req.token, &claims) {
            (None, _) => TokenState::Absent,
            (Some(_), None) => TokenState::Invalid,
            (Some(_), Some(c)) => TokenState::Verified(c),
        };

        let admission = decide(state, session_id, req.now);
        tracing::debug!(
            room = %self.room_id,
            outcome = admission.outcome(),
            reason = admission.reason(),
            "admission decided"
        );

        let token = match (admission.needs_reissue(), req.token) {
            (false, Some(t)) => t.to_string(),
            _ => self.mint_self_signed(session_id)?,
        };

        let result = match admission {
            Admission::Enter => enter(req.current_url),
            _ => ValidationResult::redirect(issuer_redirect_url(
                &self.ticket_issuer,
                &token,
                &self.room_id,
                req.return_url.unwrap_or(req.current_url),
            )?),
        };

        Ok(AdmissionOutcome {
            admission,
            token,
            result,
        })
    }
}

/// Entry: only redirect (same-origin) when the URL still shows the token.
fn enter(current_url: &str) -> ValidationResult {
    let cleaned = strip_admission_param(current_url);
    if cleaned != current_url {
        ValidationResult::redirect(cleaned)
    } else {
        ValidationResult::proceed()
    }
}
