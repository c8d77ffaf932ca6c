//! Admission decision: a pure function from token state to outcome.
//!
//! Branch precedence (first match wins):
//! 1. no token                       -> reissue + redirect
//! 2. token fails verification       -> reissue + redirect
//! 3. session id mismatch            -> reissue + redirect
//! 4. deadline elapsed               -> redirect with existing token
//! 5. `type == queue`                -> redirect with existing token
//! 6. `type == self-sign`            -> redirect with existing token
//! 7. otherwise (serving)            -> enter

use crate::token::{AdmissionClaims, TokenKind};

/// What the inbound carrier yielded after verification.
#[derive(Debug, Clone, Copy)]
pub enum TokenState<'a> {
    Absent,
    Invalid,
    Verified(&'a AdmissionClaims),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReissueReason {
    Missing,
    Invalid,
    SessionMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectReason {
    DeadlineExceeded,
    Queued,
    SelfSigned,
}

/// Engine outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Mint a fresh self-signed token and send the visitor to the issuer.
    ReissueAndRedirect(ReissueReason),
    /// Send the visitor to the issuer with the token they already hold.
    RedirectWithExisting(RedirectReason),
    /// Let the visitor through.
    Enter,
}

impl Admission {
    /// Outcome label (metrics/logging).
    pub fn outcome(&self) -> &'static str {
        match self {
            Admission::ReissueAndRedirect(_) => "reissue",
            Admission::RedirectWithExisting(_) => "redirect",
            Admission::Enter => "enter",
        }
    }

    /// Reason label (metrics/logging).
    pub fn reason(&self) -> &'static str {
        match self {
            Admission::ReissueAndRedirect(ReissueReason::Missing) => "no_token",
            Admission::ReissueAndRedirect(ReissueReason::Invalid) => "invalid_token",
            Admission::ReissueAndRedirect(ReissueReason::SessionMismatch) => "session_mismatch",
            Admission::RedirectWithExisting(RedirectReason::DeadlineExceeded) => "deadline_exceeded",
            Admission::RedirectWithExisting(RedirectReason::Queued) => "in_queue",
            Admission::RedirectWithExisting(RedirectReason::SelfSigned) => "self_sign",
            Admission::Enter => "serving",
        }
    }

    pub fn needs_reissue(&self) -> bool {
        matches!(self, Admission::ReissueAndRedirect(_))
    }
}

/// Decide the admission outcome. `session_id` is the caller-known session,
/// if any; `now` is epoch seconds.
pub fn decide(token: TokenState<'_>, session_id: Option<&str>, now: i64) -> Admission {
    let claims = match token {
        TokenState::Absent => return Admission::ReissueAndRedirect(ReissueReason::Missing),
        TokenState::Invalid => return Admission::ReissueAndRedirect(ReissueReason::Invalid),
        TokenState::Verified(c) => c,
    };

    if let Some(expected) = session_id {
        if claims.session_id != expected {
            return Admission::ReissueAndRedirect(ReissueReason::SessionMismatch);
        }
    }

    if claims.deadline_elapsed(now) {
        return Admission::RedirectWithExisting(RedirectReason::DeadlineExceeded);
    }

    match claims.kind {
        Some(TokenKind::Queue) => Admission::RedirectWithExisting(RedirectReason::Queued),
        Some(TokenKind::SelfSign) => Admission::RedirectWithExisting(RedirectReason::SelfSigned),
        _ => Admission::Enter,
    }
}
