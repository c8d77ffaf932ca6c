//! RoomQ core: transport-free admission primitives.
//!
//! This crate holds the admission token codec, the decision state machine,
//! the engine that turns a decision into a redirect, and the URL/cookie
//! carrier helpers. It carries no async runtime or HTTP client so the engine
//! can be evaluated (and tested) as a pure function of its inputs.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Malformed tokens
//! and URLs surface as `RoomQError` or fall back to the "no token" branch.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod carrier;
pub mod decision;
pub mod engine;
pub mod error;
pub mod redirect;
pub mod result;
pub mod token;

/// Shared result type.
pub use error::{ErrorCode, Result, RoomQError};

pub use carrier::SetCookie;
pub use decision::Admission;
pub use engine::{AdmissionEngine, AdmissionOutcome, AdmissionRequest};
pub use result::ValidationResult;
pub use token::{AdmissionClaims, Leeway, TokenCodec, TokenKind};
