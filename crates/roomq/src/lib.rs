//! Top-level facade crate for RoomQ admission control.
//!
//! Host applications depend on this crate alone: build a [`RoomQ`] per room,
//! then call `visitor(..).validate(..)` for each inbound request.

pub mod core {
    pub use roomq_core::*;
}

pub mod client {
    pub use roomq_client::*;
}

pub use roomq_client::{LockerClient, LockerItem, RoomQ, RoomQConfig, Visitor};
pub use roomq_core::{RoomQError, SetCookie, ValidationResult};
