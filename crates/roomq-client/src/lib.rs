//! RoomQ client library entry.
//!
//! This crate wires the admission engine from `roomq-core` to the outside
//! world: strict config loading, the shared HTTP client, the queue backend
//! and locker clients, in-process metrics, and the per-request `Visitor`
//! that carries the token and its cookie write.

pub mod backend;
pub mod config;
pub mod http;
pub mod locker;
pub mod obs;
pub mod room;

pub use backend::{BackendResolver, QueueBackendClient, StatusEndpointResolver};
pub use config::RoomQConfig;
pub use locker::{LockerClient, LockerItem, LockerSnapshot};
pub use room::{RoomQ, Visitor};
