//! Room config: YAML with unknown keys rejected at every level, then
//! `validate()`. A config that fails either step never builds a `RoomQ`.

pub mod schema;

use std::fs;
use std::path::Path;

use roomq_core::error::{Result, RoomQError};

pub use schema::{BackendScheme, HttpSection, LockerSection, RoomQConfig};

pub fn load_from_file(path: impl AsRef<Path>) -> Result<RoomQConfig> {
    let path = path.as_ref();
    let yaml = fs::read_to_string(path)
        .map_err(|e| RoomQError::Internal(format!("read config {} failed: {e}", path.display())))?;
    let cfg = load_from_str(&yaml).map_err(|e| match e {
        RoomQError::BadRequest(msg) => RoomQError::BadRequest(format!("{}: {msg}", path.display())),
        other => other,
    })?;
    tracing::debug!(path = %path.display(), room = %cfg.client_id, "roomq config loaded");
    Ok(cfg)
}

pub fn load_from_str(yaml: &str) -> Result<RoomQConfig> {
    let cfg = serde_yaml::from_str::<RoomQConfig>(yaml)
        .map_err(|e| RoomQError::BadRequest(format!("config yaml rejected: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
