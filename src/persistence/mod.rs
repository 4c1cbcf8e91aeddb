//! Signed key/value persistence
//!
//! Features:
//! - Pluggable backing store (in-memory, browser LocalStorage)
//! - Keyed BLAKE3 MAC over every JSON payload
//! - Per-device random key kept alongside the data
//! - Tampered or malformed entries load as the caller's fallback

pub mod signed;
pub mod store;

use thiserror::Error;

pub use signed::SignedStore;
#[cfg(target_arch = "wasm32")]
pub use store::LocalStore;
pub use store::{KeyValueStore, MemoryStore};

/// Well-known record keys
pub mod keys {
    pub const HIGH_SCORE: &str = "hi";
    pub const SETTINGS: &str = "settings";
    pub const LIFETIME: &str = "stats";
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("storage unavailable")]
    Unavailable,
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("signature mismatch for {0:?}")]
    Tampered(String),
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),
}
