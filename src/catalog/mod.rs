//! Persistent room catalog with vector nearest-neighbor lookup.
//!
//! Rooms live in a SQLite database next to the unit-length embedding of
//! their description. Lookups are an exact scan ordered by ascending
//! distance; ties keep insertion order.

mod import;
mod room;
pub mod schema;
mod store;

pub use import::{import_rooms, import_rooms_file, load_rooms_file};
pub use room::{Room, RoomFilter};
pub use store::{RoomMatch, RoomStore};

use thiserror::Error;

use crate::embeddings::EmbeddingError;

/// Result alias for catalog operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("catalog was built with embedding model '{stored}', configured model is '{configured}'")]
    ModelMismatch { stored: String, configured: String },
    #[error("invalid room: {0}")]
    InvalidRoom(String),
    #[error("invalid query vector: {0}")]
    InvalidVector(String),
    #[error("invalid database value: {0}")]
    InvalidDbValue(String),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error("catalog task failed: {0}")]
    Task(String),
}
