//! Conversational hotel room search.
//!
//! Room descriptions are embedded into unit vectors and stored in a SQLite
//! catalog; a language-model agent answers guests by calling the
//! `search_rooms` tool, which runs a nearest-neighbor search over that
//! catalog.

pub mod agents;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod embeddings;
pub mod logging;
pub mod providers;
pub mod search;
pub mod sessions;
