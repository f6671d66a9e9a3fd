//! # repo-intake core
//!
//! Pure logic for repo-intake: data models, path rules and conventions,
//! file scoring and selection, per-file analysis, semantic chunk
//! extraction, the vector store abstraction, semantic search, and the
//! bounded context document.
//!
//! This crate performs no network or filesystem I/O and does not depend
//! on tokio, sqlx or reqwest. The `repo-intake` app crate supplies the
//! GitHub client, embedding providers, the SQLite store and the pipeline.

pub mod analysis;
pub mod chunk;
pub mod conventions;
pub mod digest;
pub mod embedding;
pub mod language;
pub mod models;
pub mod rules;
pub mod search;
pub mod select;
pub mod store;
