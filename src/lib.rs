//! # Repo Intake
//!
//! Turns a GitHub repository into a ranked selection of files, a set of
//! typed code chunks, a bounded context document and an optional
//! persistent vector index.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌─────────────┐   ┌──────────┐
//! │  GitHub API │──▶│   Selection  │──▶│ Batch fetch │──▶│  Chunks  │
//! │ cache+quota │   │ rank+budget  │   │ per-file TO │   │ +digest  │
//! └─────────────┘   └──────────────┘   └─────────────┘   └────┬─────┘
//!                                                              │
//!                              ┌───────────────────────────────┤
//!                              ▼                               ▼
//!                        ┌──────────┐                    ┌──────────┐
//!                        │  SQLite  │◀───────────────────│   HTTP   │
//!                        │ vectors  │                    │  (axum)  │
//!                        └──────────┘                    └──────────┘
//! ```
//!
//! Pure logic (selection, analysis, chunking, vector ranking) lives in
//! `repo-intake-core`; this crate adds the network, storage and CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Typed failure taxonomy |
//! | [`github`] | GitHub REST client with TTL cache, quota gate and retry |
//! | [`fetcher`] | Batched concurrent content download |
//! | [`pipeline`] | End-to-end run with progress and deadline |
//! | [`progress`] | Progress sinks |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Chunk indexing and semantic search |
//! | [`sqlite_store`] | SQLite-backed vector store |
//! | [`server`] | Vector service HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod analyze;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract_cmd;
pub mod fetcher;
pub mod github;
pub mod index;
pub mod migrate;
pub mod pipeline;
pub mod progress;
pub mod search;
pub mod server;
pub mod sqlite_store;
