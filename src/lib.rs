//! # Wrapped
//!
//! Per-player, per-year match history summaries: a rate-limited upstream
//! client, idempotent match index and cache, job orchestration with per-key
//! locking and a summary aggregator, served over HTTP.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod models;
pub mod repositories;
pub mod riot;
pub mod server;
pub mod summary;
pub mod telemetry;
pub mod worker_pool;
pub mod wrapped;
pub use migration;
