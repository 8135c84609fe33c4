//! Layered Cache - a two-layer read-through cache engine
//!
//! A bounded in-process near cache in front of a shared far cache (Redis or an
//! in-memory stand-in), with pattern invalidation, warm-up, and statistics.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheEngine, GetOptions};
pub use config::Config;
pub use error::CacheError;
pub use tasks::{spawn_maintenance_task, spawn_warmup_task};
