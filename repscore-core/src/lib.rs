//! # repscore-core
//!
//! Core library for repscore - a reputation scoring and benchmarking engine.
//!
//! This library provides:
//! - Domain types for businesses, reviews and responses
//! - Database storage layer with SQLite
//! - Recompute pipeline for daily stats, trust scores and industry benchmarks
//! - Query service over the derived tables
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through two layers:
//! - **Layer 1 (Raw):** Append-only business, review and response events
//! - **Layer 2 (Derived):** Materialized tables, regenerable from Layer 1
//!
//! ## Example
//!
//! ```rust,no_run
//! use repscore_core::{Config, Database, QueryService, RecomputeEngine};
//!
//! let config = Config::load().expect("failed to load config");
//!
//! let db = Database::open(&Config::database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! RecomputeEngine::new(config.clone())
//!     .recompute(&db)
//!     .expect("recompute failed");
//!
//! let overview = QueryService::new(&db, &config).overview(1);
//! ```

// Re-export commonly used items at the crate root
pub use analytics::{QueryService, RecomputeEngine};
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use types::*;

// Public modules
pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod types;
