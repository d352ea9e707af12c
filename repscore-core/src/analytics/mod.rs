//! Analytics module for repscore
//!
//! Turns raw events (Layer 1) into derived tables (Layer 2) and answers
//! queries over both:
//! - Daily stats with running average ratings
//! - Trust scores with Bayesian-shrunk ratings
//! - Industry benchmarks (p50/p90)
//! - Read-only business and geo queries
//!
//! ## Recompute
//!
//! Each stage is a pure function over a [`RawSnapshot`](crate::types::RawSnapshot).
//! [`RecomputeEngine`] runs them in order and swaps the results into storage
//! in a single transaction, so readers never observe a partial set of tables.

pub mod benchmark;
pub mod daily_stats;
pub mod engine;
pub mod geo;
pub mod query;
pub mod trust_score;
pub mod validation;

pub use benchmark::{compute_industry_benchmarks, percentile};
pub use daily_stats::compute_daily_stats;
pub use engine::{
    fingerprint, RecomputeEngine, RecomputeReport, RecomputeRun, RunStatus, Stage,
    StageRunResult,
};
pub use geo::geo_insight;
pub use query::{sentiment_bucket, window_metrics, QueryService};
pub use trust_score::compute_trust_scores;
pub use validation::{validate_snapshot, Violation};
