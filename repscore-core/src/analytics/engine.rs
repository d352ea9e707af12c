//! Recompute engine
//!
//! Regenerates every derived table from the raw event tables in dependency
//! order and swaps the result in as a unit.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                      RECOMPUTE ENGINE                         │
//! │                                                               │
//! │  Load ──► Validate ──► DailyStats ──► TrustScore ──► Benchmark│
//! │  (raw snapshot)         (pure)         (pure)         (pure)  │
//! │                                                        │      │
//! │                                                        ▼      │
//! │                              Swap: one write transaction      │
//! │                              (DELETE + INSERT, then COMMIT)   │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every stage except Load and Swap is a pure function of the snapshot, so
//! two runs over unchanged raw data produce identical rows (and an identical
//! fingerprint). A failure in any stage aborts before Swap; the previous
//! derived tables stay authoritative.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use repscore_core::analytics::RecomputeEngine;
//!
//! let engine = RecomputeEngine::new(config);
//! let report = engine.recompute(&db)?;
//! println!("{} trust scores, fingerprint {}", report.trust_score_rows, report.fingerprint);
//! ```

use super::benchmark::compute_industry_benchmarks;
use super::daily_stats::compute_daily_stats;
use super::trust_score::compute_trust_scores;
use super::validation::validate_snapshot;
use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::types::{DerivedTables, RawSnapshot};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::time::Instant;

// ============================================
// Stages and results
// ============================================

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Validate,
    DailyStats,
    TrustScore,
    IndustryBenchmark,
    Swap,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Validate => "validate",
            Stage::DailyStats => "daily_stats",
            Stage::TrustScore => "trust_score",
            Stage::IndustryBenchmark => "industry_benchmark",
            Stage::Swap => "swap",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Timing and output size of one completed stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageRunResult {
    pub stage: Stage,
    pub duration_ms: i64,
    /// Rows read (Load) or produced (other stages)
    pub rows: usize,
}

impl StageRunResult {
    fn finish(stage: Stage, start: Instant, rows: usize) -> Self {
        let duration_ms = start.elapsed().as_millis() as i64;
        tracing::debug!(stage = stage.as_str(), rows, duration_ms, "Stage complete");
        Self {
            stage,
            duration_ms,
            rows,
        }
    }
}

/// Outcome of a successful recompute.
#[derive(Debug, Clone, Serialize)]
pub struct RecomputeReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub stages: Vec<StageRunResult>,
    pub daily_stats_rows: usize,
    pub trust_score_rows: usize,
    pub benchmark_rows: usize,
    /// SHA-256 (hex) of the canonical serialization of all derived rows
    pub fingerprint: String,
}

/// Status of a recorded recompute attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Aborted,
}

impl RunStatus {
    /// Convert to string for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Aborted => "aborted",
        }
    }

    /// Parse status string from storage.
    pub fn from_storage(value: &str) -> Self {
        match value {
            "success" => RunStatus::Success,
            _ => RunStatus::Aborted,
        }
    }
}

/// Row of the `recompute_runs` table.
#[derive(Debug, Clone, Serialize)]
pub struct RecomputeRun {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub status: RunStatus,
    pub failed_stage: Option<String>,
    pub error_message: Option<String>,
    pub daily_stats_rows: i64,
    pub trust_score_rows: i64,
    pub benchmark_rows: i64,
    pub fingerprint: Option<String>,
}

struct StageFailure {
    stage: Stage,
    message: String,
}

impl StageFailure {
    fn new(stage: Stage, message: impl ToString) -> Self {
        Self {
            stage,
            message: message.to_string(),
        }
    }
}

// ============================================
// Engine
// ============================================

/// Runs the derived-metrics pipeline.
pub struct RecomputeEngine {
    config: Config,
}

impl RecomputeEngine {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Compute all derived tables from a raw snapshot without touching storage.
    pub fn derive(&self, snapshot: &RawSnapshot) -> Result<DerivedTables> {
        self.run_pure_stages(snapshot, &mut Vec::new())
            .map_err(|f| Error::ComputationAborted {
                stage: f.stage.to_string(),
                message: f.message,
            })
    }

    /// Regenerate DailyStat, TrustScore and IndustryBenchmark from current raw data.
    ///
    /// Safe to call at startup and on demand. On failure nothing is swapped in
    /// and `Error::ComputationAborted` names the failing stage.
    pub fn recompute(&self, db: &Database) -> Result<RecomputeReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let start = Instant::now();
        let mut stages = Vec::new();

        tracing::info!(run_id, "Starting derived metrics recompute");

        match self.run_stages(db, &mut stages) {
            Ok(derived) => {
                let duration_ms = start.elapsed().as_millis() as i64;
                let fingerprint = fingerprint(&derived)?;

                let report = RecomputeReport {
                    run_id: run_id.clone(),
                    started_at,
                    duration_ms,
                    stages,
                    daily_stats_rows: derived.daily_stats.len(),
                    trust_score_rows: derived.trust_scores.len(),
                    benchmark_rows: derived.industry_benchmarks.len(),
                    fingerprint: fingerprint.clone(),
                };

                Self::record_run(
                    db,
                    &RecomputeRun {
                        id: run_id,
                        started_at,
                        duration_ms,
                        status: RunStatus::Success,
                        failed_stage: None,
                        error_message: None,
                        daily_stats_rows: report.daily_stats_rows as i64,
                        trust_score_rows: report.trust_score_rows as i64,
                        benchmark_rows: report.benchmark_rows as i64,
                        fingerprint: Some(fingerprint),
                    },
                );

                tracing::info!(
                    run_id = report.run_id,
                    daily_stats = report.daily_stats_rows,
                    trust_scores = report.trust_score_rows,
                    benchmarks = report.benchmark_rows,
                    duration_ms,
                    fingerprint = report.fingerprint,
                    "Recompute completed successfully"
                );

                Ok(report)
            }
            Err(failure) => {
                let duration_ms = start.elapsed().as_millis() as i64;

                tracing::error!(
                    run_id,
                    stage = failure.stage.as_str(),
                    error = %failure.message,
                    "Recompute aborted; previous derived tables retained"
                );

                Self::record_run(
                    db,
                    &RecomputeRun {
                        id: run_id,
                        started_at,
                        duration_ms,
                        status: RunStatus::Aborted,
                        failed_stage: Some(failure.stage.to_string()),
                        error_message: Some(failure.message.clone()),
                        daily_stats_rows: 0,
                        trust_score_rows: 0,
                        benchmark_rows: 0,
                        fingerprint: None,
                    },
                );

                Err(Error::ComputationAborted {
                    stage: failure.stage.to_string(),
                    message: failure.message,
                })
            }
        }
    }

    fn run_stages(
        &self,
        db: &Database,
        stages: &mut Vec<StageRunResult>,
    ) -> std::result::Result<DerivedTables, StageFailure> {
        let start = Instant::now();
        let snapshot = db
            .load_raw_snapshot()
            .map_err(|e| StageFailure::new(Stage::Load, e))?;
        stages.push(StageRunResult::finish(
            Stage::Load,
            start,
            snapshot.businesses.len() + snapshot.reviews.len() + snapshot.responses.len(),
        ));

        let derived = self.run_pure_stages(&snapshot, stages)?;

        let start = Instant::now();
        db.replace_derived(&derived)
            .map_err(|e| StageFailure::new(Stage::Swap, e))?;
        stages.push(StageRunResult::finish(
            Stage::Swap,
            start,
            derived.daily_stats.len()
                + derived.trust_scores.len()
                + derived.industry_benchmarks.len(),
        ));

        Ok(derived)
    }

    fn run_pure_stages(
        &self,
        snapshot: &RawSnapshot,
        stages: &mut Vec<StageRunResult>,
    ) -> std::result::Result<DerivedTables, StageFailure> {
        let start = Instant::now();
        let tz = self
            .config
            .aggregation
            .offset()
            .map_err(|e| StageFailure::new(Stage::Validate, e))?;
        validate_snapshot(snapshot).map_err(|v| StageFailure::new(Stage::Validate, v))?;
        stages.push(StageRunResult::finish(Stage::Validate, start, 0));

        let start = Instant::now();
        let daily_stats = compute_daily_stats(&snapshot.reviews, &tz);
        stages.push(StageRunResult::finish(
            Stage::DailyStats,
            start,
            daily_stats.len(),
        ));

        let start = Instant::now();
        let trust_scores =
            compute_trust_scores(&snapshot.reviews, &snapshot.responses, &self.config.scoring);
        stages.push(StageRunResult::finish(
            Stage::TrustScore,
            start,
            trust_scores.len(),
        ));

        let start = Instant::now();
        let industry_benchmarks = compute_industry_benchmarks(&snapshot.businesses, &trust_scores);
        stages.push(StageRunResult::finish(
            Stage::IndustryBenchmark,
            start,
            industry_benchmarks.len(),
        ));

        Ok(DerivedTables {
            daily_stats,
            trust_scores,
            industry_benchmarks,
        })
    }

    fn record_run(db: &Database, run: &RecomputeRun) {
        if let Err(e) = db.insert_recompute_run(run) {
            tracing::warn!(error = %e, "Failed to record recompute run");
        }
    }
}

/// SHA-256 over the JSON serialization of every derived row, in table order.
///
/// JSON floats use shortest round-trip formatting, so equal rows give equal
/// bytes.
pub fn fingerprint(derived: &DerivedTables) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(&derived.daily_stats)?);
    hasher.update(b"\n");
    hasher.update(serde_json::to_vec(&derived.trust_scores)?);
    hasher.update(b"\n");
    hasher.update(serde_json::to_vec(&derived.industry_benchmarks)?);
    Ok(hex::encode(hasher.finalize()))
}
