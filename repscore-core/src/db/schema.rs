//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: raw events and derived metrics
    r#"
    -- ============================================
    -- LAYER 1: Raw events (append-only)
    -- ============================================

    CREATE TABLE IF NOT EXISTS businesses (
        id               INTEGER PRIMARY KEY,
        name             TEXT NOT NULL,
        industry         TEXT NOT NULL,
        location         TEXT NOT NULL,
        latitude         REAL NOT NULL,
        longitude        REAL NOT NULL
    );

    -- Rating and sentiment ranges are checked by the recompute engine.
    CREATE TABLE IF NOT EXISTS reviews (
        id               INTEGER PRIMARY KEY,
        business_id      INTEGER NOT NULL REFERENCES businesses(id),
        rating           INTEGER NOT NULL,
        text             TEXT NOT NULL DEFAULT '',
        sentiment_score  REAL NOT NULL,
        created_at       DATETIME NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_reviews_business ON reviews(business_id, created_at);

    CREATE TABLE IF NOT EXISTS responses (
        id               INTEGER PRIMARY KEY,
        review_id        INTEGER NOT NULL REFERENCES reviews(id),
        response_text    TEXT NOT NULL DEFAULT '',
        responded_at     DATETIME NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_responses_review ON responses(review_id);

    -- ============================================
    -- LAYER 2: Derived (regenerable)
    -- ============================================

    CREATE TABLE IF NOT EXISTS daily_stats (
        business_id         INTEGER NOT NULL,
        date                DATE NOT NULL,
        review_count        INTEGER NOT NULL,
        daily_rating        REAL NOT NULL,
        daily_sentiment     REAL NOT NULL,
        running_avg_rating  REAL NOT NULL,
        PRIMARY KEY (business_id, date)
    );

    CREATE TABLE IF NOT EXISTS trust_scores (
        business_id         INTEGER PRIMARY KEY,
        trust_score         REAL NOT NULL,
        total_reviews       INTEGER NOT NULL,
        weighted_rating     REAL NOT NULL,
        response_rate       REAL NOT NULL
    );

    CREATE TABLE IF NOT EXISTS industry_benchmarks (
        industry            TEXT PRIMARY KEY,
        p50_rating          REAL NOT NULL,
        p90_rating          REAL NOT NULL,
        p50_trust_score     REAL NOT NULL,
        p90_trust_score     REAL NOT NULL,
        avg_response_rate   REAL NOT NULL
    );
    "#,
    // Version 2: recompute run history
    r#"
    CREATE TABLE IF NOT EXISTS recompute_runs (
        id                  TEXT PRIMARY KEY,
        started_at          DATETIME NOT NULL,
        duration_ms         INTEGER NOT NULL,
        status              TEXT NOT NULL,
        failed_stage        TEXT,
        error_message       TEXT,
        daily_stats_rows    INTEGER NOT NULL DEFAULT 0,
        trust_score_rows    INTEGER NOT NULL DEFAULT 0,
        benchmark_rows      INTEGER NOT NULL DEFAULT 0,
        fingerprint         TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_recompute_runs_started ON recompute_runs(started_at);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute_batch(&format!("PRAGMA user_version = {}", version))?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
