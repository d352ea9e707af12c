//! Database repository layer
//!
//! Provides query and insert operations for raw events and derived tables.

use crate::analytics::RecomputeRun;
use crate::error::Result;
use crate::types::*;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const DATE_FORMAT: &str = "%Y-%m-%d";

/// A review together with whether it received an owner response.
#[derive(Debug, Clone)]
pub struct ReviewActivity {
    pub review: Review,
    pub responded: bool,
}

/// Row counts of the derived tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DerivedCounts {
    pub daily_stats: i64,
    pub trust_scores: i64,
    pub industry_benchmarks: i64,
}

/// Database handle (single connection per handle).
///
/// Open one handle per concurrent caller. With WAL enabled, readers on
/// other handles see either the previous or the new derived tables while a
/// recompute is swapping them in, never a mix.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an existing database for shared reads only
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.lock();
        super::schema::run_migrations(&conn)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panicked holder cannot leave SQLite in a torn state: every
        // multi-statement write runs inside a transaction.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ============================================
    // Raw event ingestion
    // ============================================

    /// Insert a business
    pub fn insert_business(&self, business: &Business) -> Result<()> {
        let conn = self.lock();
        Self::insert_business_with(&conn, business)
    }

    /// Insert a review
    pub fn insert_review(&self, review: &Review) -> Result<()> {
        let conn = self.lock();
        Self::insert_review_with(&conn, review)
    }

    /// Insert a response
    pub fn insert_response(&self, response: &Response) -> Result<()> {
        let conn = self.lock();
        Self::insert_response_with(&conn, response)
    }

    /// Insert a batch of raw events in a single transaction.
    ///
    /// Returns the number of rows inserted.
    pub fn import_events(&self, events: &RawEvents) -> Result<usize> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        for business in &events.businesses {
            Self::insert_business_with(&tx, business)?;
        }
        for review in &events.reviews {
            Self::insert_review_with(&tx, review)?;
        }
        for response in &events.responses {
            Self::insert_response_with(&tx, response)?;
        }

        tx.commit()?;

        let inserted = events.businesses.len() + events.reviews.len() + events.responses.len();
        tracing::info!(
            businesses = events.businesses.len(),
            reviews = events.reviews.len(),
            responses = events.responses.len(),
            "Imported raw events"
        );
        Ok(inserted)
    }

    fn insert_business_with(conn: &Connection, business: &Business) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO businesses (id, name, industry, location, latitude, longitude)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                business.id,
                business.name,
                business.industry,
                business.location,
                business.latitude,
                business.longitude,
            ],
        )?;
        Ok(())
    }

    fn insert_review_with(conn: &Connection, review: &Review) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO reviews (id, business_id, rating, text, sentiment_score, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                review.id,
                review.business_id,
                review.rating,
                review.text,
                review.sentiment_score,
                format_ts(&review.created_at),
            ],
        )?;
        Ok(())
    }

    fn insert_response_with(conn: &Connection, response: &Response) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO responses (id, review_id, response_text, responded_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                response.id,
                response.review_id,
                response.response_text,
                format_ts(&response.responded_at),
            ],
        )?;
        Ok(())
    }

    // ============================================
    // Snapshot and swap
    // ============================================

    /// Read every raw table, ordered by id, under one lock hold.
    pub fn load_raw_snapshot(&self) -> Result<RawSnapshot> {
        let mut conn = self.lock();
        // Deferred read transaction: all three tables come from one snapshot.
        let tx = conn.transaction()?;

        let businesses = {
            let mut stmt = tx.prepare(
                "SELECT id, name, industry, location, latitude, longitude FROM businesses ORDER BY id",
            )?;
            let rows = stmt.query_map([], Self::row_to_business)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let reviews = {
            let mut stmt = tx.prepare(
                "SELECT id, business_id, rating, text, sentiment_score, created_at FROM reviews ORDER BY id",
            )?;
            let rows = stmt.query_map([], Self::row_to_review)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let responses = {
            let mut stmt = tx.prepare(
                "SELECT id, review_id, response_text, responded_at FROM responses ORDER BY id",
            )?;
            let rows = stmt.query_map([], Self::row_to_response)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        tx.commit()?;

        Ok(RawSnapshot {
            businesses,
            reviews,
            responses,
        })
    }

    /// Replace all derived tables with `derived` in one write transaction.
    ///
    /// The commit is the swap point. On any error the transaction rolls back
    /// and the previous derived tables stay authoritative.
    pub fn replace_derived(&self, derived: &DerivedTables) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute_batch(
            "
            DELETE FROM daily_stats;
            DELETE FROM trust_scores;
            DELETE FROM industry_benchmarks;
            ",
        )?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO daily_stats
                    (business_id, date, review_count, daily_rating, daily_sentiment, running_avg_rating)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for stat in &derived.daily_stats {
                stmt.execute(params![
                    stat.business_id,
                    stat.date.format(DATE_FORMAT).to_string(),
                    stat.review_count,
                    stat.daily_rating,
                    stat.daily_sentiment,
                    stat.running_avg_rating,
                ])?;
            }
        }

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO trust_scores
                    (business_id, trust_score, total_reviews, weighted_rating, response_rate)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )?;
            for score in &derived.trust_scores {
                stmt.execute(params![
                    score.business_id,
                    score.trust_score,
                    score.total_reviews,
                    score.weighted_rating,
                    score.response_rate,
                ])?;
            }
        }

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO industry_benchmarks
                    (industry, p50_rating, p90_rating, p50_trust_score, p90_trust_score, avg_response_rate)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for bench in &derived.industry_benchmarks {
                stmt.execute(params![
                    bench.industry,
                    bench.p50_rating,
                    bench.p90_rating,
                    bench.p50_trust_score,
                    bench.p90_trust_score,
                    bench.avg_response_rate,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Read back every derived table in canonical order.
    pub fn load_derived(&self) -> Result<DerivedTables> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let daily_stats = {
            let mut stmt = tx.prepare(
                r#"
                SELECT business_id, date, review_count, daily_rating, daily_sentiment, running_avg_rating
                FROM daily_stats
                ORDER BY business_id, date
                "#,
            )?;
            let rows = stmt.query_map([], Self::row_to_daily_stat)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let trust_scores = {
            let mut stmt = tx.prepare(
                r#"
                SELECT business_id, trust_score, total_reviews, weighted_rating, response_rate
                FROM trust_scores
                ORDER BY business_id
                "#,
            )?;
            let rows = stmt.query_map([], Self::row_to_trust_score)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let industry_benchmarks = {
            let mut stmt = tx.prepare(
                r#"
                SELECT industry, p50_rating, p90_rating, p50_trust_score, p90_trust_score, avg_response_rate
                FROM industry_benchmarks
                ORDER BY industry
                "#,
            )?;
            let rows = stmt.query_map([], Self::row_to_benchmark)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        tx.commit()?;

        Ok(DerivedTables {
            daily_stats,
            trust_scores,
            industry_benchmarks,
        })
    }

    /// Count rows in each derived table.
    pub fn derived_counts(&self) -> Result<DerivedCounts> {
        let conn = self.lock();
        let counts = conn.query_row(
            r#"
            SELECT
                (SELECT COUNT(*) FROM daily_stats),
                (SELECT COUNT(*) FROM trust_scores),
                (SELECT COUNT(*) FROM industry_benchmarks)
            "#,
            [],
            |r| {
                Ok(DerivedCounts {
                    daily_stats: r.get(0)?,
                    trust_scores: r.get(1)?,
                    industry_benchmarks: r.get(2)?,
                })
            },
        )?;
        Ok(counts)
    }

    // ============================================
    // Recompute runs
    // ============================================

    /// Record a recompute attempt
    pub fn insert_recompute_run(&self, run: &RecomputeRun) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            r#"
            INSERT INTO recompute_runs
                (id, started_at, duration_ms, status, failed_stage, error_message,
                 daily_stats_rows, trust_score_rows, benchmark_rows, fingerprint)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                run.id,
                format_ts(&run.started_at),
                run.duration_ms,
                run.status.as_str(),
                run.failed_stage,
                run.error_message,
                run.daily_stats_rows,
                run.trust_score_rows,
                run.benchmark_rows,
                run.fingerprint,
            ],
        )?;
        Ok(())
    }

    /// Most recent recompute attempts, newest first
    pub fn list_recompute_runs(&self, limit: usize) -> Result<Vec<RecomputeRun>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, started_at, duration_ms, status, failed_stage, error_message,
                   daily_stats_rows, trust_score_rows, benchmark_rows, fingerprint
            FROM recompute_runs
            ORDER BY started_at DESC, rowid DESC
            LIMIT ?
            "#,
        )?;

        let runs = stmt
            .query_map([limit as i64], |row| {
                let status: String = row.get(3)?;
                Ok(RecomputeRun {
                    id: row.get(0)?,
                    started_at: parse_ts(1, row.get(1)?)?,
                    duration_ms: row.get(2)?,
                    status: crate::analytics::RunStatus::from_storage(&status),
                    failed_stage: row.get(4)?,
                    error_message: row.get(5)?,
                    daily_stats_rows: row.get(6)?,
                    trust_score_rows: row.get(7)?,
                    benchmark_rows: row.get(8)?,
                    fingerprint: row.get(9)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(runs)
    }

    // ============================================
    // Query reads
    // ============================================

    /// Get a business by id
    pub fn get_business(&self, id: i64) -> Result<Option<Business>> {
        let conn = self.lock();
        let business = conn
            .query_row(
                "SELECT id, name, industry, location, latitude, longitude FROM businesses WHERE id = ?",
                [id],
                Self::row_to_business,
            )
            .optional()?;
        Ok(business)
    }

    /// List businesses ordered by id
    pub fn list_businesses(&self, limit: usize) -> Result<Vec<BusinessSummary>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT id, name, industry FROM businesses ORDER BY id LIMIT ?")?;
        let rows = stmt
            .query_map([limit as i64], |row| {
                Ok(BusinessSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    industry: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Business joined with its trust score and industry benchmark
    pub fn get_overview(&self, business_id: i64) -> Result<Option<Overview>> {
        let conn = self.lock();
        let overview = conn
            .query_row(
                r#"
                SELECT
                    b.id,
                    b.name,
                    b.industry,
                    b.location,
                    ts.trust_score,
                    ts.total_reviews,
                    ts.weighted_rating,
                    ts.response_rate,
                    ib.p50_trust_score,
                    ib.p90_trust_score
                FROM businesses b
                LEFT JOIN trust_scores ts ON b.id = ts.business_id
                LEFT JOIN industry_benchmarks ib ON b.industry = ib.industry
                WHERE b.id = ?
                "#,
                [business_id],
                |row| {
                    Ok(Overview {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        industry: row.get(2)?,
                        location: row.get(3)?,
                        trust_score: row.get(4)?,
                        total_reviews: row.get(5)?,
                        weighted_rating: row.get(6)?,
                        response_rate: row.get(7)?,
                        industry_avg_trust: row.get(8)?,
                        industry_top_trust: row.get(9)?,
                    })
                },
            )
            .optional()?;
        Ok(overview)
    }

    /// Trust score row for a business
    pub fn get_trust_score(&self, business_id: i64) -> Result<Option<TrustScore>> {
        let conn = self.lock();
        let score = conn
            .query_row(
                r#"
                SELECT business_id, trust_score, total_reviews, weighted_rating, response_rate
                FROM trust_scores WHERE business_id = ?
                "#,
                [business_id],
                Self::row_to_trust_score,
            )
            .optional()?;
        Ok(score)
    }

    /// Benchmark row for an industry
    pub fn get_industry_benchmark(&self, industry: &str) -> Result<Option<IndustryBenchmark>> {
        let conn = self.lock();
        let bench = conn
            .query_row(
                r#"
                SELECT industry, p50_rating, p90_rating, p50_trust_score, p90_trust_score, avg_response_rate
                FROM industry_benchmarks WHERE industry = ?
                "#,
                [industry],
                Self::row_to_benchmark,
            )
            .optional()?;
        Ok(bench)
    }

    /// Daily stat series for a business, oldest first
    pub fn get_daily_stats(&self, business_id: i64) -> Result<Vec<DailyStat>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT business_id, date, review_count, daily_rating, daily_sentiment, running_avg_rating
            FROM daily_stats
            WHERE business_id = ?
            ORDER BY date ASC
            "#,
        )?;
        let rows = stmt
            .query_map([business_id], Self::row_to_daily_stat)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Reviews of a business with their response flag, oldest first
    pub fn get_review_activity(&self, business_id: i64) -> Result<Vec<ReviewActivity>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT
                r.id, r.business_id, r.rating, r.text, r.sentiment_score, r.created_at,
                EXISTS(SELECT 1 FROM responses resp WHERE resp.review_id = r.id)
            FROM reviews r
            WHERE r.business_id = ?
            ORDER BY r.created_at ASC, r.id ASC
            "#,
        )?;
        let rows = stmt
            .query_map([business_id], |row| {
                Ok(ReviewActivity {
                    review: Self::row_to_review(row)?,
                    responded: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Per-location aggregates for locations with at least one review
    pub fn get_location_metrics(&self) -> Result<Vec<LocationMetrics>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT
                b.id,
                b.name,
                b.location,
                b.latitude,
                b.longitude,
                COUNT(r.id) AS review_count,
                AVG(r.rating) AS avg_rating,
                AVG(r.sentiment_score) AS avg_sentiment,
                AVG(r.responded * 1.0) AS response_rate
            FROM businesses b
            JOIN (
                SELECT
                    rv.id,
                    rv.business_id,
                    rv.rating,
                    rv.sentiment_score,
                    EXISTS(SELECT 1 FROM responses resp WHERE resp.review_id = rv.id) AS responded
                FROM reviews rv
            ) r ON r.business_id = b.id
            GROUP BY b.id
            HAVING COUNT(r.id) > 0
            ORDER BY b.id
            "#,
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(LocationMetrics {
                    location_id: row.get(0)?,
                    name: row.get(1)?,
                    city: row.get(2)?,
                    latitude: row.get(3)?,
                    longitude: row.get(4)?,
                    review_count: row.get(5)?,
                    avg_rating: row.get(6)?,
                    avg_sentiment: row.get(7)?,
                    response_rate: row.get(8)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ============================================
    // Row mapping
    // ============================================

    fn row_to_business(row: &Row) -> rusqlite::Result<Business> {
        Ok(Business {
            id: row.get(0)?,
            name: row.get(1)?,
            industry: row.get(2)?,
            location: row.get(3)?,
            latitude: row.get(4)?,
            longitude: row.get(5)?,
        })
    }

    fn row_to_review(row: &Row) -> rusqlite::Result<Review> {
        Ok(Review {
            id: row.get(0)?,
            business_id: row.get(1)?,
            rating: row.get(2)?,
            text: row.get(3)?,
            sentiment_score: row.get(4)?,
            created_at: parse_ts(5, row.get(5)?)?,
        })
    }

    fn row_to_response(row: &Row) -> rusqlite::Result<Response> {
        Ok(Response {
            id: row.get(0)?,
            review_id: row.get(1)?,
            response_text: row.get(2)?,
            responded_at: parse_ts(3, row.get(3)?)?,
        })
    }

    fn row_to_daily_stat(row: &Row) -> rusqlite::Result<DailyStat> {
        let date: String = row.get(1)?;
        let date = NaiveDate::parse_from_str(&date, DATE_FORMAT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
        Ok(DailyStat {
            business_id: row.get(0)?,
            date,
            review_count: row.get(2)?,
            daily_rating: row.get(3)?,
            daily_sentiment: row.get(4)?,
            running_avg_rating: row.get(5)?,
        })
    }

    fn row_to_trust_score(row: &Row) -> rusqlite::Result<TrustScore> {
        Ok(TrustScore {
            business_id: row.get(0)?,
            trust_score: row.get(1)?,
            total_reviews: row.get(2)?,
            weighted_rating: row.get(3)?,
            response_rate: row.get(4)?,
        })
    }

    fn row_to_benchmark(row: &Row) -> rusqlite::Result<IndustryBenchmark> {
        Ok(IndustryBenchmark {
            industry: row.get(0)?,
            p50_rating: row.get(1)?,
            p90_rating: row.get(2)?,
            p50_trust_score: row.get(3)?,
            p90_trust_score: row.get(4)?,
            avg_response_rate: row.get(5)?,
        })
    }
}

/// Fixed-width UTC timestamps so text order matches time order.
fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
