//! Core domain types for repscore
//!
//! These types represent the raw event model (Layer 1) and the derived
//! metric rows (Layer 2) produced by the recompute engine.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Business** | A reviewed location; carries an industry and coordinates |
//! | **Review** | A customer rating (1-5) with a precomputed sentiment score (-1..1) |
//! | **Response** | An owner reply to a review; at most one per review |
//! | **DailyStat** | Per (business, local day) rollup with a running average |
//! | **TrustScore** | Composite reputation score for one business |
//! | **IndustryBenchmark** | Percentile summary of trust scores within an industry |
//!
//! Derived rows never exist without raw input: a business with no reviews
//! has no `DailyStat` and no `TrustScore` row. Absence means "insufficient
//! data", not "scored zero".

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// Raw events (Layer 1)
// ============================================

/// A business being reviewed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Business {
    pub id: i64,
    pub name: String,
    /// Categorical industry label used for benchmarking
    pub industry: String,
    /// Free-text location (city)
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// A customer review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub business_id: i64,
    /// Star rating, 1 through 5
    pub rating: i64,
    #[serde(default)]
    pub text: String,
    /// Sentiment in [-1, 1], computed upstream
    pub sentiment_score: f64,
    pub created_at: DateTime<Utc>,
}

/// An owner response to a review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: i64,
    pub review_id: i64,
    #[serde(default)]
    pub response_text: String,
    pub responded_at: DateTime<Utc>,
}

/// A batch of raw events, as accepted by `Database::import_events`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEvents {
    #[serde(default)]
    pub businesses: Vec<Business>,
    #[serde(default)]
    pub reviews: Vec<Review>,
    #[serde(default)]
    pub responses: Vec<Response>,
}

/// Immutable snapshot of all raw tables, ordered by id.
///
/// The recompute stages are pure functions over this snapshot.
pub type RawSnapshot = RawEvents;

// ============================================
// Derived rows (Layer 2)
// ============================================

/// One row per (business, local calendar day) with at least one review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStat {
    pub business_id: i64,
    pub date: NaiveDate,
    pub review_count: i64,
    /// Mean rating of that day's reviews
    pub daily_rating: f64,
    /// Mean sentiment of that day's reviews
    pub daily_sentiment: f64,
    /// Mean of every rating for this business up to and including `date`
    pub running_avg_rating: f64,
}

/// Composite reputation score for a business with at least one review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustScore {
    pub business_id: i64,
    /// Bounded composite in [0, 1]
    pub trust_score: f64,
    pub total_reviews: i64,
    /// Shrinkage-adjusted mean rating on the 1-5 scale
    pub weighted_rating: f64,
    /// Fraction of reviews with an owner response
    pub response_rate: f64,
}

/// Percentile summary for one industry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryBenchmark {
    pub industry: String,
    pub p50_rating: f64,
    pub p90_rating: f64,
    pub p50_trust_score: f64,
    pub p90_trust_score: f64,
    pub avg_response_rate: f64,
}

/// Full output of one recompute, swapped in as a unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedTables {
    pub daily_stats: Vec<DailyStat>,
    pub trust_scores: Vec<TrustScore>,
    pub industry_benchmarks: Vec<IndustryBenchmark>,
}

// ============================================
// Query results
// ============================================

/// Business header joined with its trust score and industry benchmark.
///
/// Score and benchmark fields are `None` when the business has no reviews
/// or its industry has no benchmark yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub id: i64,
    pub name: String,
    pub industry: String,
    pub location: String,
    pub trust_score: Option<f64>,
    pub total_reviews: Option<i64>,
    pub weighted_rating: Option<f64>,
    pub response_rate: Option<f64>,
    /// Industry p50 trust score
    pub industry_avg_trust: Option<f64>,
    /// Industry p90 trust score
    pub industry_top_trust: Option<f64>,
}

/// Minimal business listing entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusinessSummary {
    pub id: i64,
    pub name: String,
    pub industry: String,
}

/// Mean rating for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRating {
    /// First day of the month
    pub month: NaiveDate,
    pub avg_rating: f64,
}

/// Sentiment category of a single review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SentimentBucket {
    Positive,
    Neutral,
    Negative,
}

impl SentimentBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentBucket::Positive => "Positive",
            SentimentBucket::Neutral => "Neutral",
            SentimentBucket::Negative => "Negative",
        }
    }
}

impl std::fmt::Display for SentimentBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Review counts per sentiment bucket. All three keys are always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SentimentDistribution {
    #[serde(rename = "Positive")]
    pub positive: i64,
    #[serde(rename = "Neutral")]
    pub neutral: i64,
    #[serde(rename = "Negative")]
    pub negative: i64,
}

impl SentimentDistribution {
    pub fn add(&mut self, bucket: SentimentBucket) {
        match bucket {
            SentimentBucket::Positive => self.positive += 1,
            SentimentBucket::Neutral => self.neutral += 1,
            SentimentBucket::Negative => self.negative += 1,
        }
    }

    pub fn get(&self, bucket: SentimentBucket) -> i64 {
        match bucket {
            SentimentBucket::Positive => self.positive,
            SentimentBucket::Neutral => self.neutral,
            SentimentBucket::Negative => self.negative,
        }
    }

    pub fn total(&self) -> i64 {
        self.positive + self.neutral + self.negative
    }
}

/// Metrics for one trailing window. Zero-review windows report zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WindowMetrics {
    pub review_count: i64,
    pub avg_rating: f64,
    pub neg_sentiment_rate: f64,
    pub response_rate: f64,
}

/// `current - previous` for each window metric.
///
/// A window with no reviews contributes zeros, so a delta next to an empty
/// window reflects the other window's raw value rather than a real change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PerformanceDeltas {
    pub delta_rating: f64,
    pub delta_neg_sentiment: f64,
    pub delta_response_rate: f64,
}

/// Per-location aggregate for the geo overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationMetrics {
    /// Business id of the location
    pub location_id: i64,
    pub name: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    pub review_count: i64,
    pub avg_rating: f64,
    pub avg_sentiment: f64,
    pub response_rate: f64,
}

/// Qualitative verdict of the geo insight heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoVerdict {
    HighVolumeHigherSentiment,
    HighVolumeLowerSentiment,
    Consistent,
    InsufficientData,
}

impl GeoVerdict {
    pub fn message(&self) -> &'static str {
        match self {
            GeoVerdict::HighVolumeHigherSentiment => {
                "High-volume locations show consistently higher sentiment compared to lower-volume locations."
            }
            GeoVerdict::HighVolumeLowerSentiment => {
                "High-volume locations show consistently lower sentiment compared to lower-volume locations."
            }
            GeoVerdict::Consistent => {
                "Sentiment is consistent across both high and low volume locations."
            }
            GeoVerdict::InsufficientData => "Not enough data for insights.",
        }
    }
}

impl std::fmt::Display for GeoVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Geo insight verdict with the numbers it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoInsight {
    pub verdict: GeoVerdict,
    pub insight: String,
    pub top_locations: usize,
    pub bottom_locations: usize,
    pub top_avg_sentiment: f64,
    pub bottom_avg_sentiment: f64,
}
