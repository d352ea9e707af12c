//! Read-only query service
//!
//! Combines the materialized derived tables with raw events to answer
//! business-level and fleet-level questions. Every operation is independent
//! and side-effect free.
//!
//! Zero-review windows report zeros rather than a "no data" marker. A
//! performance delta next to an empty window is therefore the other window's
//! raw value, not a real change; callers showing trend direction should check
//! [`WindowMetrics::review_count`] first.

use super::geo::geo_insight;
use crate::config::{Config, SentimentConfig};
use crate::db::{Database, ReviewActivity};
use crate::error::{Error, Result};
use crate::types::*;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use std::collections::BTreeMap;

/// Classify a sentiment score with the configured cutoffs.
pub fn sentiment_bucket(score: f64, config: &SentimentConfig) -> SentimentBucket {
    if score > config.positive_threshold {
        SentimentBucket::Positive
    } else if score < config.negative_threshold {
        SentimentBucket::Negative
    } else {
        SentimentBucket::Neutral
    }
}

/// Aggregate one window of reviews. An empty window is all zeros.
pub fn window_metrics(reviews: &[&ReviewActivity], negative_threshold: f64) -> WindowMetrics {
    if reviews.is_empty() {
        return WindowMetrics::default();
    }

    let n = reviews.len() as f64;
    let rating_sum: i64 = reviews.iter().map(|a| a.review.rating).sum();
    let negative = reviews
        .iter()
        .filter(|a| a.review.sentiment_score < negative_threshold)
        .count();
    let responded = reviews.iter().filter(|a| a.responded).count();

    WindowMetrics {
        review_count: reviews.len() as i64,
        avg_rating: rating_sum as f64 / n,
        neg_sentiment_rate: negative as f64 / n,
        response_rate: responded as f64 / n,
    }
}

/// `instant - days`, or the earliest representable instant when that underflows.
fn days_before(instant: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    instant
        .checked_sub_signed(Duration::days(i64::from(days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Midnight of `now`'s local calendar day, as a UTC instant.
fn start_of_local_day(now: DateTime<Utc>, tz: &FixedOffset) -> DateTime<Utc> {
    let local_midnight = now.with_timezone(tz).date_naive().and_time(NaiveTime::MIN);
    DateTime::from_naive_utc_and_offset(
        local_midnight - Duration::seconds(i64::from(tz.local_minus_utc())),
        Utc,
    )
}

/// Read-only façade over the derived tables and raw events.
pub struct QueryService<'a> {
    db: &'a Database,
    config: &'a Config,
    now: Option<DateTime<Utc>>,
}

impl<'a> QueryService<'a> {
    pub fn new(db: &'a Database, config: &'a Config) -> Self {
        Self {
            db,
            config,
            now: None,
        }
    }

    /// Evaluate trailing windows relative to a fixed instant instead of the wall clock.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    /// List businesses, ordered by id
    pub fn list_businesses(&self, limit: usize) -> Result<Vec<BusinessSummary>> {
        self.db.list_businesses(limit)
    }

    /// Business header with trust score and industry benchmark.
    ///
    /// `BusinessNotFound` when the id is not in the business table, even if
    /// reviews or derived rows reference it.
    pub fn overview(&self, business_id: i64) -> Result<Overview> {
        self.db
            .get_overview(business_id)?
            .ok_or(Error::BusinessNotFound(business_id))
    }

    /// Daily stat series, oldest first. Empty for a business without reviews.
    pub fn trend(&self, business_id: i64) -> Result<Vec<DailyStat>> {
        self.db.get_daily_stats(business_id)
    }

    /// Mean rating per local calendar month, oldest first.
    pub fn rating_trend_monthly(&self, business_id: i64) -> Result<Vec<MonthlyRating>> {
        let tz = self.config.aggregation.offset()?;
        let activity = self.db.get_review_activity(business_id)?;

        let mut months: BTreeMap<NaiveDate, (i64, i64)> = BTreeMap::new();
        for a in &activity {
            let local = a.review.created_at.with_timezone(&tz).date_naive();
            let Some(month) = NaiveDate::from_ymd_opt(local.year(), local.month(), 1) else {
                continue;
            };
            let entry = months.entry(month).or_insert((0, 0));
            entry.0 += a.review.rating;
            entry.1 += 1;
        }

        Ok(months
            .into_iter()
            .map(|(month, (sum, count))| MonthlyRating {
                month,
                avg_rating: sum as f64 / count as f64,
            })
            .collect())
    }

    /// Benchmark row of the business's industry.
    pub fn benchmark(&self, business_id: i64) -> Result<IndustryBenchmark> {
        let business = self
            .db
            .get_business(business_id)?
            .ok_or(Error::BusinessNotFound(business_id))?;

        self.db
            .get_industry_benchmark(&business.industry)?
            .ok_or(Error::BenchmarkNotFound(business.industry))
    }

    /// Sentiment buckets over reviews created within the last `window_days`.
    ///
    /// All three buckets are always present and sum to the window's review count.
    pub fn sentiment_distribution(
        &self,
        business_id: i64,
        window_days: u32,
    ) -> Result<SentimentDistribution> {
        let cutoff = days_before(self.now(), window_days);
        let activity = self.db.get_review_activity(business_id)?;

        let mut dist = SentimentDistribution::default();
        for a in activity.iter().filter(|a| a.review.created_at >= cutoff) {
            dist.add(sentiment_bucket(a.review.sentiment_score, &self.config.sentiment));
        }
        Ok(dist)
    }

    /// Current and previous trailing windows, anchored at the start of today.
    pub fn window_comparison(&self, business_id: i64) -> Result<(WindowMetrics, WindowMetrics)> {
        let tz = self.config.aggregation.offset()?;
        let today = start_of_local_day(self.now(), &tz);
        let current_start = days_before(today, self.config.deltas.current_window_days);
        let previous_start = days_before(today, self.config.deltas.previous_window_days);

        let activity = self.db.get_review_activity(business_id)?;
        let current: Vec<&ReviewActivity> = activity
            .iter()
            .filter(|a| a.review.created_at >= current_start)
            .collect();
        let previous: Vec<&ReviewActivity> = activity
            .iter()
            .filter(|a| {
                a.review.created_at >= previous_start && a.review.created_at < current_start
            })
            .collect();

        let negative_threshold = self.config.sentiment.negative_threshold;
        Ok((
            window_metrics(&current, negative_threshold),
            window_metrics(&previous, negative_threshold),
        ))
    }

    /// `current - previous` for rating, negative-sentiment rate and response rate.
    pub fn performance_deltas(&self, business_id: i64) -> Result<PerformanceDeltas> {
        let (current, previous) = self.window_comparison(business_id)?;

        tracing::debug!(
            business_id,
            current_reviews = current.review_count,
            previous_reviews = previous.review_count,
            "Computed performance windows"
        );

        Ok(PerformanceDeltas {
            delta_rating: current.avg_rating - previous.avg_rating,
            delta_neg_sentiment: current.neg_sentiment_rate - previous.neg_sentiment_rate,
            delta_response_rate: current.response_rate - previous.response_rate,
        })
    }

    /// Per-location aggregates for locations with at least one review.
    pub fn geo_overview(&self) -> Result<Vec<LocationMetrics>> {
        self.db.get_location_metrics()
    }

    /// Heuristic verdict comparing busy and quiet locations.
    pub fn geo_insight(&self) -> Result<GeoInsight> {
        let locations = self.db.get_location_metrics()?;
        Ok(geo_insight(&locations, &self.config.geo_insight))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::RecomputeEngine;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 30, 15, 0, 0).unwrap()
    }

    fn days_ago(days: i64) -> DateTime<Utc> {
        now() - Duration::days(days)
    }

    struct Fixture {
        db: Database,
        config: Config,
    }

    impl Fixture {
        fn new() -> Self {
            crate::logging::init_test();
            let db = Database::open_in_memory().unwrap();
            db.migrate().unwrap();
            Self {
                db,
                config: Config::default(),
            }
        }

        fn business(&self, id: i64, industry: &str) {
            self.db
                .insert_business(&Business {
                    id,
                    name: format!("Business {}", id),
                    industry: industry.to_string(),
                    location: format!("City {}", id),
                    latitude: 6.5,
                    longitude: 3.4,
                })
                .unwrap();
        }

        fn review(
            &self,
            id: i64,
            business_id: i64,
            rating: i64,
            sentiment: f64,
            at: DateTime<Utc>,
        ) {
            self.db
                .insert_review(&Review {
                    id,
                    business_id,
                    rating,
                    text: String::new(),
                    sentiment_score: sentiment,
                    created_at: at,
                })
                .unwrap();
        }

        fn respond(&self, id: i64, review_id: i64, at: DateTime<Utc>) {
            self.db
                .insert_response(&Response {
                    id,
                    review_id,
                    response_text: String::new(),
                    responded_at: at,
                })
                .unwrap();
        }

        fn recompute(&self) {
            RecomputeEngine::new(self.config.clone())
                .recompute(&self.db)
                .unwrap();
        }

        fn service(&self) -> QueryService<'_> {
            QueryService::new(&self.db, &self.config).at(now())
        }
    }

    #[test]
    fn test_overview_unknown_business_is_not_found() {
        let fx = Fixture::new();
        fx.business(1, "Retail");
        fx.recompute();

        let err = fx.service().overview(999_999).unwrap_err();
        assert!(matches!(err, Error::BusinessNotFound(999_999)));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_overview_joins_score_and_benchmark() {
        let fx = Fixture::new();
        fx.business(1, "Retail");
        fx.review(1, 1, 5, 0.9, days_ago(3));
        fx.respond(1, 1, days_ago(2));
        fx.recompute();

        let overview = fx.service().overview(1).unwrap();
        assert_eq!(overview.total_reviews, Some(1));
        assert_eq!(overview.response_rate, Some(1.0));
        // Single-business industry: p50 = p90 = own score
        assert_eq!(overview.industry_avg_trust, overview.trust_score);
        assert_eq!(overview.industry_top_trust, overview.trust_score);
    }

    #[test]
    fn test_overview_without_reviews_has_empty_scores() {
        let fx = Fixture::new();
        fx.business(1, "Retail");
        fx.recompute();

        let overview = fx.service().overview(1).unwrap();
        assert!(overview.trust_score.is_none());
        assert!(overview.total_reviews.is_none());
    }

    #[test]
    fn test_trend_is_ordered_and_empty_without_reviews() {
        let fx = Fixture::new();
        fx.business(1, "Retail");
        fx.business(2, "Retail");
        fx.review(1, 1, 2, 0.0, days_ago(1));
        fx.review(2, 1, 4, 0.0, days_ago(10));
        fx.recompute();

        let trend = fx.service().trend(1).unwrap();
        assert_eq!(trend.len(), 2);
        assert!(trend[0].date < trend[1].date);
        assert!((trend[1].running_avg_rating - 3.0).abs() < 1e-9);

        assert!(fx.service().trend(2).unwrap().is_empty());
        assert!(fx.service().trend(999_999).unwrap().is_empty());
    }

    #[test]
    fn test_benchmark_not_found_cases() {
        let fx = Fixture::new();
        fx.business(1, "Retail");
        fx.business(2, "Hospitality");
        fx.review(1, 1, 4, 0.3, days_ago(1));
        fx.recompute();

        assert!(fx.service().benchmark(1).is_ok());
        assert!(matches!(
            fx.service().benchmark(2).unwrap_err(),
            Error::BenchmarkNotFound(ref industry) if industry == "Hospitality"
        ));
        assert!(matches!(
            fx.service().benchmark(42).unwrap_err(),
            Error::BusinessNotFound(42)
        ));
    }

    #[test]
    fn test_sentiment_distribution_buckets_window() {
        let fx = Fixture::new();
        fx.business(1, "Retail");
        fx.review(1, 1, 5, 0.8, days_ago(1));
        fx.review(2, 1, 4, 0.2, days_ago(5));
        fx.review(3, 1, 1, -0.6, days_ago(20));
        fx.review(4, 1, 1, -0.9, days_ago(90));

        let dist = fx.service().sentiment_distribution(1, 60).unwrap();
        assert_eq!(dist.positive, 1);
        // Exactly 0.2 is not above the cutoff
        assert_eq!(dist.neutral, 1);
        assert_eq!(dist.negative, 1);
        assert_eq!(dist.total(), 3);

        let wide = fx.service().sentiment_distribution(1, 365).unwrap();
        assert_eq!(wide.total(), 4);
    }

    #[test]
    fn test_sentiment_distribution_without_reviews() {
        let fx = Fixture::new();
        fx.business(1, "Retail");

        let dist = fx.service().sentiment_distribution(1, 60).unwrap();
        assert_eq!(dist, SentimentDistribution::default());
        assert_eq!(dist.total(), 0);
    }

    #[test]
    fn test_deltas_with_empty_previous_window() {
        let fx = Fixture::new();
        fx.business(1, "Retail");
        fx.review(1, 1, 4, 0.5, days_ago(2));
        fx.review(2, 1, 2, -0.5, days_ago(10));
        fx.respond(1, 1, days_ago(1));

        let (current, previous) = fx.service().window_comparison(1).unwrap();
        assert_eq!(current.review_count, 2);
        assert_eq!(previous, WindowMetrics::default());

        let deltas = fx.service().performance_deltas(1).unwrap();
        assert!((deltas.delta_rating - 3.0).abs() < 1e-12);
        assert!((deltas.delta_neg_sentiment - 0.5).abs() < 1e-12);
        assert!((deltas.delta_response_rate - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_deltas_compare_windows() {
        let fx = Fixture::new();
        fx.business(1, "Retail");
        // Current window
        fx.review(1, 1, 5, 0.6, days_ago(5));
        // Previous window
        fx.review(2, 1, 3, -0.5, days_ago(40));
        fx.review(3, 1, 1, -0.7, days_ago(45));
        fx.respond(1, 2, days_ago(39));
        // Older than both windows
        fx.review(4, 1, 1, -1.0, days_ago(75));

        let deltas = fx.service().performance_deltas(1).unwrap();
        assert!((deltas.delta_rating - 3.0).abs() < 1e-12);
        assert!((deltas.delta_neg_sentiment + 1.0).abs() < 1e-12);
        assert!((deltas.delta_response_rate + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_window_boundary_uses_start_of_day() {
        let fx = Fixture::new();
        fx.business(1, "Retail");
        // now is 15:00; 30 days back at 00:30 is inside the current window,
        // 30 days back at 00:00 minus one minute is in the previous one.
        let today = Utc.with_ymd_and_hms(2025, 9, 30, 0, 0, 0).unwrap();
        fx.review(1, 1, 5, 0.0, today - Duration::days(30) + Duration::minutes(30));
        fx.review(2, 1, 1, 0.0, today - Duration::days(30) - Duration::minutes(1));

        let (current, previous) = fx.service().window_comparison(1).unwrap();
        assert_eq!(current.review_count, 1);
        assert_eq!(previous.review_count, 1);
        assert_eq!(current.avg_rating, 5.0);
    }

    #[test]
    fn test_monthly_rating_trend() {
        let fx = Fixture::new();
        fx.business(1, "Retail");
        fx.review(1, 1, 5, 0.0, Utc.with_ymd_and_hms(2025, 7, 3, 9, 0, 0).unwrap());
        fx.review(2, 1, 3, 0.0, Utc.with_ymd_and_hms(2025, 7, 28, 9, 0, 0).unwrap());
        fx.review(3, 1, 2, 0.0, Utc.with_ymd_and_hms(2025, 9, 1, 9, 0, 0).unwrap());

        let months = fx.service().rating_trend_monthly(1).unwrap();
        assert_eq!(months.len(), 2);
        assert_eq!(months[0].month, NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        assert_eq!(months[0].avg_rating, 4.0);
        assert_eq!(months[1].month, NaiveDate::from_ymd_opt(2025, 9, 1).unwrap());
    }

    #[test]
    fn test_geo_overview_and_insight() {
        let fx = Fixture::new();
        fx.business(1, "Retail");
        fx.business(2, "Retail");
        fx.business(3, "Retail");
        let mut id = 0;
        for _ in 0..6 {
            id += 1;
            fx.review(id, 1, 2, -0.6, days_ago(id));
        }
        id += 1;
        fx.review(id, 2, 5, 0.7, days_ago(1));

        let locations = fx.service().geo_overview().unwrap();
        assert_eq!(locations.len(), 2);

        let insight = fx.service().geo_insight().unwrap();
        assert_eq!(insight.verdict, GeoVerdict::HighVolumeLowerSentiment);
    }

    #[test]
    fn test_oversized_windows_cover_whole_history() {
        let mut fx = Fixture::new();
        fx.business(1, "Retail");
        fx.review(1, 1, 5, 0.8, Utc.with_ymd_and_hms(1990, 1, 1, 0, 0, 0).unwrap());
        fx.review(2, 1, 1, -0.8, days_ago(2));

        let dist = fx.service().sentiment_distribution(1, u32::MAX).unwrap();
        assert_eq!(dist.total(), 2);

        fx.config.deltas.current_window_days = u32::MAX - 1;
        fx.config.deltas.previous_window_days = u32::MAX;
        let (current, previous) = fx.service().window_comparison(1).unwrap();
        assert_eq!(current.review_count, 2);
        assert_eq!(previous.review_count, 0);
    }

    #[test]
    fn test_sentiment_bucket_cutoffs() {
        let config = SentimentConfig::default();
        assert_eq!(sentiment_bucket(0.21, &config), SentimentBucket::Positive);
        assert_eq!(sentiment_bucket(-0.2, &config), SentimentBucket::Neutral);
        assert_eq!(sentiment_bucket(-0.21, &config), SentimentBucket::Negative);
    }
}
