//! Daily stats rollup
//!
//! Groups reviews by (business, local calendar day). Days without reviews are
//! omitted rather than zero-filled, so a gap in the series means "no data".

use crate::types::{DailyStat, Review};
use chrono::{FixedOffset, NaiveDate};
use std::collections::BTreeMap;

#[derive(Default)]
struct DayAccumulator {
    count: i64,
    rating_sum: i64,
    sentiment_sum: f64,
}

/// Local calendar date of a review in the given timezone.
pub fn local_date(review: &Review, tz: &FixedOffset) -> NaiveDate {
    review.created_at.with_timezone(tz).date_naive()
}

/// Roll reviews up into one row per (business, day), ordered by business then date.
///
/// `running_avg_rating` is the prefix mean over every rating of that business
/// on or before the row's date.
pub fn compute_daily_stats(reviews: &[Review], tz: &FixedOffset) -> Vec<DailyStat> {
    // Sorted map keys give the per-business date ordering the prefix needs.
    let mut days: BTreeMap<(i64, NaiveDate), DayAccumulator> = BTreeMap::new();

    // Sum sentiment in id order so float results do not depend on input order.
    let mut ordered: Vec<&Review> = reviews.iter().collect();
    ordered.sort_by_key(|r| r.id);

    for review in ordered {
        let acc = days
            .entry((review.business_id, local_date(review, tz)))
            .or_default();
        acc.count += 1;
        acc.rating_sum += review.rating;
        acc.sentiment_sum += review.sentiment_score;
    }

    let mut stats = Vec::with_capacity(days.len());
    let mut current_business = None;
    let mut running_count = 0i64;
    let mut running_sum = 0i64;

    for ((business_id, date), acc) in days {
        if current_business != Some(business_id) {
            current_business = Some(business_id);
            running_count = 0;
            running_sum = 0;
        }
        running_count += acc.count;
        running_sum += acc.rating_sum;

        stats.push(DailyStat {
            business_id,
            date,
            review_count: acc.count,
            daily_rating: acc.rating_sum as f64 / acc.count as f64,
            daily_sentiment: acc.sentiment_sum / acc.count as f64,
            running_avg_rating: running_sum as f64 / running_count as f64,
        });
    }

    tracing::debug!(rows = stats.len(), "Computed daily stats");
    stats
}
