//! Trust score calculator
//!
//! The composite combines three terms with configured weights:
//!
//! ```text
//! weighted_rating = (prior_weight * global_mean + n * raw_mean) / (prior_weight + n)
//! rating_term     = (weighted_rating - 1) / 4
//! volume_term     = min(1, n / volume_cap)
//! trust_score     = w_rating * rating_term + w_response * response_rate + w_volume * volume_term
//! ```
//!
//! The shrinkage pulls low-volume businesses toward the global mean, so five
//! 5-star reviews do not outrank five hundred reviews averaging 4.6.

use crate::config::ScoringConfig;
use crate::types::{Response, Review, TrustScore};
use std::collections::{BTreeMap, HashSet};

const MIN_RATING: f64 = 1.0;
const MAX_RATING: f64 = 5.0;

/// Mean rating across every review, or `None` when there are none.
pub fn global_mean_rating(reviews: &[Review]) -> Option<f64> {
    if reviews.is_empty() {
        return None;
    }
    let sum: i64 = reviews.iter().map(|r| r.rating).sum();
    Some(sum as f64 / reviews.len() as f64)
}

/// Bayesian shrinkage of `raw_mean` toward `prior_mean`.
pub fn shrunk_rating(prior_mean: f64, prior_weight: f64, raw_mean: f64, count: i64) -> f64 {
    let n = count as f64;
    let denominator = prior_weight + n;
    if denominator <= 0.0 {
        return prior_mean;
    }
    (prior_weight * prior_mean + n * raw_mean) / denominator
}

/// Combine the three terms into a score in [0, 1].
pub fn composite_score(
    weighted_rating: f64,
    response_rate: f64,
    total_reviews: i64,
    config: &ScoringConfig,
) -> f64 {
    let rating_term =
        ((weighted_rating - MIN_RATING) / (MAX_RATING - MIN_RATING)).clamp(0.0, 1.0);
    let volume_term = (total_reviews as f64 / config.volume_cap.max(1) as f64).min(1.0);
    let w = config.weights;

    (w.rating * rating_term + w.response * response_rate.clamp(0.0, 1.0) + w.volume * volume_term)
        .clamp(0.0, 1.0)
}

#[derive(Default)]
struct BusinessAccumulator {
    count: i64,
    rating_sum: i64,
    responded: i64,
}

/// Score every business that has at least one review, ordered by business id.
///
/// Businesses with zero reviews get no row.
pub fn compute_trust_scores(
    reviews: &[Review],
    responses: &[Response],
    config: &ScoringConfig,
) -> Vec<TrustScore> {
    let Some(global_mean) = global_mean_rating(reviews) else {
        return Vec::new();
    };

    let responded: HashSet<i64> = responses.iter().map(|r| r.review_id).collect();

    let mut per_business: BTreeMap<i64, BusinessAccumulator> = BTreeMap::new();
    for review in reviews {
        let acc = per_business.entry(review.business_id).or_default();
        acc.count += 1;
        acc.rating_sum += review.rating;
        if responded.contains(&review.id) {
            acc.responded += 1;
        }
    }

    let scores: Vec<TrustScore> = per_business
        .into_iter()
        .map(|(business_id, acc)| {
            let raw_mean = acc.rating_sum as f64 / acc.count as f64;
            let weighted_rating =
                shrunk_rating(global_mean, config.prior_weight, raw_mean, acc.count);
            let response_rate = acc.responded as f64 / acc.count as f64;

            TrustScore {
                business_id,
                trust_score: composite_score(weighted_rating, response_rate, acc.count, config),
                total_reviews: acc.count,
                weighted_rating,
                response_rate,
            }
        })
        .collect();

    tracing::debug!(
        rows = scores.len(),
        global_mean,
        prior_weight = config.prior_weight,
        "Computed trust scores"
    );
    scores
}
