//! Industry benchmark calculator
//!
//! Groups trust score rows by the owning business's industry and reports
//! p50/p90 of `weighted_rating` and `trust_score` plus the mean response rate.
//! A single-business industry still gets a row (p50 = p90 = its value).

use crate::types::{Business, IndustryBenchmark, TrustScore};
use std::collections::{BTreeMap, HashMap};

/// Linear-interpolated percentile of `values` for `p` in [0, 1].
///
/// Sorts ascending, takes rank `p * (n - 1)` and interpolates between the
/// floor and ceil ranks. Returns `None` for an empty slice.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Compute one benchmark row per industry, ordered by industry name.
///
/// Trust scores whose business is unknown are skipped.
pub fn compute_industry_benchmarks(
    businesses: &[Business],
    trust_scores: &[TrustScore],
) -> Vec<IndustryBenchmark> {
    let industry_of: HashMap<i64, &str> = businesses
        .iter()
        .map(|b| (b.id, b.industry.as_str()))
        .collect();

    let mut groups: BTreeMap<&str, Vec<&TrustScore>> = BTreeMap::new();
    for score in trust_scores {
        match industry_of.get(&score.business_id) {
            Some(industry) => groups.entry(*industry).or_default().push(score),
            None => tracing::warn!(
                business_id = score.business_id,
                "Trust score without a business; skipping for benchmarks"
            ),
        }
    }

    let benchmarks: Vec<IndustryBenchmark> = groups
        .into_iter()
        .filter_map(|(industry, scores)| {
            let ratings: Vec<f64> = scores.iter().map(|s| s.weighted_rating).collect();
            let trust: Vec<f64> = scores.iter().map(|s| s.trust_score).collect();
            let avg_response_rate =
                scores.iter().map(|s| s.response_rate).sum::<f64>() / scores.len() as f64;

            Some(IndustryBenchmark {
                industry: industry.to_string(),
                p50_rating: percentile(&ratings, 0.5)?,
                p90_rating: percentile(&ratings, 0.9)?,
                p50_trust_score: percentile(&trust, 0.5)?,
                p90_trust_score: percentile(&trust, 0.9)?,
                avg_response_rate,
            })
        })
        .collect();

    tracing::debug!(rows = benchmarks.len(), "Computed industry benchmarks");
    benchmarks
}
