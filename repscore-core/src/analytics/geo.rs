//! Geo insight heuristic
//!
//! Ranks locations by review volume and compares the mean sentiment of the
//! busiest `top_pct` against the quietest `bottom_pct`. This is an exploratory
//! heuristic with fixed policy cutoffs, not a statistical test: it reports a
//! direction when the difference clears `threshold` and nothing more.

use crate::config::GeoInsightConfig;
use crate::types::{GeoInsight, GeoVerdict, LocationMetrics};

/// Number of locations in a `pct` slice of `n`, floored, at least 1, at most `n`.
fn slice_len(n: usize, pct: f64) -> usize {
    ((n as f64 * pct).floor() as usize).clamp(1, n)
}

fn mean_sentiment(locations: &[&LocationMetrics]) -> f64 {
    locations.iter().map(|l| l.avg_sentiment).sum::<f64>() / locations.len() as f64
}

/// Classify high-volume vs low-volume sentiment.
pub fn geo_insight(locations: &[LocationMetrics], config: &GeoInsightConfig) -> GeoInsight {
    if locations.is_empty() {
        return GeoInsight {
            verdict: GeoVerdict::InsufficientData,
            insight: GeoVerdict::InsufficientData.message().to_string(),
            top_locations: 0,
            bottom_locations: 0,
            top_avg_sentiment: 0.0,
            bottom_avg_sentiment: 0.0,
        };
    }

    // Volume descending; ties by id keep the split deterministic.
    let mut ranked: Vec<&LocationMetrics> = locations.iter().collect();
    ranked.sort_by(|a, b| {
        b.review_count
            .cmp(&a.review_count)
            .then(a.location_id.cmp(&b.location_id))
    });

    let n = ranked.len();
    let top_count = slice_len(n, config.top_pct);
    let bottom_count = slice_len(n, config.bottom_pct);

    let top_avg = mean_sentiment(&ranked[..top_count]);
    let bottom_avg = mean_sentiment(&ranked[n - bottom_count..]);
    let diff = top_avg - bottom_avg;

    let verdict = if diff < -config.threshold {
        GeoVerdict::HighVolumeLowerSentiment
    } else if diff > config.threshold {
        GeoVerdict::HighVolumeHigherSentiment
    } else {
        GeoVerdict::Consistent
    };

    tracing::debug!(
        locations = n,
        top_count,
        bottom_count,
        diff,
        verdict = verdict.message(),
        "Computed geo insight"
    );

    GeoInsight {
        verdict,
        insight: verdict.message().to_string(),
        top_locations: top_count,
        bottom_locations: bottom_count,
        top_avg_sentiment: top_avg,
        bottom_avg_sentiment: bottom_avg,
    }
}
