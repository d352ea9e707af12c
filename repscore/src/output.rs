//! Text rendering for query results
//!
//! JSON output goes straight through `serde_json`; these helpers cover the
//! human-readable form only.

use repscore_core::analytics::{RecomputeReport, RecomputeRun, RunStatus};
use repscore_core::{
    BusinessSummary, DailyStat, GeoInsight, IndustryBenchmark, LocationMetrics, MonthlyRating,
    Overview, PerformanceDeltas, SentimentBucket, SentimentDistribution,
};

/// Format an optional score, `-` when absent
fn opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.3}", v))
}

fn signed(value: f64) -> String {
    format!("{:+.3}", value)
}

pub fn print_report(report: &RecomputeReport) {
    println!(
        "Recompute {} complete in {}ms",
        &report.run_id[..8.min(report.run_id.len())],
        report.duration_ms
    );
    for stage in &report.stages {
        println!(
            "  [+] {:<20} {:>6} rows {:>6}ms",
            stage.stage.as_str(),
            stage.rows,
            stage.duration_ms
        );
    }
    println!(
        "daily_stats: {}, trust_scores: {}, industry_benchmarks: {}",
        report.daily_stats_rows, report.trust_score_rows, report.benchmark_rows
    );
    println!("fingerprint: {}", report.fingerprint);
}

pub fn print_runs(runs: &[RecomputeRun]) {
    if runs.is_empty() {
        println!("No recompute runs recorded.");
        return;
    }

    for run in runs {
        let icon = match run.status {
            RunStatus::Success => "+",
            RunStatus::Aborted => "!",
        };
        println!(
            "[{}] {} {} ({}ms)",
            icon,
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.id,
            run.duration_ms
        );
        match run.status {
            RunStatus::Success => println!(
                "    {} daily stats, {} trust scores, {} benchmarks",
                run.daily_stats_rows, run.trust_score_rows, run.benchmark_rows
            ),
            RunStatus::Aborted => println!(
                "    aborted during {}: {}",
                run.failed_stage.as_deref().unwrap_or("?"),
                run.error_message.as_deref().unwrap_or("")
            ),
        }
    }
}

pub fn print_businesses(businesses: &[BusinessSummary]) {
    if businesses.is_empty() {
        println!("No businesses found.");
        println!("Run 'repscore import --file <events.json>' first.");
        return;
    }

    for b in businesses {
        println!("{:>6}  {:<32} {}", b.id, b.name, b.industry);
    }
}

pub fn print_overview(overview: &Overview) {
    println!("{} (#{})", overview.name, overview.id);
    println!("  industry:          {}", overview.industry);
    println!("  location:          {}", overview.location);
    println!("  trust score:       {}", opt(overview.trust_score));
    println!(
        "  total reviews:     {}",
        overview
            .total_reviews
            .map_or_else(|| "-".to_string(), |n| n.to_string())
    );
    println!("  weighted rating:   {}", opt(overview.weighted_rating));
    println!("  response rate:     {}", opt(overview.response_rate));
    println!("  industry p50:      {}", opt(overview.industry_avg_trust));
    println!("  industry p90:      {}", opt(overview.industry_top_trust));
}

pub fn print_trend(stats: &[DailyStat]) {
    if stats.is_empty() {
        println!("No reviews yet.");
        return;
    }

    println!(
        "{:<10}  {:>7}  {:>6}  {:>9}  {:>11}",
        "date", "reviews", "rating", "sentiment", "running avg"
    );
    for s in stats {
        println!(
            "{:<10}  {:>7}  {:>6.2}  {:>9.2}  {:>11.3}",
            s.date.format("%Y-%m-%d"),
            s.review_count,
            s.daily_rating,
            s.daily_sentiment,
            s.running_avg_rating
        );
    }
}

pub fn print_monthly(months: &[MonthlyRating]) {
    if months.is_empty() {
        println!("No reviews yet.");
        return;
    }

    for m in months {
        println!("{}  {:.2}", m.month.format("%Y-%m"), m.avg_rating);
    }
}

pub fn print_benchmark(benchmark: &IndustryBenchmark) {
    println!("{}", benchmark.industry);
    println!("  rating p50 / p90:       {:.3} / {:.3}", benchmark.p50_rating, benchmark.p90_rating);
    println!(
        "  trust score p50 / p90:  {:.3} / {:.3}",
        benchmark.p50_trust_score, benchmark.p90_trust_score
    );
    println!("  avg response rate:      {:.3}", benchmark.avg_response_rate);
}

pub fn print_sentiment(dist: &SentimentDistribution, window_days: u32) {
    println!("Last {} days ({} reviews)", window_days, dist.total());
    for bucket in [
        SentimentBucket::Positive,
        SentimentBucket::Neutral,
        SentimentBucket::Negative,
    ] {
        println!("  {:<8} {}", bucket.as_str(), dist.get(bucket));
    }
}

pub fn print_deltas(deltas: &PerformanceDeltas) {
    println!("rating:             {}", signed(deltas.delta_rating));
    println!("negative sentiment: {}", signed(deltas.delta_neg_sentiment));
    println!("response rate:      {}", signed(deltas.delta_response_rate));
}

pub fn print_locations(locations: &[LocationMetrics]) {
    if locations.is_empty() {
        println!("No reviewed locations.");
        return;
    }

    for l in locations {
        println!(
            "{:>6}  {:<28} {:<16} ({:.4}, {:.4})  {:>5} reviews  rating {:.2}  sentiment {:+.2}  responded {:.0}%",
            l.location_id,
            l.name,
            l.city,
            l.latitude,
            l.longitude,
            l.review_count,
            l.avg_rating,
            l.avg_sentiment,
            l.response_rate * 100.0
        );
    }
}

pub fn print_geo_insight(insight: &GeoInsight) {
    println!("{}", insight.insight);
    if insight.top_locations > 0 {
        println!(
            "  top {} by volume:    avg sentiment {:+.3}",
            insight.top_locations, insight.top_avg_sentiment
        );
        println!(
            "  bottom {} by volume: avg sentiment {:+.3}",
            insight.bottom_locations, insight.bottom_avg_sentiment
        );
    }
}
