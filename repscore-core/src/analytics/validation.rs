//! Raw snapshot validation
//!
//! The store does not constrain value ranges, so the engine checks every raw
//! row before computing anything. The first violation aborts the recompute.

use crate::types::RawSnapshot;
use std::collections::{HashMap, HashSet};

/// A raw row that breaks an invariant of the event model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub table: &'static str,
    pub id: i64,
    pub reason: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} row {}: {}", self.table, self.id, self.reason)
    }
}

/// Check every raw row, returning the first violation found.
pub fn validate_snapshot(snapshot: &RawSnapshot) -> Result<(), Violation> {
    let business_ids: HashSet<i64> = snapshot.businesses.iter().map(|b| b.id).collect();

    let mut review_times = HashMap::with_capacity(snapshot.reviews.len());
    for review in &snapshot.reviews {
        let violation = |reason: String| Violation {
            table: "reviews",
            id: review.id,
            reason,
        };

        if !(1..=5).contains(&review.rating) {
            return Err(violation(format!(
                "rating {} is outside 1..=5",
                review.rating
            )));
        }
        if !review.sentiment_score.is_finite() || !(-1.0..=1.0).contains(&review.sentiment_score)
        {
            return Err(violation(format!(
                "sentiment_score {} is outside [-1, 1]",
                review.sentiment_score
            )));
        }
        if !business_ids.contains(&review.business_id) {
            return Err(violation(format!(
                "references unknown business {}",
                review.business_id
            )));
        }
        review_times.insert(review.id, review.created_at);
    }

    let mut responded = HashSet::with_capacity(snapshot.responses.len());
    for response in &snapshot.responses {
        let violation = |reason: String| Violation {
            table: "responses",
            id: response.id,
            reason,
        };

        let Some(created_at) = review_times.get(&response.review_id) else {
            return Err(violation(format!(
                "references unknown review {}",
                response.review_id
            )));
        };
        if response.responded_at < *created_at {
            return Err(violation(format!(
                "responded_at {} precedes review created_at {}",
                response.responded_at, created_at
            )));
        }
        if !responded.insert(response.review_id) {
            return Err(violation(format!(
                "review {} already has a response",
                response.review_id
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Business, Response, Review};
    use chrono::{TimeZone, Utc};

    fn snapshot() -> RawSnapshot {
        RawSnapshot {
            businesses: vec![Business {
                id: 1,
                name: "Mama Put".to_string(),
                industry: "Restaurant".to_string(),
                location: "Surulere".to_string(),
                latitude: 6.5,
                longitude: 3.35,
            }],
            reviews: vec![Review {
                id: 10,
                business_id: 1,
                rating: 4,
                text: "Good jollof".to_string(),
                sentiment_score: 0.7,
                created_at: Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap(),
            }],
            responses: vec![Response {
                id: 100,
                review_id: 10,
                response_text: "Thank you".to_string(),
                responded_at: Utc.with_ymd_and_hms(2025, 5, 2, 8, 0, 0).unwrap(),
            }],
        }
    }

    #[test]
    fn test_valid_snapshot_passes() {
        assert!(validate_snapshot(&snapshot()).is_ok());
    }

    #[test]
    fn test_rejects_rating_out_of_range() {
        let mut snap = snapshot();
        snap.reviews[0].rating = 6;
        let err = validate_snapshot(&snap).unwrap_err();
        assert_eq!(err.table, "reviews");
        assert_eq!(err.id, 10);
    }

    #[test]
    fn test_rejects_bad_sentiment() {
        let mut snap = snapshot();
        snap.reviews[0].sentiment_score = f64::NAN;
        assert!(validate_snapshot(&snap).is_err());
        snap.reviews[0].sentiment_score = -1.5;
        assert!(validate_snapshot(&snap).is_err());
    }

    #[test]
    fn test_rejects_orphan_review() {
        let mut snap = snapshot();
        snap.reviews[0].business_id = 2;
        assert!(validate_snapshot(&snap)
            .unwrap_err()
            .reason
            .contains("unknown business"));
    }

    #[test]
    fn test_rejects_response_before_review() {
        let mut snap = snapshot();
        snap.responses[0].responded_at = Utc.with_ymd_and_hms(2025, 4, 30, 0, 0, 0).unwrap();
        let err = validate_snapshot(&snap).unwrap_err();
        assert_eq!(err.table, "responses");
        assert!(err.to_string().contains("precedes"));
    }

    #[test]
    fn test_rejects_second_response() {
        let mut snap = snapshot();
        let mut second = snap.responses[0].clone();
        second.id = 101;
        snap.responses.push(second);
        assert!(validate_snapshot(&snap)
            .unwrap_err()
            .reason
            .contains("already has a response"));
    }
}
