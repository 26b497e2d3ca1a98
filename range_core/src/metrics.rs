//! Derived session metrics.
//!
//! Pure calculations over raw session inputs: ammunition cost, accuracy
//! percent and the composite final score. The ledger is the only caller
//! that persists these values.

use crate::{Error, Result};
use chrono::NaiveDate;

/// Round to two decimal places, the precision every derived metric is
/// stored with.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Session cost from ammunition price alone
pub fn cost(price_per_unit: f64, shots: i64) -> f64 {
    cost_with_fixed(price_per_unit, shots, 0.0)
}

/// Session cost with a fixed component (range fees, targets) on top of
/// the ammunition price
pub fn cost_with_fixed(price_per_unit: f64, shots: i64, fixed_cost: f64) -> f64 {
    round2(fixed_cost + price_per_unit * shots as f64)
}

/// Hit ratio as a percentage. Callers must ensure `shots > 0`.
pub fn accuracy_percent(hits: i64, shots: i64) -> f64 {
    round2(hits as f64 / shots as f64 * 100.0)
}

/// Composite 0-100 score blending raw accuracy with a group-size precision
/// term.
///
/// Scoring convention, kept bit-for-bit with historical data: group size is
/// converted to an angular measure at 34.38 MOA-units per cm/m, scaled by
/// distance into an effective error term, and the precision component
/// `max(0, 1 - effective/10)` is blended 0.4 accuracy / 0.6 precision.
/// Without group or distance data the score falls back to plain accuracy.
/// Zero hits yield no score.
pub fn final_score(
    group_cm: Option<f64>,
    distance_m: Option<i64>,
    hits: Option<i64>,
    shots: i64,
) -> Option<f64> {
    let hits = match hits {
        Some(h) if h > 0 => h,
        _ => return None,
    };
    if shots <= 0 {
        return None;
    }

    let accuracy = hits as f64 / shots as f64;

    if let (Some(group), Some(distance)) = (group_cm, distance_m) {
        if group > 0.0 && distance > 0 {
            let distance = distance as f64;
            let moa = group / distance * 34.38;
            let effective_moa = moa * distance / 100.0;
            let precision = (1.0 - effective_moa / 10.0).max(0.0);
            let final_value = accuracy * 0.4 + precision * 0.6;
            return Some(round2(final_value * 100.0));
        }
    }

    Some(round2(accuracy * 100.0))
}

/// Accuracy and final score derived under one rule, applied identically on
/// create and update: accuracy requires distance, hits and positive shots;
/// the final score follows [`final_score`].
pub fn derive_scores(
    distance_m: Option<i64>,
    hits: Option<i64>,
    shots: i64,
    group_cm: Option<f64>,
) -> (Option<f64>, Option<f64>) {
    let accuracy = match (distance_m, hits) {
        (Some(_), Some(h)) if shots > 0 => Some(accuracy_percent(h, shots)),
        _ => None,
    };
    let score = final_score(group_cm, distance_m, hits, shots);
    (accuracy, score)
}

/// Parse a `YYYY-MM-DD` session date
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        Error::BadRequest(format!(
            "date must be in YYYY-MM-DD format (e.g. 2025-10-23), got '{}'",
            value
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost() {
        assert_eq!(cost(2.0, 20), 40.0);
        assert_eq!(cost(1.333, 3), 4.0);
        assert_eq!(cost_with_fixed(2.0, 10, 15.5), 35.5);
    }

    #[test]
    fn test_accuracy_percent() {
        assert_eq!(accuracy_percent(7, 10), 70.0);
        assert_eq!(accuracy_percent(1, 3), 33.33);
        assert_eq!(accuracy_percent(0, 10), 0.0);
    }

    #[test]
    fn test_final_score_with_group_data() {
        // moa = 5/25 * 34.38 = 6.876; effective = 6.876 * 25/100 = 1.719
        // precision = 1 - 0.1719 = 0.8281; score = (0.7*0.4 + 0.8281*0.6)*100
        let score = final_score(Some(5.0), Some(25), Some(7), 10).unwrap();
        assert_eq!(score, 77.69);
    }

    #[test]
    fn test_final_score_falls_back_to_accuracy() {
        assert_eq!(final_score(None, Some(25), Some(7), 10), Some(70.0));
        assert_eq!(final_score(Some(5.0), None, Some(7), 10), Some(70.0));
        assert_eq!(final_score(None, None, Some(9), 10), Some(90.0));
    }

    #[test]
    fn test_final_score_requires_hits() {
        assert_eq!(final_score(Some(5.0), Some(25), None, 10), None);
        assert_eq!(final_score(Some(5.0), Some(25), Some(0), 10), None);
        assert_eq!(final_score(Some(5.0), Some(25), Some(7), 0), None);
    }

    #[test]
    fn test_precision_floor_at_zero() {
        // A huge group at long range drives precision to the floor: the
        // score degrades to accuracy * 0.4.
        let score = final_score(Some(120.0), Some(100), Some(10), 10).unwrap();
        assert_eq!(score, 40.0);
    }

    #[test]
    fn test_derive_scores_accuracy_needs_distance() {
        let (accuracy, score) = derive_scores(None, Some(7), 10, None);
        assert_eq!(accuracy, None);
        assert_eq!(score, Some(70.0));

        let (accuracy, score) = derive_scores(Some(25), Some(7), 10, None);
        assert_eq!(accuracy, Some(70.0));
        assert_eq!(score, Some(70.0));

        let (accuracy, score) = derive_scores(Some(25), None, 10, Some(5.0));
        assert_eq!(accuracy, None);
        assert_eq!(score, None);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2025-10-23").unwrap(),
            NaiveDate::from_ymd_opt(2025, 10, 23).unwrap()
        );
        assert!(parse_date("23.10.2025").is_err());
        assert!(parse_date("not a date").is_err());
    }
}
