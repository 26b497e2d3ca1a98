//! Monthly roll-up of session cost and shot totals.

use crate::metrics::round2;
use crate::ShootingSession;
use serde::Serialize;
use std::collections::BTreeMap;

/// Cost and shot totals for one calendar month
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct MonthSummary {
    pub month: String,
    pub total_cost: f64,
    pub total_shots: i64,
}

/// Aggregate sessions into per-month totals, sorted by month ascending
pub fn monthly_summary<'a, I>(sessions: I) -> Vec<MonthSummary>
where
    I: IntoIterator<Item = &'a ShootingSession>,
{
    let mut months: BTreeMap<String, (f64, i64)> = BTreeMap::new();

    for session in sessions {
        let key = session.date.format("%Y-%m").to_string();
        let entry = months.entry(key).or_insert((0.0, 0));
        entry.0 += session.cost.unwrap_or(0.0);
        entry.1 += session.shots;
    }

    months
        .into_iter()
        .map(|(month, (cost, shots))| MonthSummary {
            month,
            total_cost: round2(cost),
            total_shots: shots,
        })
        .collect()
}
