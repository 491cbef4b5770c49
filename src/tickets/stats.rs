use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::shared::enums::{Category, Priority};

/// Raw aggregates gathered by a store, before they are folded into
/// [`TicketStats`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsParts {
    pub total: i64,
    pub open: i64,
    /// Ticket count for each calendar day that has at least one ticket.
    pub per_day: Vec<i64>,
    pub by_priority: Vec<(Option<Priority>, i64)>,
    pub by_category: Vec<(Option<Category>, i64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketStats {
    pub total_tickets: i64,
    pub open_tickets: i64,
    pub avg_tickets_per_day: f64,
    pub priority_breakdown: BTreeMap<Priority, i64>,
    pub category_breakdown: BTreeMap<Category, i64>,
}

impl TicketStats {
    pub fn from_parts(parts: StatsParts) -> Self {
        Self {
            total_tickets: parts.total,
            open_tickets: parts.open,
            avg_tickets_per_day: average(&parts.per_day),
            priority_breakdown: breakdown(parts.by_priority),
            category_breakdown: breakdown(parts.by_category),
        }
    }
}

/// Mean of the daily counts; zero when there are no days.
fn average(per_day: &[i64]) -> f64 {
    if per_day.is_empty() {
        return 0.0;
    }
    per_day.iter().sum::<i64>() as f64 / per_day.len() as f64
}

/// Null keys are dropped; repeated keys are summed.
fn breakdown<K: Ord>(rows: Vec<(Option<K>, i64)>) -> BTreeMap<K, i64> {
    let mut map = BTreeMap::new();
    for (key, count) in rows {
        if let Some(key) = key {
            *map.entry(key).or_insert(0) += count;
        }
    }
    map
}
