//! Timetable quality metrics (KPIs).
//!
//! Computes summary indicators from the events of one run.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Placement rate | Placed sessions / requested sessions |
//! | Scheduled minutes | Sum of event lengths |
//! | Venue utilization | Booked minutes / open minutes, per venue |
//! | Instructor load | Booked minutes per instructor |
//! | Group load | Booked minutes per group |
//! | Days used | Distinct weekdays with at least one event |
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 1.2: Performance Measures

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::models::{EntityId, ScheduledEvent};

/// Timetable performance indicators.
///
/// All time values are in minutes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimetableKpi {
    pub sessions_total: usize,
    pub sessions_placed: usize,
    /// Fraction of requested sessions placed (0.0..1.0).
    pub placement_rate: f64,
    pub scheduled_minutes: i64,
    /// Per-venue utilization of the weekly open time (0.0..1.0).
    pub venue_utilization: HashMap<EntityId, f64>,
    /// Average over venues with at least one event.
    pub avg_venue_utilization: f64,
    pub instructor_load_minutes: HashMap<EntityId, i64>,
    pub group_load_minutes: HashMap<EntityId, i64>,
    pub days_used: usize,
}

impl TimetableKpi {
    /// Computes KPIs from a run's events.
    ///
    /// # Arguments
    /// * `events` - Emitted events.
    /// * `sessions_total` - Sessions requested by the instance.
    /// * `open_minutes` - Weekly open time of the merged opening windows.
    pub fn calculate(events: &[ScheduledEvent], sessions_total: usize, open_minutes: i64) -> Self {
        let mut venue_minutes: HashMap<EntityId, i64> = HashMap::new();
        let mut instructor_load_minutes: HashMap<EntityId, i64> = HashMap::new();
        let mut group_load_minutes: HashMap<EntityId, i64> = HashMap::new();
        let mut days = HashSet::new();
        let mut scheduled_minutes = 0;

        for e in events {
            let minutes = e.duration_minutes();
            scheduled_minutes += minutes;
            days.insert(e.day_of_week);
            *group_load_minutes.entry(e.group_id).or_default() += minutes;
            if let Some(v) = e.venue_id {
                *venue_minutes.entry(v).or_default() += minutes;
            }
            if let Some(i) = e.instructor_id {
                *instructor_load_minutes.entry(i).or_default() += minutes;
            }
        }

        let venue_utilization: HashMap<EntityId, f64> = venue_minutes
            .into_iter()
            .map(|(v, m)| {
                let u = if open_minutes > 0 {
                    m as f64 / open_minutes as f64
                } else {
                    0.0
                };
                (v, u)
            })
            .collect();
        let avg_venue_utilization = if venue_utilization.is_empty() {
            0.0
        } else {
            venue_utilization.values().sum::<f64>() / venue_utilization.len() as f64
        };

        let placement_rate = if sessions_total == 0 {
            1.0
        } else {
            events.len() as f64 / sessions_total as f64
        };

        Self {
            sessions_total,
            sessions_placed: events.len(),
            placement_rate,
            scheduled_minutes,
            venue_utilization,
            avg_venue_utilization,
            instructor_load_minutes,
            group_load_minutes,
            days_used: days.len(),
        }
    }

    /// Whether the timetable meets the given quality thresholds.
    pub fn meets_thresholds(&self, min_placement_rate: f64, max_instructor_minutes: i64) -> bool {
        self.placement_rate >= min_placement_rate
            && self
                .instructor_load_minutes
                .values()
                .all(|&m| m <= max_instructor_minutes)
    }
}
