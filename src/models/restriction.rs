//! Per-activity restrictions.
//!
//! A restriction narrows where or with whom an activity's sessions may be
//! placed. Mandatory restrictions are hard constraints; the other
//! priorities become weighted penalties in the objective.
//!
//! # Concepts
//!
//! - [`Priority`]: hard (`Mandatory`) or soft with a penalty weight
//! - [`RestrictionKind`]: temporal bounds (per-day clock limits, allowed
//!   or forbidden days) and resource bounds (instructor, venue, tag)
//! - [`Restriction`]: a kind bound to an activity with a priority
//!
//! # References
//!
//! - Schaerf (1999), "A Survey of Automated Timetabling"

use serde::{Deserialize, Serialize};

use super::calendar::{ClockTime, DayToken, Weekday, MINUTES_PER_DAY};
use super::tag::EntityKind;
use super::EntityId;

// ================================
// Priority
// ================================

/// How strongly a restriction binds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Must hold (hard constraint).
    Mandatory,
    /// Penalty 100 per violating session.
    #[default]
    High,
    /// Penalty 10 per violating session.
    Medium,
    /// Penalty 1 per violating session.
    Low,
}

impl Priority {
    /// Objective penalty for one violating session. `None` for hard.
    pub fn penalty_weight(self) -> Option<i64> {
        match self {
            Priority::Mandatory => None,
            Priority::High => Some(100),
            Priority::Medium => Some(10),
            Priority::Low => Some(1),
        }
    }

    #[inline]
    pub fn is_hard(self) -> bool {
        self == Priority::Mandatory
    }
}

// ================================
// Restriction kinds
// ================================

/// A clock-time bound that applies on the selected days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayBound {
    pub day: DayToken,
    pub time: ClockTime,
}

impl DayBound {
    pub fn new(day: impl Into<DayToken>, time: ClockTime) -> Self {
        Self {
            day: day.into(),
            time,
        }
    }
}

/// What a restriction limits.
///
/// Clock bounds only apply on the days they name; a session on another
/// day is unaffected. When several bounds name the same day, all apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RestrictionKind {
    /// Start no earlier than the bound.
    EarliestStart(Vec<DayBound>),
    /// Start no later than the bound.
    LatestStart(Vec<DayBound>),
    /// End no earlier than the bound.
    EarliestEnd(Vec<DayBound>),
    /// End no later than the bound.
    LatestEnd(Vec<DayBound>),
    /// Take place on one of these days.
    OnDays(Vec<DayToken>),
    /// Never take place on these days.
    NotOnDays(Vec<DayToken>),
    /// Use this instructor whenever one is booked.
    Instructor(EntityId),
    /// Use this venue whenever one is booked.
    Venue(EntityId),
    /// The entity of the given kind attached to the session carries the tag.
    Tag {
        entity_kind: EntityKind,
        tag_id: EntityId,
    },
}

impl RestrictionKind {
    /// Whether the restriction limits start times rather than resources.
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            RestrictionKind::EarliestStart(_)
                | RestrictionKind::LatestStart(_)
                | RestrictionKind::EarliestEnd(_)
                | RestrictionKind::LatestEnd(_)
                | RestrictionKind::OnDays(_)
                | RestrictionKind::NotOnDays(_)
        )
    }

    /// Whether a session of `duration` minutes starting at week minute
    /// `start` satisfies a temporal restriction. Resource kinds always
    /// permit.
    ///
    /// # Examples
    ///
    /// ```
    /// use u_timetable::models::{ClockTime, DayBound, RestrictionKind, Weekday};
    ///
    /// let noon = ClockTime::hm(12, 0).unwrap();
    /// let r = RestrictionKind::LatestEnd(vec![DayBound::new(Weekday::Mon, noon)]);
    /// assert!(r.permits_start(600, 120)); // Mon 10:00-12:00
    /// assert!(!r.permits_start(660, 120)); // Mon 11:00-13:00
    /// assert!(r.permits_start(1440 + 660, 120)); // Tuesday is unbounded
    /// ```
    pub fn permits_start(&self, start: i64, duration: i64) -> bool {
        let day = Weekday::of_minute(start);
        let clock = start.rem_euclid(MINUTES_PER_DAY);
        let end_clock = clock + duration;

        match self {
            RestrictionKind::EarliestStart(bounds) => {
                bounds_on(bounds, day).all(|t| clock >= t.minutes())
            }
            RestrictionKind::LatestStart(bounds) => bounds_on(bounds, day).all(|t| clock <= t.minutes()),
            RestrictionKind::EarliestEnd(bounds) => {
                bounds_on(bounds, day).all(|t| end_clock >= t.minutes())
            }
            RestrictionKind::LatestEnd(bounds) => {
                bounds_on(bounds, day).all(|t| end_clock <= t.minutes())
            }
            RestrictionKind::OnDays(days) => days.iter().any(|d| d.includes(day)),
            RestrictionKind::NotOnDays(days) => !days.iter().any(|d| d.includes(day)),
            RestrictionKind::Instructor(_) | RestrictionKind::Venue(_) | RestrictionKind::Tag { .. } => {
                true
            }
        }
    }
}

fn bounds_on(bounds: &[DayBound], day: Weekday) -> impl Iterator<Item = ClockTime> + '_ {
    bounds
        .iter()
        .filter(move |b| b.day.includes(day))
        .map(|b| b.time)
}

// ================================
// Restriction
// ================================

/// A restriction on every session of one activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restriction {
    pub activity_id: EntityId,
    #[serde(flatten)]
    pub kind: RestrictionKind,
    #[serde(default)]
    pub priority: Priority,
}

impl Restriction {
    /// Creates a restriction with the default (`High`) priority.
    pub fn new(activity_id: EntityId, kind: RestrictionKind) -> Self {
        Self {
            activity_id,
            kind,
            priority: Priority::default(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Makes this restriction a hard constraint.
    pub fn mandatory(self) -> Self {
        self.with_priority(Priority::Mandatory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: i64, m: i64) -> ClockTime {
        ClockTime::hm(h, m).unwrap()
    }

    #[test]
    fn test_priority_weights() {
        assert_eq!(Priority::Mandatory.penalty_weight(), None);
        assert_eq!(Priority::High.penalty_weight(), Some(100));
        assert_eq!(Priority::Medium.penalty_weight(), Some(10));
        assert_eq!(Priority::Low.penalty_weight(), Some(1));
        assert!(Priority::Mandatory.is_hard());
        assert_eq!(Priority::default(), Priority::High);
    }

    #[test]
    fn test_earliest_start_on_weekdays_only() {
        let r = RestrictionKind::EarliestStart(vec![DayBound::new(DayToken::Weekdays, t(15, 0))]);
        assert!(!r.permits_start(600, 60)); // Mon 10:00
        assert!(r.permits_start(900, 60)); // Mon 15:00
        assert!(r.permits_start(5 * 1440 + 600, 60)); // Sat 10:00
    }

    #[test]
    fn test_latest_start_and_earliest_end() {
        let latest = RestrictionKind::LatestStart(vec![DayBound::new(DayToken::All, t(9, 0))]);
        assert!(latest.permits_start(540, 60));
        assert!(!latest.permits_start(555, 60));

        let earliest_end = RestrictionKind::EarliestEnd(vec![DayBound::new(Weekday::Tue, t(12, 0))]);
        assert!(earliest_end.permits_start(1440 + 660, 60));
        assert!(!earliest_end.permits_start(1440 + 600, 60));
    }

    #[test]
    fn test_multiple_bounds_same_day() {
        let r = RestrictionKind::EarliestStart(vec![
            DayBound::new(DayToken::Weekdays, t(9, 0)),
            DayBound::new(Weekday::Mon, t(11, 0)),
        ]);
        assert!(!r.permits_start(600, 30)); // Mon 10:00
        assert!(r.permits_start(1440 + 600, 30)); // Tue 10:00
    }

    #[test]
    fn test_day_restrictions() {
        let on = RestrictionKind::OnDays(vec![DayToken::Day(Weekday::Wed)]);
        assert!(on.permits_start(2 * 1440 + 600, 60));
        assert!(!on.permits_start(600, 60));

        let not_on = RestrictionKind::NotOnDays(vec![DayToken::Weekend]);
        assert!(not_on.permits_start(600, 60));
        assert!(!not_on.permits_start(6 * 1440 + 600, 60));
    }

    #[test]
    fn test_resource_kinds_always_permit() {
        let r = RestrictionKind::Venue(3);
        assert!(!r.is_temporal());
        assert!(r.permits_start(0, 10_000));
    }

    #[test]
    fn test_restriction_serde() {
        let r = Restriction::new(5, RestrictionKind::NotOnDays(vec![DayToken::Weekend])).mandatory();
        let json = serde_json::to_string(&r).unwrap();
        let back: Restriction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);

        let parsed: Restriction = serde_json::from_str(
            r#"{"activity_id": 2, "kind": "tag", "value": {"entity_kind": "venue", "tag_id": 9}}"#,
        )
        .unwrap();
        assert_eq!(parsed.priority, Priority::High);
        assert_eq!(
            parsed.kind,
            RestrictionKind::Tag {
                entity_kind: EntityKind::Venue,
                tag_id: 9
            }
        );
    }
}
