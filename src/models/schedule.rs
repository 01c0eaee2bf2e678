//! Schedule (solution) models.
//!
//! A schedule is the list of placed sessions for one run, each rendered
//! as a weekly recurring event. It may include violations for sessions
//! the solver placed but that could not be rendered consistently.
//!
//! # Reference
//! Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 3

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::activity::SessionId;
use super::calendar::{ClockTime, Weekday, MINUTES_PER_DAY};
use super::EntityId;
use crate::cp::SolverStatus;

/// One placed session as a weekly recurring event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    /// Activity title.
    pub title: String,
    /// Day of week, Monday = 1 .. Sunday = 7.
    pub day_of_week: u8,
    /// Start clock time.
    pub start_time: ClockTime,
    /// End clock time. `00:00` when the session ends at midnight; the
    /// calendar feed renders that case as `24:00:00`.
    pub end_time: ClockTime,
    pub activity_id: EntityId,
    /// Occurrence index of the session within its activity.
    pub occurrence: u32,
    pub group_id: EntityId,
    pub instructor_id: Option<EntityId>,
    pub venue_id: Option<EntityId>,
    /// Start in week minutes.
    pub start_minute: i64,
    /// End in week minutes (may equal the horizon).
    pub end_minute: i64,
}

impl ScheduledEvent {
    /// Session this event places.
    pub fn session_id(&self) -> SessionId {
        SessionId::new(self.activity_id, self.occurrence)
    }

    /// Length in minutes.
    #[inline]
    pub fn duration_minutes(&self) -> i64 {
        self.end_minute - self.start_minute
    }

    /// Start day.
    pub fn weekday(&self) -> Weekday {
        Weekday::from_index(i64::from(self.day_of_week) - 1)
    }

    fn feed_end_time(&self) -> ClockTime {
        if self.end_minute > self.start_minute && self.end_minute % MINUTES_PER_DAY == 0 {
            ClockTime::END_OF_DAY
        } else {
            self.end_time
        }
    }

    /// Whether two events share any minute.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start_minute < other.end_minute && other.start_minute < self.end_minute
    }

    /// Renders the event in the weekly calendar feed shape, with the
    /// group as the calendar resource.
    ///
    /// A session ending at midnight keeps its start day and ends at
    /// `24:00:00`, including the last session of the week.
    ///
    /// # Examples
    ///
    /// ```
    /// use u_timetable::models::{ClockTime, ScheduledEvent};
    ///
    /// let event = ScheduledEvent {
    ///     title: "Math".into(),
    ///     day_of_week: 1,
    ///     start_time: ClockTime::hm(9, 30).unwrap(),
    ///     end_time: ClockTime::hm(10, 30).unwrap(),
    ///     activity_id: 4,
    ///     occurrence: 0,
    ///     group_id: 2,
    ///     instructor_id: Some(1),
    ///     venue_id: None,
    ///     start_minute: 570,
    ///     end_minute: 630,
    /// };
    /// let feed = serde_json::to_value(event.to_calendar_event()).unwrap();
    /// assert_eq!(feed["daysOfWeek"][0], 1);
    /// assert_eq!(feed["startTime"], "09:30:00");
    /// assert_eq!(feed["resourceId"], "2");
    /// ```
    pub fn to_calendar_event(&self) -> CalendarEvent {
        CalendarEvent {
            id: self.session_id().to_string(),
            title: self.title.clone(),
            // Feed convention: Sunday = 0
            days_of_week: vec![self.day_of_week % 7],
            start_time: self.start_time.to_hms(),
            end_time: self.feed_end_time().to_hms(),
            resource_id: self.group_id.to_string(),
            extended_props: CalendarEventProps {
                activity_id: self.activity_id,
                group_id: self.group_id,
                teacher_id: self.instructor_id,
                venue_id: self.venue_id,
            },
        }
    }
}

/// Weekly recurring event as consumed by calendar front-ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    /// Days of week, Sunday = 0 .. Saturday = 6.
    pub days_of_week: Vec<u8>,
    /// `HH:MM:SS`
    pub start_time: String,
    /// `HH:MM:SS`
    pub end_time: String,
    pub resource_id: String,
    pub extended_props: CalendarEventProps,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEventProps {
    pub activity_id: EntityId,
    pub group_id: EntityId,
    pub teacher_id: Option<EntityId>,
    pub venue_id: Option<EntityId>,
}

/// A consistency problem found while reading a solution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Type of violation.
    pub violation_type: ViolationType,
    /// Session concerned.
    pub session: SessionId,
    /// Human-readable description.
    pub message: String,
    /// Severity (0-100, higher = worse).
    pub severity: i32,
}

/// Classification of violations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationType {
    /// Placed session without a required venue or instructor.
    Unresourced,
    /// Placed session with a start outside the session's start domain.
    OutsideWindow,
    /// Placed session breaking a soft restriction (penalized, still emitted).
    SoftRestriction,
}

impl Violation {
    /// Creates an unresourced-session violation.
    pub fn unresourced(session: SessionId, message: impl Into<String>) -> Self {
        Self {
            violation_type: ViolationType::Unresourced,
            session,
            message: message.into(),
            severity: 90,
        }
    }

    /// Creates an outside-window violation.
    pub fn outside_window(session: SessionId, message: impl Into<String>) -> Self {
        Self {
            violation_type: ViolationType::OutsideWindow,
            session,
            message: message.into(),
            severity: 100,
        }
    }

    /// Creates a soft restriction violation.
    pub fn soft_restriction(session: SessionId, message: impl Into<String>, weight: i64) -> Self {
        Self {
            violation_type: ViolationType::SoftRestriction,
            session,
            message: message.into(),
            severity: weight.clamp(0, 100) as i32,
        }
    }

    /// Whether the session was withheld from the event list.
    pub fn is_blocking(&self) -> bool {
        self.violation_type != ViolationType::SoftRestriction
    }
}

/// Current version of the record and model blob layout.
pub const FORMAT_VERSION: u32 = 1;

/// The persisted result of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub id: Uuid,
    pub created: DateTime<Utc>,
    pub format_version: u32,
    pub status: SolverStatus,
    pub objective_value: Option<i64>,
    /// Opaque serialized model snapshot.
    #[serde(with = "blob")]
    pub model_blob: Vec<u8>,
    /// Events ordered by start minute, activity id, occurrence.
    pub events: Vec<ScheduledEvent>,
}

impl ScheduleRecord {
    /// Creates a record stamped with a fresh id and the current time.
    pub fn new(
        status: SolverStatus,
        objective_value: Option<i64>,
        model_blob: Vec<u8>,
        events: Vec<ScheduledEvent>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created: Utc::now(),
            format_version: FORMAT_VERSION,
            status,
            objective_value,
            model_blob,
            events,
        }
    }

    /// Events of one group.
    pub fn events_for_group(&self, group_id: EntityId) -> impl Iterator<Item = &ScheduledEvent> {
        self.events.iter().filter(move |e| e.group_id == group_id)
    }

    /// Events held in one venue.
    pub fn events_for_venue(&self, venue_id: EntityId) -> impl Iterator<Item = &ScheduledEvent> {
        self.events
            .iter()
            .filter(move |e| e.venue_id == Some(venue_id))
    }

    /// Events delivered by one instructor.
    pub fn events_for_instructor(
        &self,
        instructor_id: EntityId,
    ) -> impl Iterator<Item = &ScheduledEvent> {
        self.events
            .iter()
            .filter(move |e| e.instructor_id == Some(instructor_id))
    }

    /// Events starting on a given day.
    pub fn events_on(&self, day: Weekday) -> impl Iterator<Item = &ScheduledEvent> {
        self.events.iter().filter(move |e| e.weekday() == day)
    }

    /// Event list as JSON.
    pub fn events_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.events)
    }
}

/// Blob field as a JSON string rather than a number array.
/// Blobs are UTF-8 JSON documents.
mod blob {
    use serde::{ser, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        let text = std::str::from_utf8(bytes).map_err(ser::Error::custom)?;
        serializer.serialize_str(text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        String::deserialize(deserializer).map(String::into_bytes)
    }
}
