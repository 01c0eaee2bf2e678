//! Activity and session models.
//!
//! An activity is a weekly template: a group needs `num_sessions`
//! occurrences of fixed length. Expansion turns each occurrence into an
//! independently placeable [`Session`].
//!
//! # Reference
//! Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 2

use std::fmt;

use serde::{Deserialize, Serialize};

use super::EntityId;

/// Default start-time granularity in minutes.
pub const DEFAULT_STEP_MINUTES: i64 = 15;

/// Allowed start-time granularities, in minutes.
pub const STEP_RANGE: std::ops::RangeInclusive<i64> = 5..=60;

/// A recurring weekly activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// Unique activity identifier.
    pub id: EntityId,
    /// Short name.
    pub name: String,
    /// Event title shown on the schedule. Falls back to `name` when empty.
    #[serde(default)]
    pub description: String,
    /// Group attending every session.
    pub group_id: EntityId,
    /// Length of each session in minutes.
    pub duration_minutes: i64,
    /// Number of sessions per week.
    pub num_sessions: u32,
    /// Start-time granularity in minutes.
    #[serde(default = "default_step")]
    pub step_minutes: i64,
}

fn default_step() -> i64 {
    DEFAULT_STEP_MINUTES
}

impl Activity {
    /// Creates an activity with one 60-minute session per week.
    pub fn new(id: EntityId, group_id: EntityId) -> Self {
        Self {
            id,
            name: String::new(),
            description: String::new(),
            group_id,
            duration_minutes: 60,
            num_sessions: 1,
            step_minutes: DEFAULT_STEP_MINUTES,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the session length (minutes).
    pub fn with_duration(mut self, minutes: i64) -> Self {
        self.duration_minutes = minutes;
        self
    }

    /// Sets the number of weekly sessions.
    pub fn with_sessions(mut self, count: u32) -> Self {
        self.num_sessions = count;
        self
    }

    /// Sets the start-time granularity (minutes).
    pub fn with_step(mut self, minutes: i64) -> Self {
        self.step_minutes = minutes;
        self
    }

    /// Title used for scheduled events.
    pub fn title(&self) -> &str {
        if self.description.is_empty() {
            &self.name
        } else {
            &self.description
        }
    }

    /// Expands this activity into its sessions, occurrence 0 first.
    pub fn sessions(&self) -> impl Iterator<Item = Session> + '_ {
        (0..self.num_sessions).map(move |occurrence| Session {
            id: SessionId::new(self.id, occurrence),
            group_id: self.group_id,
            duration_minutes: self.duration_minutes,
            step_minutes: self.step_minutes,
        })
    }
}

/// Identity of one occurrence of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId {
    pub activity_id: EntityId,
    /// Zero-based occurrence index within the week.
    pub occurrence: u32,
}

impl SessionId {
    pub fn new(activity_id: EntityId, occurrence: u32) -> Self {
        Self {
            activity_id,
            occurrence,
        }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a{}#{}", self.activity_id, self.occurrence)
    }
}

/// One independently placeable occurrence of an activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    /// Inherited from the activity.
    pub group_id: EntityId,
    /// Inherited from the activity.
    pub duration_minutes: i64,
    /// Inherited from the activity.
    pub step_minutes: i64,
}

impl Session {
    #[inline]
    pub fn activity_id(&self) -> EntityId {
        self.id.activity_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_defaults() {
        let a = Activity::new(1, 10);
        assert_eq!(a.duration_minutes, 60);
        assert_eq!(a.num_sessions, 1);
        assert_eq!(a.step_minutes, DEFAULT_STEP_MINUTES);
    }

    #[test]
    fn test_title_fallback() {
        let a = Activity::new(1, 10).with_name("Swim");
        assert_eq!(a.title(), "Swim");
        let a = a.with_description("Swim - Lane 2");
        assert_eq!(a.title(), "Swim - Lane 2");
    }

    #[test]
    fn test_expand_sessions() {
        let a = Activity::new(4, 2).with_duration(45).with_sessions(3);
        let sessions: Vec<Session> = a.sessions().collect();
        assert_eq!(sessions.len(), 3);
        for (k, s) in sessions.iter().enumerate() {
            assert_eq!(s.id, SessionId::new(4, k as u32));
            assert_eq!(s.group_id, 2);
            assert_eq!(s.duration_minutes, 45);
        }
        assert_eq!(sessions[2].id.to_string(), "a4#2");
    }

    #[test]
    fn test_zero_sessions_expand_to_nothing() {
        assert_eq!(Activity::new(1, 1).with_sessions(0).sessions().count(), 0);
    }

    #[test]
    fn test_step_defaults_on_deserialize() {
        let a: Activity = serde_json::from_str(
            r#"{"id": 1, "name": "Yoga", "group_id": 2, "duration_minutes": 90, "num_sessions": 2}"#,
        )
        .unwrap();
        assert_eq!(a.step_minutes, 15);
        assert!(a.description.is_empty());
    }
}
