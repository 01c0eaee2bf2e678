//! Problem instances.
//!
//! [`Instance`] is the raw snapshot handed over by an instance source.
//! [`ProblemInstance`] is its solver-ready form: validated, with opening
//! windows merged into the week domain and activities expanded into
//! sessions that each carry their candidate start minutes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cp::Domain;
use crate::error::{Result, TimetableError};
use crate::models::{
    Activity, EntityId, Group, Instructor, OpeningWindow, Restriction, Session, SessionId, Tag, TagIndex,
    TagLink, Venue, WeekDomain,
};
use crate::validation::{validate_instance, ValidationError, ValidationErrorKind};

/// Raw entity collections for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub instructors: Vec<Instructor>,
    #[serde(default)]
    pub venues: Vec<Venue>,
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub opening_windows: Vec<OpeningWindow>,
    #[serde(default)]
    pub restrictions: Vec<Restriction>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub tag_links: Vec<TagLink>,
}

impl Instance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, group: Group) -> Self {
        self.groups.push(group);
        self
    }

    pub fn with_instructor(mut self, instructor: Instructor) -> Self {
        self.instructors.push(instructor);
        self
    }

    pub fn with_venue(mut self, venue: Venue) -> Self {
        self.venues.push(venue);
        self
    }

    pub fn with_activity(mut self, activity: Activity) -> Self {
        self.activities.push(activity);
        self
    }

    pub fn with_opening_window(mut self, window: OpeningWindow) -> Self {
        self.opening_windows.push(window);
        self
    }

    pub fn with_restriction(mut self, restriction: Restriction) -> Self {
        self.restrictions.push(restriction);
        self
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    pub fn with_tag_link(mut self, link: TagLink) -> Self {
        self.tag_links.push(link);
        self
    }

    /// Parses an instance from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(TimetableError::Snapshot)
    }
}

/// A session together with its candidate start minutes.
#[derive(Debug, Clone)]
pub struct SessionPlan {
    pub session: Session,
    /// Start minutes at which the whole session fits in one opening window.
    pub starts: Domain,
}

impl SessionPlan {
    /// Whether the session cannot be placed anywhere.
    pub fn is_unplaceable(&self) -> bool {
        self.starts.is_empty()
    }
}

/// A validated, normalized instance ready for model assembly.
#[derive(Debug, Clone)]
pub struct ProblemInstance {
    instance: Instance,
    domain: WeekDomain,
    sessions: Vec<SessionPlan>,
    tag_index: TagIndex,
    activity_index: HashMap<EntityId, usize>,
}

impl ProblemInstance {
    /// Validates and normalizes a raw instance.
    ///
    /// # Errors
    /// [`TimetableError::Validation`] listing every structural problem.
    pub fn build(instance: Instance) -> Result<Self> {
        validate_instance(&instance).map_err(TimetableError::Validation)?;

        let domain = WeekDomain::from_opening_windows(&instance.opening_windows).map_err(|e| {
            TimetableError::Validation(vec![ValidationError::new(
                ValidationErrorKind::InvalidWindow,
                e.to_string(),
            )])
        })?;

        let mut sessions = Vec::new();
        for activity in &instance.activities {
            let starts = Domain::from_values(
                domain.start_candidates(activity.duration_minutes, activity.step_minutes),
            );
            if starts.is_empty() && activity.num_sessions > 0 {
                warn!(
                    activity_id = activity.id,
                    duration = activity.duration_minutes,
                    "activity fits no opening window; its sessions stay unscheduled"
                );
            }
            sessions.extend(activity.sessions().map(|session| SessionPlan {
                session,
                starts: starts.clone(),
            }));
        }

        let activity_index = instance
            .activities
            .iter()
            .enumerate()
            .map(|(i, a)| (a.id, i))
            .collect();
        let tag_index = TagIndex::from_links(&instance.tag_links);

        debug!(
            activities = instance.activities.len(),
            sessions = sessions.len(),
            open_minutes = domain.open_minutes(),
            "instance normalized"
        );

        Ok(Self {
            instance,
            domain,
            sessions,
            tag_index,
            activity_index,
        })
    }

    /// The raw snapshot this instance was built from.
    pub fn raw(&self) -> &Instance {
        &self.instance
    }

    /// Merged opening windows.
    pub fn domain(&self) -> &WeekDomain {
        &self.domain
    }

    /// Sessions in activity order, occurrence 0 first.
    pub fn sessions(&self) -> &[SessionPlan] {
        &self.sessions
    }

    pub fn session(&self, id: SessionId) -> Option<&SessionPlan> {
        self.sessions.iter().find(|p| p.session.id == id)
    }

    pub fn tag_index(&self) -> &TagIndex {
        &self.tag_index
    }

    pub fn activity(&self, id: EntityId) -> Option<&Activity> {
        self.activity_index
            .get(&id)
            .map(|&i| &self.instance.activities[i])
    }

    pub fn groups(&self) -> &[Group] {
        &self.instance.groups
    }

    pub fn instructors(&self) -> &[Instructor] {
        &self.instance.instructors
    }

    pub fn venues(&self) -> &[Venue] {
        &self.instance.venues
    }

    /// Restrictions on one activity.
    pub fn restrictions_for(&self, activity_id: EntityId) -> impl Iterator<Item = &Restriction> {
        self.instance
            .restrictions
            .iter()
            .filter(move |r| r.activity_id == activity_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RestrictionKind, Weekday};

    fn scenario_a() -> Instance {
        Instance::new()
            .with_group(Group::new(1))
            .with_instructor(Instructor::new(1))
            .with_venue(Venue::new(1))
            .with_activity(Activity::new(1, 1).with_duration(60))
            .with_opening_window(OpeningWindow::new("mon", "09:00", "16:30"))
    }

    #[test]
    fn test_build_expands_sessions() {
        let instance = scenario_a().with_activity(Activity::new(2, 1).with_sessions(3).with_duration(45));
        let problem = ProblemInstance::build(instance).unwrap();

        assert_eq!(problem.sessions().len(), 4);
        let second: Vec<_> = problem
            .sessions()
            .iter()
            .filter(|p| p.session.activity_id() == 2)
            .collect();
        assert_eq!(second.len(), 3);
        assert!(second.iter().all(|p| p.session.duration_minutes == 45));
        assert!(problem.session(SessionId::new(2, 2)).is_some());
        assert!(problem.session(SessionId::new(2, 3)).is_none());
    }

    #[test]
    fn test_start_domain_within_window() {
        let problem = ProblemInstance::build(scenario_a()).unwrap();
        let plan = &problem.sessions()[0];
        assert_eq!(plan.starts.min(), Some(540));
        assert_eq!(plan.starts.max(), Some(930));
        assert!(plan.starts.values().iter().all(|s| Weekday::of_minute(*s) == Weekday::Mon));
    }

    #[test]
    fn test_no_windows_gives_empty_domains() {
        let mut instance = scenario_a();
        instance.opening_windows.clear();
        let problem = ProblemInstance::build(instance).unwrap();
        assert!(problem.domain().is_empty());
        assert!(problem.sessions().iter().all(SessionPlan::is_unplaceable));
    }

    #[test]
    fn test_build_rejects_invalid_input() {
        let instance = scenario_a().with_opening_window(OpeningWindow::new("mon", "25:00", "26:00"));
        match ProblemInstance::build(instance) {
            Err(TimetableError::Validation(errors)) => assert_eq!(errors.len(), 1),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_lookups() {
        let instance = scenario_a().with_restriction(Restriction::new(1, RestrictionKind::Venue(1)));
        let problem = ProblemInstance::build(instance).unwrap();
        assert!(problem.activity(1).is_some());
        assert!(problem.activity(7).is_none());
        assert_eq!(problem.restrictions_for(1).count(), 1);
        assert_eq!(problem.restrictions_for(2).count(), 0);
    }

    #[test]
    fn test_instance_from_json() {
        let json = r#"{
            "groups": [{"id": 1, "name": "A"}],
            "activities": [{"id": 1, "name": "Run", "group_id": 1, "duration_minutes": 30, "num_sessions": 2}],
            "opening_windows": [{"day": "weekday", "opening_time": "07:00:00", "closing_time": "08:00:00"}]
        }"#;
        let instance = Instance::from_json_str(json).unwrap();
        let problem = ProblemInstance::build(instance).unwrap();
        assert_eq!(problem.domain().windows().len(), 5);
        assert_eq!(problem.sessions().len(), 2);
    }
}
