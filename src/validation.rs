//! Input validation for timetabling instances.
//!
//! Checks structural integrity of an [`Instance`] before any model is
//! built. Detects:
//! - Duplicate IDs per entity kind
//! - Activities referencing unknown groups
//! - Non-positive durations and out-of-range start steps
//! - Malformed opening windows (unknown day, bad time, empty span)
//! - Restrictions and tag links referencing unknown entities
//!
//! Every problem is reported, not only the first.

use std::collections::HashSet;
use std::fmt;

use crate::instance::Instance;
use crate::models::{EntityId, EntityKind, RestrictionKind, HORIZON_MINUTES, STEP_RANGE};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two entities of the same kind share an ID.
    DuplicateId,
    /// An activity references a group that doesn't exist.
    UnknownGroup,
    /// Session length is not positive or exceeds the week.
    InvalidDuration,
    /// Start-time step outside the allowed range.
    InvalidStep,
    /// Opening window with an unknown day, bad time or empty span.
    InvalidWindow,
    /// A restriction references an unknown activity, resource or tag.
    InvalidRestriction,
    /// A tag link references an unknown tag or entity.
    InvalidTagLink,
}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

fn collect_ids(
    label: &str,
    ids: impl IntoIterator<Item = EntityId>,
    errors: &mut Vec<ValidationError>,
) -> HashSet<EntityId> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate {label} ID: {id}"),
            ));
        }
    }
    seen
}

/// Validates a raw instance.
///
/// Checks:
/// 1. No duplicate IDs among groups, instructors, venues, activities, tags
/// 2. Every activity belongs to an existing group
/// 3. Durations are in `1..=10080` minutes, steps in `1..=60`
/// 4. Every opening window parses and opens before it closes
/// 5. Restrictions reference existing activities, instructors, venues, tags
/// 6. Tag links reference existing tags and entities
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_instance(instance: &Instance) -> ValidationResult {
    let mut errors = Vec::new();

    let group_ids = collect_ids("group", instance.groups.iter().map(|g| g.id), &mut errors);
    let instructor_ids = collect_ids(
        "instructor",
        instance.instructors.iter().map(|i| i.id),
        &mut errors,
    );
    let venue_ids = collect_ids("venue", instance.venues.iter().map(|v| v.id), &mut errors);
    let activity_ids = collect_ids(
        "activity",
        instance.activities.iter().map(|a| a.id),
        &mut errors,
    );
    let tag_ids = collect_ids("tag", instance.tags.iter().map(|t| t.id), &mut errors);

    for act in &instance.activities {
        if !group_ids.contains(&act.group_id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::UnknownGroup,
                format!("Activity {} references unknown group {}", act.id, act.group_id),
            ));
        }
        if act.duration_minutes <= 0 || act.duration_minutes > HORIZON_MINUTES {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidDuration,
                format!(
                    "Activity {} has invalid duration {} min",
                    act.id, act.duration_minutes
                ),
            ));
        }
        if !STEP_RANGE.contains(&act.step_minutes) {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidStep,
                format!(
                    "Activity {} has step {} min outside {}..={}",
                    act.id,
                    act.step_minutes,
                    STEP_RANGE.start(),
                    STEP_RANGE.end()
                ),
            ));
        }
    }

    for (i, window) in instance.opening_windows.iter().enumerate() {
        if let Err(e) = window.resolve() {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidWindow,
                format!("Opening window {i}: {e}"),
            ));
        }
    }

    for r in &instance.restrictions {
        if !activity_ids.contains(&r.activity_id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidRestriction,
                format!("Restriction references unknown activity {}", r.activity_id),
            ));
        }
        let dangling = match &r.kind {
            RestrictionKind::Instructor(id) if !instructor_ids.contains(id) => {
                Some(format!("unknown instructor {id}"))
            }
            RestrictionKind::Venue(id) if !venue_ids.contains(id) => Some(format!("unknown venue {id}")),
            RestrictionKind::Tag { tag_id, .. } if !tag_ids.contains(tag_id) => {
                Some(format!("unknown tag {tag_id}"))
            }
            _ => None,
        };
        if let Some(what) = dangling {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidRestriction,
                format!("Restriction on activity {} references {what}", r.activity_id),
            ));
        }
    }

    for link in &instance.tag_links {
        if !tag_ids.contains(&link.tag_id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidTagLink,
                format!("Tag link references unknown tag {}", link.tag_id),
            ));
        }
        let known = match link.entity_kind {
            EntityKind::Group => group_ids.contains(&link.entity_id),
            EntityKind::Instructor => instructor_ids.contains(&link.entity_id),
            EntityKind::Venue => venue_ids.contains(&link.entity_id),
            EntityKind::Activity => activity_ids.contains(&link.entity_id),
        };
        if !known {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidTagLink,
                format!(
                    "Tag {} linked to unknown {:?} {}",
                    link.tag_id, link.entity_kind, link.entity_id
                ),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Activity, Group, Instructor, OpeningWindow, Restriction, Tag, TagLink, Venue,
    };

    fn sample_instance() -> Instance {
        Instance::new()
            .with_group(Group::new(1).with_name("Juniors"))
            .with_instructor(Instructor::new(1).with_name("Ada"))
            .with_venue(Venue::new(1).with_name("Hall"))
            .with_activity(Activity::new(1, 1).with_name("Swim").with_sessions(2))
            .with_opening_window(OpeningWindow::new("mon", "09:00", "12:00"))
    }

    #[test]
    fn test_valid_input() {
        assert!(validate_instance(&sample_instance()).is_ok());
    }

    #[test]
    fn test_duplicate_ids() {
        let instance = sample_instance().with_venue(Venue::new(1)).with_group(Group::new(1));
        let errors = validate_instance(&instance).unwrap_err();
        assert_eq!(
            errors
                .iter()
                .filter(|e| e.kind == ValidationErrorKind::DuplicateId)
                .count(),
            2
        );
        assert!(errors.iter().any(|e| e.message.contains("venue")));
    }

    #[test]
    fn test_unknown_group() {
        let instance = sample_instance().with_activity(Activity::new(2, 42));
        let errors = validate_instance(&instance).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::UnknownGroup));
    }

    #[test]
    fn test_invalid_duration_and_step() {
        let instance = sample_instance()
            .with_activity(Activity::new(2, 1).with_duration(0))
            .with_activity(Activity::new(3, 1).with_step(90));
        let errors = validate_instance(&instance).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::InvalidDuration));
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::InvalidStep));
    }

    #[test]
    fn test_step_below_five_minutes_rejected() {
        let instance = sample_instance()
            .with_activity(Activity::new(2, 1).with_step(1))
            .with_activity(Activity::new(3, 1).with_step(4))
            .with_activity(Activity::new(4, 1).with_step(5));
        let errors = validate_instance(&instance).unwrap_err();
        assert_eq!(
            errors
                .iter()
                .filter(|e| e.kind == ValidationErrorKind::InvalidStep)
                .count(),
            2
        );
    }

    #[test]
    fn test_bad_windows() {
        let instance = sample_instance()
            .with_opening_window(OpeningWindow::new("someday", "09:00", "10:00"))
            .with_opening_window(OpeningWindow::new("tue", "9am", "10:00"))
            .with_opening_window(OpeningWindow::new("wed", "11:00", "10:00"));
        let errors = validate_instance(&instance).unwrap_err();
        assert_eq!(
            errors
                .iter()
                .filter(|e| e.kind == ValidationErrorKind::InvalidWindow)
                .count(),
            3
        );
    }

    #[test]
    fn test_dangling_restrictions() {
        let instance = sample_instance()
            .with_restriction(Restriction::new(9, RestrictionKind::Venue(1)))
            .with_restriction(Restriction::new(1, RestrictionKind::Instructor(5)))
            .with_restriction(Restriction::new(
                1,
                RestrictionKind::Tag {
                    entity_kind: EntityKind::Venue,
                    tag_id: 3,
                },
            ));
        let errors = validate_instance(&instance).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors
            .iter()
            .all(|e| e.kind == ValidationErrorKind::InvalidRestriction));
    }

    #[test]
    fn test_tag_links() {
        let instance = sample_instance()
            .with_tag(Tag::new(1, "pool"))
            .with_tag_link(TagLink::new(1, EntityKind::Venue, 1))
            .with_tag_link(TagLink::new(2, EntityKind::Venue, 1))
            .with_tag_link(TagLink::new(1, EntityKind::Instructor, 77));
        let errors = validate_instance(&instance).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| e.kind == ValidationErrorKind::InvalidTagLink));
    }

    #[test]
    fn test_multiple_errors() {
        let instance = Instance::new()
            .with_activity(Activity::new(1, 1).with_duration(-5))
            .with_opening_window(OpeningWindow::new("mon", "10:00", "09:00"));
        let errors = validate_instance(&instance).unwrap_err();
        assert!(errors.len() >= 3);
    }
}
