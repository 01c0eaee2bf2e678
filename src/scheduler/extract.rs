//! Result extraction.
//!
//! Reads a solved model back into domain terms: one [`ScheduledEvent`]
//! per placed session, plus [`Violation`]s for anything the solution
//! asserts but the timetable cannot show consistently.

use serde::de::Error as _;
use serde::{Deserialize, Serialize};

use super::builder::{AssembledModel, ResourceChoice};
use crate::cp::CpSolution;
use crate::error::{Result, TimetableError};
use crate::instance::ProblemInstance;
use crate::models::{split_week_minute, EntityId, ScheduledEvent, Violation, FORMAT_VERSION};

/// Events and violations read from one solution.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Events ordered by start minute, activity id, occurrence.
    pub events: Vec<ScheduledEvent>,
    pub violations: Vec<Violation>,
}

/// Reads events from a solution.
///
/// A session is emitted iff its `assigned` literal is true, it has a start
/// inside its start domain, and every required resource is booked.
/// Placed sessions failing the last two checks become violations instead.
pub fn extract(problem: &ProblemInstance, assembled: &AssembledModel, solution: &CpSolution) -> Extraction {
    let mut out = Extraction::default();
    if !solution.is_solution_found() {
        return out;
    }

    for (plan, vars) in problem.sessions().iter().zip(&assembled.sessions) {
        if !solution.value(vars.assigned) {
            continue;
        }
        let sid = vars.session;

        let start = match vars.start.and_then(|s| solution.int_value(s)) {
            Some(start) if plan.starts.contains(start) => start,
            Some(start) => {
                out.violations.push(Violation::outside_window(
                    sid,
                    format!("session {sid} placed at minute {start}, outside its opening windows"),
                ));
                continue;
            }
            None => {
                out.violations
                    .push(Violation::outside_window(sid, format!("session {sid} placed without a start")));
                continue;
            }
        };

        let venue_id = chosen(&vars.venue_choices, solution);
        let instructor_id = chosen(&vars.instructor_choices, solution);
        if assembled.require_venue && venue_id.is_none() {
            out.violations
                .push(Violation::unresourced(sid, format!("session {sid} placed without a venue")));
            continue;
        }
        if assembled.require_instructor && instructor_id.is_none() {
            out.violations.push(Violation::unresourced(
                sid,
                format!("session {sid} placed without an instructor"),
            ));
            continue;
        }

        let end = start + vars.duration;
        let (day, start_time) = split_week_minute(start);
        let (_, end_time) = split_week_minute(end);
        let title = problem
            .activity(sid.activity_id)
            .map(|a| a.title().to_string())
            .unwrap_or_default();

        out.events.push(ScheduledEvent {
            title,
            day_of_week: day.iso_number(),
            start_time,
            end_time,
            activity_id: sid.activity_id,
            occurrence: sid.occurrence,
            group_id: vars.group_id,
            instructor_id,
            venue_id,
            start_minute: start,
            end_minute: end,
        });
    }

    for penalty in &assembled.penalties {
        if solution.value(penalty.var) {
            let what = problem
                .raw()
                .restrictions
                .get(penalty.restriction)
                .map(|r| format!("{:?} restriction {:?}", r.priority, r.kind))
                .unwrap_or_else(|| "restriction".to_string());
            out.violations.push(Violation::soft_restriction(
                penalty.session,
                format!("session {} breaks {what}", penalty.session),
                penalty.weight,
            ));
        }
    }

    out.events
        .sort_by_key(|e| (e.start_minute, e.activity_id, e.occurrence));
    out
}

fn chosen(choices: &[ResourceChoice], solution: &CpSolution) -> Option<EntityId> {
    choices
        .iter()
        .find(|c| solution.value(c.var))
        .map(|c| c.resource_id)
}

/// The solved model as persisted next to the events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub format_version: u32,
    pub assembled: AssembledModel,
    pub solution: CpSolution,
}

impl ModelSnapshot {
    pub fn new(assembled: AssembledModel, solution: CpSolution) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            assembled,
            solution,
        }
    }

    /// Serializes the snapshot to an opaque blob.
    pub fn to_blob(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Restores a snapshot, rejecting unknown format versions.
    pub fn from_blob(blob: &[u8]) -> Result<Self> {
        let snapshot: Self = serde_json::from_slice(blob)?;
        if snapshot.format_version != FORMAT_VERSION {
            return Err(TimetableError::Snapshot(serde_json::Error::custom(format!(
                "unsupported snapshot format version {}",
                snapshot.format_version
            ))));
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cp::SolverStatus;
    use crate::instance::Instance;
    use crate::models::{Activity, ClockTime, Group, Instructor, OpeningWindow, SessionId, Venue, ViolationType};
    use crate::scheduler::TimetableModelBuilder;

    fn problem() -> ProblemInstance {
        ProblemInstance::build(
            Instance::new()
                .with_group(Group::new(1))
                .with_instructor(Instructor::new(7))
                .with_venue(Venue::new(3))
                .with_activity(Activity::new(1, 1).with_name("Swim").with_duration(60).with_sessions(2))
                .with_opening_window(OpeningWindow::new("sun", "22:00", "24:00")),
        )
        .unwrap()
    }

    /// Builds a hand-made solution: `placed` lists (session index, start).
    fn solution_for(
        assembled: &AssembledModel,
        placed: &[(usize, i64)],
        with_resources: bool,
    ) -> CpSolution {
        let mut solution = CpSolution::empty(SolverStatus::Feasible);
        solution.bool_values = vec![false; assembled.model.bool_var_count()];
        solution.int_values = vec![0; assembled.model.int_var_count()];
        for &(index, start) in placed {
            let vars = &assembled.sessions[index];
            solution.bool_values[vars.assigned.0] = true;
            solution.int_values[vars.start.unwrap().0] = start;
            if with_resources {
                solution.bool_values[vars.venue_choices[0].var.0] = true;
                solution.bool_values[vars.instructor_choices[0].var.0] = true;
            }
        }
        solution
    }

    #[test]
    fn test_events_ordered_and_rolled_over() {
        let problem = problem();
        let assembled = TimetableModelBuilder::new(&problem).build();
        let sunday_22 = 6 * 1440 + 1320;
        let solution = solution_for(&assembled, &[(0, sunday_22 + 60), (1, sunday_22)], true);

        let out = extract(&problem, &assembled, &solution);
        assert!(out.violations.is_empty());
        assert_eq!(out.events.len(), 2);
        assert_eq!(out.events[0].occurrence, 1);
        assert_eq!(out.events[1].day_of_week, 7);
        // Ends at Sunday 24:00, rendered as 00:00
        assert_eq!(out.events[1].end_time, ClockTime::MIDNIGHT);
        assert_eq!(out.events[1].duration_minutes(), 60);
        assert_eq!(out.events[1].venue_id, Some(3));
        assert_eq!(out.events[1].instructor_id, Some(7));
        assert_eq!(out.events[1].title, "Swim");
    }

    #[test]
    fn test_unresourced_session_becomes_violation() {
        let problem = problem();
        let assembled = TimetableModelBuilder::new(&problem).build();
        let solution = solution_for(&assembled, &[(0, 6 * 1440 + 1320)], false);

        let out = extract(&problem, &assembled, &solution);
        assert!(out.events.is_empty());
        assert_eq!(out.violations.len(), 1);
        assert_eq!(out.violations[0].violation_type, ViolationType::Unresourced);
        assert_eq!(out.violations[0].session, SessionId::new(1, 0));
    }

    #[test]
    fn test_optional_resources_emit_without_ids() {
        let problem = problem();
        let assembled = TimetableModelBuilder::new(&problem)
            .with_required_resources(false, false)
            .build();
        let solution = solution_for(&assembled, &[(0, 6 * 1440 + 1320)], false);

        let out = extract(&problem, &assembled, &solution);
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].venue_id, None);
        assert_eq!(out.events[0].instructor_id, None);
    }

    #[test]
    fn test_start_outside_domain_is_rejected() {
        let problem = problem();
        let assembled = TimetableModelBuilder::new(&problem).build();
        let solution = solution_for(&assembled, &[(0, 100)], true);

        let out = extract(&problem, &assembled, &solution);
        assert!(out.events.is_empty());
        assert_eq!(out.violations[0].violation_type, ViolationType::OutsideWindow);
    }

    #[test]
    fn test_no_solution_extracts_nothing() {
        let problem = problem();
        let assembled = TimetableModelBuilder::new(&problem).build();
        let out = extract(&problem, &assembled, &CpSolution::empty(SolverStatus::Unknown));
        assert!(out.events.is_empty() && out.violations.is_empty());
    }

    #[test]
    fn test_snapshot_blob() {
        let problem = problem();
        let assembled = TimetableModelBuilder::new(&problem).build();
        let solution = solution_for(&assembled, &[], false);
        let blob = ModelSnapshot::new(assembled, solution).to_blob().unwrap();

        let back = ModelSnapshot::from_blob(&blob).unwrap();
        assert_eq!(back.format_version, FORMAT_VERSION);
        assert_eq!(back.assembled.sessions.len(), 2);

        let mut value: serde_json::Value = serde_json::from_slice(&blob).unwrap();
        value["format_version"] = serde_json::json!(99);
        let tampered = serde_json::to_vec(&value).unwrap();
        assert!(matches!(
            ModelSnapshot::from_blob(&tampered),
            Err(TimetableError::Snapshot(_))
        ));
    }
}
