//! Decision model assembly.
//!
//! Translates a [`ProblemInstance`] into a [`CpModel`] whose solutions are
//! timetables.
//!
//! # Formulation
//!
//! Per session `s`:
//! - `assigned[s]`: the session is placed
//! - `venue[s][v]`, `instructor[s][i]`: resource choices
//! - `start[s]`: start minute over the session's start domain
//! - optional intervals of fixed length on the group (present iff
//!   `assigned[s]`) and on every candidate resource (present iff chosen)
//!
//! Constraints:
//! - at most one venue and one instructor per session
//! - no overlap per group, per venue, per instructor
//! - `venue[s][v] ⇒ assigned[s]`, `instructor[s][i] ⇒ assigned[s]`
//! - `assigned[s] ⇒ ∨ venue[s][·]` (and instructor) when resources are required
//! - restrictions: hard ones filter resource candidates or start values,
//!   soft ones are tied to a penalty literal
//!
//! Objective: maximize `scale·Σ assigned − Σ weight·violated` with
//! `scale = 1 + Σ weight`, so one more placed session always outweighs
//! every penalty.
//!
//! # Reference
//! - Laborie et al. (2018), "IBM ILOG CP Optimizer for Scheduling"
//! - Schaerf (1999), "A Survey of Automated Timetabling"

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::cp::{BoolVarId, CpModel, IntVarId, IntervalId, Literal};
use crate::instance::{ProblemInstance, SessionPlan};
use crate::models::{EntityId, EntityKind, Priority, Restriction, RestrictionKind, SessionId, HORIZON_MINUTES};

/// A candidate resource of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceChoice {
    pub resource_id: EntityId,
    /// True iff the session books this resource.
    pub var: BoolVarId,
    /// Session interval on this resource.
    pub interval: IntervalId,
}

/// Decision variables of one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionVars {
    pub session: SessionId,
    pub group_id: EntityId,
    pub duration: i64,
    pub assigned: BoolVarId,
    /// `None` when the session cannot be placed anywhere.
    pub start: Option<IntVarId>,
    pub group_interval: Option<IntervalId>,
    pub venue_choices: Vec<ResourceChoice>,
    pub instructor_choices: Vec<ResourceChoice>,
}

/// A soft restriction instance on one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenaltyVar {
    pub session: SessionId,
    /// Index into the instance's restriction list.
    pub restriction: usize,
    /// True iff the restriction is broken.
    pub var: BoolVarId,
    pub weight: i64,
}

/// A model together with the bookkeeping needed to read its solutions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledModel {
    pub model: CpModel,
    pub sessions: Vec<SessionVars>,
    pub penalties: Vec<PenaltyVar>,
    /// Objective weight of one placed session.
    pub session_scale: i64,
    pub require_venue: bool,
    pub require_instructor: bool,
}

impl AssembledModel {
    /// Number of sessions placed for a given objective value.
    ///
    /// Penalties never exceed one session's weight, so the count is the
    /// objective rounded up to the next multiple of the scale.
    pub fn sessions_for_objective(&self, objective: i64) -> i64 {
        if objective <= 0 {
            return 0;
        }
        (objective + self.session_scale - 1) / self.session_scale
    }
}

/// Builds the decision model for a problem instance.
///
/// # Example
/// ```
/// use u_timetable::instance::{Instance, ProblemInstance};
/// use u_timetable::models::{Activity, Group, Instructor, OpeningWindow, Venue};
/// use u_timetable::scheduler::TimetableModelBuilder;
///
/// let instance = Instance::new()
///     .with_group(Group::new(1))
///     .with_instructor(Instructor::new(1))
///     .with_venue(Venue::new(1))
///     .with_activity(Activity::new(1, 1).with_sessions(2))
///     .with_opening_window(OpeningWindow::new("mon", "09:00", "12:00"));
/// let problem = ProblemInstance::build(instance).unwrap();
///
/// let assembled = TimetableModelBuilder::new(&problem).build();
/// assert_eq!(assembled.sessions.len(), 2);
/// assert!(assembled.model.validate().is_ok());
/// ```
pub struct TimetableModelBuilder<'a> {
    problem: &'a ProblemInstance,
    require_venue: bool,
    require_instructor: bool,
}

#[derive(Default)]
struct NoOverlapSets {
    groups: BTreeMap<EntityId, Vec<IntervalId>>,
    venues: BTreeMap<EntityId, Vec<IntervalId>>,
    instructors: BTreeMap<EntityId, Vec<IntervalId>>,
}

impl<'a> TimetableModelBuilder<'a> {
    /// Creates a builder requiring both a venue and an instructor.
    pub fn new(problem: &'a ProblemInstance) -> Self {
        Self {
            problem,
            require_venue: true,
            require_instructor: true,
        }
    }

    /// Creates a builder with the resource requirements of `config`.
    pub fn from_config(problem: &'a ProblemInstance, config: &EngineConfig) -> Self {
        Self::new(problem).with_required_resources(config.require_venue, config.require_instructor)
    }

    /// Sets whether placed sessions must book a venue and an instructor.
    pub fn with_required_resources(mut self, venue: bool, instructor: bool) -> Self {
        self.require_venue = venue;
        self.require_instructor = instructor;
        self
    }

    /// Builds the model.
    pub fn build(&self) -> AssembledModel {
        let mut model = CpModel::new("timetable", HORIZON_MINUTES);
        let mut sessions = Vec::with_capacity(self.problem.sessions().len());
        let mut penalties = Vec::new();
        let mut sets = NoOverlapSets::default();

        for plan in self.problem.sessions() {
            let vars = self.add_session(&mut model, plan, &mut penalties, &mut sets);
            sessions.push(vars);
        }

        for intervals in sets
            .groups
            .into_values()
            .chain(sets.venues.into_values())
            .chain(sets.instructors.into_values())
        {
            if intervals.len() > 1 {
                model.add_no_overlap(intervals);
            }
        }

        let session_scale = 1 + penalties.iter().map(|p| p.weight).sum::<i64>();
        let terms = sessions
            .iter()
            .map(|s| (s.assigned.lit(), session_scale))
            .chain(penalties.iter().map(|p| (p.var.lit(), -p.weight)))
            .collect();
        model.maximize(terms);

        debug!(
            sessions = sessions.len(),
            bool_vars = model.bool_var_count(),
            int_vars = model.int_var_count(),
            intervals = model.interval_count(),
            constraints = model.constraint_count(),
            penalties = penalties.len(),
            "timetable model assembled"
        );

        AssembledModel {
            model,
            sessions,
            penalties,
            session_scale,
            require_venue: self.require_venue,
            require_instructor: self.require_instructor,
        }
    }

    fn add_session(
        &self,
        model: &mut CpModel,
        plan: &SessionPlan,
        penalties: &mut Vec<PenaltyVar>,
        sets: &mut NoOverlapSets,
    ) -> SessionVars {
        let session = &plan.session;
        let sid = session.id;
        let restrictions: Vec<(usize, &Restriction)> = self
            .problem
            .raw()
            .restrictions
            .iter()
            .enumerate()
            .filter(|(_, r)| r.activity_id == sid.activity_id)
            .collect();

        let assigned = model.new_bool_var(format!("assigned[{sid}]"));
        let mut vars = SessionVars {
            session: sid,
            group_id: session.group_id,
            duration: session.duration_minutes,
            assigned,
            start: None,
            group_interval: None,
            venue_choices: Vec::new(),
            instructor_choices: Vec::new(),
        };

        if plan.is_unplaceable() || self.blocked_by_static_tags(session.group_id, sid, &restrictions) {
            debug!(session = %sid, "session cannot be placed");
            model.add_bool_or(vec![assigned.not()]);
            return vars;
        }

        // Creation order: assigned, resource choices, start.
        let venue_vars: Vec<(EntityId, BoolVarId)> = self
            .candidates(EntityKind::Venue, &restrictions)
            .into_iter()
            .map(|v| (v, model.new_bool_var(format!("venue[{sid}][{v}]"))))
            .collect();
        let instructor_vars: Vec<(EntityId, BoolVarId)> = self
            .candidates(EntityKind::Instructor, &restrictions)
            .into_iter()
            .map(|i| (i, model.new_bool_var(format!("instructor[{sid}][{i}]"))))
            .collect();

        let start = model.new_int_var(format!("start[{sid}]"), plan.starts.clone());
        let duration = session.duration_minutes;
        let group_interval = model.new_optional_interval(format!("group[{sid}]"), start, duration, assigned.lit());
        sets.groups.entry(session.group_id).or_default().push(group_interval);
        vars.start = Some(start);
        vars.group_interval = Some(group_interval);

        for (v, var) in venue_vars {
            let interval = model.new_optional_interval(format!("venue[{sid}][{v}]"), start, duration, var.lit());
            sets.venues.entry(v).or_default().push(interval);
            vars.venue_choices.push(ResourceChoice {
                resource_id: v,
                var,
                interval,
            });
        }
        for (i, var) in instructor_vars {
            let interval =
                model.new_optional_interval(format!("instructor[{sid}][{i}]"), start, duration, var.lit());
            sets.instructors.entry(i).or_default().push(interval);
            vars.instructor_choices.push(ResourceChoice {
                resource_id: i,
                var,
                interval,
            });
        }

        self.add_resource_constraints(model, &vars.venue_choices, assigned, self.require_venue);
        self.add_resource_constraints(model, &vars.instructor_choices, assigned, self.require_instructor);

        for &(index, restriction) in &restrictions {
            match restriction.priority.penalty_weight() {
                None => self.add_hard_restriction(model, plan, &vars, restriction),
                Some(weight) => {
                    if let Some(var) = self.add_soft_restriction(model, plan, &vars, index, restriction) {
                        penalties.push(PenaltyVar {
                            session: sid,
                            restriction: index,
                            var,
                            weight,
                        });
                    }
                }
            }
        }

        vars
    }

    /// At most one choice, each choice implies placement, and placement
    /// implies a choice when the resource is required.
    fn add_resource_constraints(
        &self,
        model: &mut CpModel,
        choices: &[ResourceChoice],
        assigned: BoolVarId,
        required: bool,
    ) {
        let literals: Vec<Literal> = choices.iter().map(|c| c.var.lit()).collect();
        if literals.len() > 1 {
            model.add_at_most_one(literals.clone());
        }
        for c in choices {
            model.add_implication(c.var.lit(), assigned.lit());
        }
        if required {
            model.add_enforced_bool_or(vec![assigned.lit()], literals);
        }
    }

    /// Resources left after hard venue/instructor/tag restrictions.
    fn candidates(&self, kind: EntityKind, restrictions: &[(usize, &Restriction)]) -> Vec<EntityId> {
        let all: Vec<EntityId> = match kind {
            EntityKind::Venue => self.problem.venues().iter().map(|v| v.id).collect(),
            EntityKind::Instructor => self.problem.instructors().iter().map(|i| i.id).collect(),
            EntityKind::Group | EntityKind::Activity => Vec::new(),
        };
        let tags = self.problem.tag_index();

        all.into_iter()
            .filter(|&id| {
                restrictions
                    .iter()
                    .filter(|(_, r)| r.priority == Priority::Mandatory)
                    .all(|(_, r)| match (&r.kind, kind) {
                        (RestrictionKind::Venue(v), EntityKind::Venue) => *v == id,
                        (RestrictionKind::Instructor(i), EntityKind::Instructor) => *i == id,
                        (RestrictionKind::Tag { entity_kind, tag_id }, _) if *entity_kind == kind => {
                            tags.has_tag(kind, id, *tag_id)
                        }
                        _ => true,
                    })
            })
            .collect()
    }

    /// Whether a hard tag restriction on the group or activity fails.
    fn blocked_by_static_tags(
        &self,
        group_id: EntityId,
        sid: SessionId,
        restrictions: &[(usize, &Restriction)],
    ) -> bool {
        restrictions
            .iter()
            .filter(|(_, r)| r.priority.is_hard())
            .any(|(_, r)| !self.static_tag_holds(&r.kind, group_id, sid.activity_id))
    }

    /// Evaluates tag restrictions whose entity is fixed by the session.
    /// Other kinds hold trivially here.
    fn static_tag_holds(&self, kind: &RestrictionKind, group_id: EntityId, activity_id: EntityId) -> bool {
        let tags = self.problem.tag_index();
        match kind {
            RestrictionKind::Tag {
                entity_kind: EntityKind::Group,
                tag_id,
            } => tags.has_tag(EntityKind::Group, group_id, *tag_id),
            RestrictionKind::Tag {
                entity_kind: EntityKind::Activity,
                tag_id,
            } => tags.has_tag(EntityKind::Activity, activity_id, *tag_id),
            _ => true,
        }
    }

    fn add_hard_restriction(
        &self,
        model: &mut CpModel,
        plan: &SessionPlan,
        vars: &SessionVars,
        restriction: &Restriction,
    ) {
        // Resource and static tag restrictions were applied as candidate filters.
        if !restriction.kind.is_temporal() {
            return;
        }
        let Some(start) = vars.start else { return };
        let duration = vars.duration;
        let allowed = plan.starts.filter(|s| restriction.kind.permits_start(s, duration));

        if allowed.is_empty() {
            model.add_bool_or(vec![vars.assigned.not()]);
        } else if allowed.len() < plan.starts.len() {
            model.add_allowed_values(vec![vars.assigned.lit()], start, allowed);
        }
    }

    /// Adds the penalty literal of a soft restriction, or `None` when the
    /// restriction cannot be broken by this session.
    fn add_soft_restriction(
        &self,
        model: &mut CpModel,
        plan: &SessionPlan,
        vars: &SessionVars,
        index: usize,
        restriction: &Restriction,
    ) -> Option<BoolVarId> {
        let sid = vars.session;
        let assigned = vars.assigned;
        let tags = self.problem.tag_index();
        let name = format!("violated[r{index}][{sid}]");

        let breaking: Vec<BoolVarId> = match &restriction.kind {
            kind if kind.is_temporal() => {
                let start = vars.start?;
                let duration = vars.duration;
                let allowed = plan.starts.filter(|s| kind.permits_start(s, duration));
                if allowed.len() == plan.starts.len() {
                    return None;
                }
                let violated = model.new_bool_var(name);
                model.add_implication(violated.lit(), assigned.lit());
                if allowed.is_empty() {
                    model.add_implication(assigned.lit(), violated.lit());
                } else {
                    model.add_allowed_values(vec![assigned.lit(), violated.not()], start, allowed);
                }
                return Some(violated);
            }
            RestrictionKind::Venue(id) => breaking_choices(&vars.venue_choices, |v| v == *id),
            RestrictionKind::Instructor(id) => breaking_choices(&vars.instructor_choices, |i| i == *id),
            RestrictionKind::Tag {
                entity_kind: EntityKind::Venue,
                tag_id,
            } => breaking_choices(&vars.venue_choices, |v| {
                tags.has_tag(EntityKind::Venue, v, *tag_id)
            }),
            RestrictionKind::Tag {
                entity_kind: EntityKind::Instructor,
                tag_id,
            } => breaking_choices(&vars.instructor_choices, |i| {
                tags.has_tag(EntityKind::Instructor, i, *tag_id)
            }),
            kind => {
                // Group or activity tag: fixed by the session itself.
                if self.static_tag_holds(kind, vars.group_id, sid.activity_id) {
                    return None;
                }
                let violated = model.new_bool_var(name);
                model.add_implication(violated.lit(), assigned.lit());
                model.add_implication(assigned.lit(), violated.lit());
                return Some(violated);
            }
        };

        if breaking.is_empty() {
            return None;
        }
        let violated = model.new_bool_var(name);
        model.add_implication(violated.lit(), assigned.lit());
        for choice in breaking {
            model.add_implication(choice.lit(), violated.lit());
        }
        Some(violated)
    }
}

/// Choices whose resource fails `ok`.
fn breaking_choices(choices: &[ResourceChoice], ok: impl Fn(EntityId) -> bool) -> Vec<BoolVarId> {
    choices
        .iter()
        .filter(|c| !ok(c.resource_id))
        .map(|c| c.var)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cp::Constraint;
    use crate::instance::Instance;
    use crate::models::{Activity, ClockTime, DayBound, DayToken, Group, Instructor, OpeningWindow, Tag, TagLink, Venue};

    fn base() -> Instance {
        Instance::new()
            .with_group(Group::new(1))
            .with_instructor(Instructor::new(1))
            .with_instructor(Instructor::new(2))
            .with_venue(Venue::new(1))
            .with_venue(Venue::new(2))
            .with_activity(Activity::new(1, 1).with_duration(60))
            .with_opening_window(OpeningWindow::new("mon", "09:00", "12:00"))
    }

    fn assemble(instance: Instance) -> AssembledModel {
        let problem = ProblemInstance::build(instance).unwrap();
        TimetableModelBuilder::new(&problem).build()
    }

    fn count_no_overlaps(model: &CpModel) -> usize {
        model
            .constraints
            .iter()
            .filter(|c| matches!(c, Constraint::NoOverlap { .. }))
            .count()
    }

    #[test]
    fn test_session_variables() {
        let assembled = assemble(base());
        let vars = &assembled.sessions[0];
        assert_eq!(vars.venue_choices.len(), 2);
        assert_eq!(vars.instructor_choices.len(), 2);
        assert!(vars.start.is_some());
        assert_eq!(assembled.session_scale, 1);
        assert!(assembled.penalties.is_empty());
        assert!(assembled.model.validate().is_ok());
    }

    #[test]
    fn test_session_variable_order() {
        let assembled = assemble(base());
        let vars = &assembled.sessions[0];
        let order = &assembled.model.variable_order;
        assert_eq!(order[0], crate::cp::VarRef::Bool(vars.assigned));
        assert_eq!(order.last(), Some(&crate::cp::VarRef::Int(vars.start.unwrap())));
    }

    #[test]
    fn test_no_overlap_sets() {
        // Two sessions of one group sharing two venues and two instructors
        let assembled = assemble(base().with_activity(Activity::new(2, 1)));
        assert_eq!(count_no_overlaps(&assembled.model), 1 + 2 + 2);
    }

    #[test]
    fn test_single_session_has_no_overlap_sets() {
        let assembled = assemble(base());
        assert_eq!(count_no_overlaps(&assembled.model), 0);
    }

    #[test]
    fn test_unplaceable_session_is_forced_out() {
        let assembled = assemble(base().with_activity(Activity::new(2, 1).with_duration(240)));
        let vars = &assembled.sessions[1];
        assert!(vars.start.is_none());
        assert!(vars.venue_choices.is_empty());
    }

    #[test]
    fn test_hard_venue_restriction_filters_candidates() {
        let assembled = assemble(base().with_restriction(Restriction::new(1, RestrictionKind::Venue(2)).mandatory()));
        let venues: Vec<EntityId> = assembled.sessions[0]
            .venue_choices
            .iter()
            .map(|c| c.resource_id)
            .collect();
        assert_eq!(venues, vec![2]);
    }

    #[test]
    fn test_hard_tag_restriction_filters_candidates() {
        let instance = base()
            .with_tag(Tag::new(5, "pool"))
            .with_tag_link(TagLink::new(5, EntityKind::Venue, 1))
            .with_restriction(
                Restriction::new(
                    1,
                    RestrictionKind::Tag {
                        entity_kind: EntityKind::Venue,
                        tag_id: 5,
                    },
                )
                .mandatory(),
            );
        let assembled = assemble(instance);
        assert_eq!(assembled.sessions[0].venue_choices.len(), 1);
        assert_eq!(assembled.sessions[0].venue_choices[0].resource_id, 1);
        assert_eq!(assembled.sessions[0].instructor_choices.len(), 2);
    }

    #[test]
    fn test_hard_group_tag_blocks_session() {
        let instance = base().with_tag(Tag::new(5, "seniors")).with_restriction(
            Restriction::new(
                1,
                RestrictionKind::Tag {
                    entity_kind: EntityKind::Group,
                    tag_id: 5,
                },
            )
            .mandatory(),
        );
        let assembled = assemble(instance);
        assert!(assembled.sessions[0].start.is_none());
    }

    #[test]
    fn test_soft_temporal_restriction_adds_penalty() {
        let late = ClockTime::hm(10, 0).unwrap();
        let instance = base().with_restriction(
            Restriction::new(1, RestrictionKind::EarliestStart(vec![DayBound::new(DayToken::All, late)]))
                .with_priority(Priority::Medium),
        );
        let assembled = assemble(instance);
        assert_eq!(assembled.penalties.len(), 1);
        assert_eq!(assembled.penalties[0].weight, 10);
        assert_eq!(assembled.session_scale, 11);
        assert_eq!(assembled.sessions_for_objective(11 - 10), 1);
        assert_eq!(assembled.sessions_for_objective(22), 2);
    }

    #[test]
    fn test_soft_restriction_that_cannot_break_is_skipped() {
        let early = ClockTime::hm(6, 0).unwrap();
        let instance = base().with_restriction(Restriction::new(
            1,
            RestrictionKind::EarliestStart(vec![DayBound::new(DayToken::All, early)]),
        ));
        assert!(assemble(instance).penalties.is_empty());
    }

    #[test]
    fn test_hard_temporal_restriction_adds_domain_constraint() {
        let instance = base().with_restriction(
            Restriction::new(1, RestrictionKind::OnDays(vec![DayToken::Day(crate::models::Weekday::Mon)])).mandatory(),
        );
        let before = assemble(base()).model.constraint_count();
        // Every start is on Monday already
        assert_eq!(assemble(instance).model.constraint_count(), before);

        let instance = base().with_restriction(
            Restriction::new(
                1,
                RestrictionKind::LatestStart(vec![DayBound::new(DayToken::All, ClockTime::hm(9, 30).unwrap())]),
            )
            .mandatory(),
        );
        let assembled = assemble(instance);
        assert!(assembled
            .model
            .constraints
            .iter()
            .any(|c| matches!(c, Constraint::AllowedValues { domain, .. } if domain.len() == 3)));
    }
}
