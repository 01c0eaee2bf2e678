//! Mixed-integer backend for [`CpModel`].
//!
//! # Formulation
//!
//! - Every boolean variable is a binary column. Fixed ones get equal bounds.
//! - Every integer variable `v` is one-hot over its domain: `x[v,t]` with
//!   `Σ_t x[v,t] = 1`.
//! - An interval `I` on start `v` occupies `o[I,t] = [start = t ∧ present]`.
//!   Always-present intervals reuse `x[v,t]`. Optional ones get a continuous
//!   column with `o[I,t] ≤ x[v,t]` and `Σ_t o[I,t] = presence`, which makes
//!   it integral whenever `x` and the presence literal are.
//! - Clauses: `Σ literals + Σ (1 − enforcement) ≥ 1`.
//! - At-most-one: `Σ literals ≤ 1`.
//! - Allowed values: `Σ_{t ∈ allowed} x[v,t] + Σ (1 − enforcement) ≥ 1`.
//! - No-overlap: at every candidate start `m` of the set,
//!   `Σ { o[I,t] : t ≤ m < t + size(I) } ≤ 1`. Two fixed-size intervals
//!   overlap iff one contains the other's start, so start points suffice.
//!
//! The clique rows of the no-overlap sets keep the LP relaxation close to
//! the resource capacity, so over-constrained weeks are closed by the bound
//! instead of by enumeration.
//!
//! The solve runs on a worker thread over a copy of the model. The caller
//! polls the abort handle and the time limit and returns
//! [`SolverStatus::Unknown`] when either fires; the worker is then left to
//! finish on its own and its result is dropped.
//!
//! # Reference
//! - Wolsey (1998), "Integer Programming", Ch. 1
//! - Sousa & Wolsey (1992), "A time indexed formulation of non-preemptive
//!   single machine scheduling problems"

use std::collections::BTreeSet;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use good_lp::{
    constraint, microlp, variable, Constraint as LinearConstraint, Expression, ProblemVariables, ResolutionError,
    Solution, SolverModel, Variable,
};
use tracing::{debug, warn};

use super::model::{Constraint, CpModel};
use super::solver::{CpSolution, CpSolver, SolverConfig, SolverStatus};
use super::variables::{IntervalId, Literal};

/// Wait between two abort and deadline checks.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Exact solver translating the model into a 0-1 program solved by
/// `microlp` branch and bound.
///
/// # Example
///
/// ```
/// use u_timetable::cp::{CpModel, CpSolver, MipSolver, SolverConfig, SolverStatus};
///
/// let mut model = CpModel::new("pair", 100);
/// let a = model.new_bool_var("a");
/// let b = model.new_bool_var("b");
/// model.add_at_most_one(vec![a.lit(), b.lit()]);
/// model.maximize(vec![(a.lit(), 1), (b.lit(), 2)]);
///
/// let solution = MipSolver::new().solve(&model, &SolverConfig::default());
/// assert_eq!(solution.status, SolverStatus::Optimal);
/// assert_eq!(solution.objective_value, Some(2));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MipSolver;

impl MipSolver {
    pub fn new() -> Self {
        Self
    }
}

/// What the worker thread reports back.
enum WorkerResult {
    Solved { bools: Vec<bool>, ints: Vec<i64> },
    Infeasible,
    Failed(String),
}

impl CpSolver for MipSolver {
    fn solve(&self, model: &CpModel, config: &SolverConfig) -> CpSolution {
        if let Err(reason) = model.validate() {
            debug!(model = %model.name, %reason, "model rejected");
            return CpSolution::empty(SolverStatus::ModelInvalid);
        }

        let started = Instant::now();
        if config.abort.is_aborted() {
            debug!(model = %model.name, "solve aborted before start");
            return finish(CpSolution::empty(SolverStatus::Unknown), started);
        }

        let (tx, rx) = mpsc::channel();
        let owned = model.clone();
        let log_progress = config.log_search_progress;
        let spawned = thread::Builder::new().name("mip-solve".into()).spawn(move || {
            // The receiver is gone when the caller stopped waiting.
            let _ = tx.send(solve_encoded(&owned, log_progress));
        });
        if let Err(e) = spawned {
            warn!(error = %e, "failed to start solver thread");
            return finish(CpSolution::empty(SolverStatus::Unknown), started);
        }

        let deadline = started + Duration::from_millis(config.time_limit_ms);
        let result = loop {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(result) => break Some(result),
                Err(RecvTimeoutError::Timeout) => {
                    if config.abort.is_aborted() || Instant::now() >= deadline {
                        break None;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    break Some(WorkerResult::Failed("solver thread exited without a result".into()))
                }
            }
        };

        let solution = match result {
            None => {
                debug!(
                    model = %model.name,
                    aborted = config.abort.is_aborted(),
                    time_limit_ms = config.time_limit_ms,
                    "solve stopped before a proof"
                );
                CpSolution::empty(SolverStatus::Unknown)
            }
            Some(WorkerResult::Solved { bools, ints }) => {
                let mut solution = CpSolution::empty(SolverStatus::Optimal);
                solution.objective_value = Some(objective_value(model, &bools));
                solution.bool_values = bools;
                solution.int_values = ints;
                solution
            }
            Some(WorkerResult::Infeasible) => CpSolution::empty(SolverStatus::Infeasible),
            Some(WorkerResult::Failed(reason)) => {
                warn!(model = %model.name, %reason, "mip solve failed");
                CpSolution::empty(SolverStatus::ModelInvalid)
            }
        };
        finish(solution, started)
    }
}

fn finish(mut solution: CpSolution, started: Instant) -> CpSolution {
    solution.solve_time_ms = started.elapsed().as_millis() as i64;
    solution
}

/// Objective of an assignment, in the model's own sense.
fn objective_value(model: &CpModel, bools: &[bool]) -> i64 {
    let Some(objective) = &model.objective else {
        return 0;
    };
    let total: i64 = objective
        .maximization_terms()
        .iter()
        .filter(|(l, _)| l.eval(bools.get(l.var.0).copied().unwrap_or(false)))
        .map(|&(_, w)| w)
        .sum();
    if objective.is_minimize() {
        -total
    } else {
        total
    }
}

fn solve_encoded(model: &CpModel, log_progress: bool) -> WorkerResult {
    if model.bool_var_count() == 0 && model.int_var_count() == 0 && model.constraint_count() == 0 {
        return WorkerResult::Solved {
            bools: Vec::new(),
            ints: Vec::new(),
        };
    }
    let Some(encoding) = Encoding::build(model) else {
        return WorkerResult::Infeasible;
    };
    if log_progress {
        debug!(
            model = %model.name,
            rows = encoding.rows.len(),
            one_hot = encoding.values.iter().map(Vec::len).sum::<usize>(),
            occupancy = encoding.occupancy.iter().map(Vec::len).sum::<usize>(),
            "mip encoded"
        );
    }

    let objective = encoding.objective(model);
    let Encoding {
        vars,
        bools,
        values,
        rows,
        ..
    } = encoding;

    let mut problem = vars.maximise(objective).using(microlp);
    for row in rows {
        problem.add_constraint(row);
    }

    match problem.solve() {
        Ok(solution) => WorkerResult::Solved {
            bools: bools.iter().map(|&x| solution.value(x) > 0.5).collect(),
            ints: values
                .iter()
                .map(|columns| {
                    columns
                        .iter()
                        .find(|&&(_, x)| solution.value(x) > 0.5)
                        .map_or(0, |&(t, _)| t)
                })
                .collect(),
        },
        Err(ResolutionError::Infeasible) => WorkerResult::Infeasible,
        Err(e) => WorkerResult::Failed(e.to_string()),
    }
}

/// Columns and rows of the 0-1 program.
struct Encoding {
    vars: ProblemVariables,
    bools: Vec<Variable>,
    /// One-hot columns of each integer variable, by domain value.
    values: Vec<Vec<(i64, Variable)>>,
    /// Occupancy columns of each interval, by start value.
    occupancy: Vec<Vec<(i64, Variable)>>,
    rows: Vec<LinearConstraint>,
}

impl Encoding {
    /// `None` when an always-present interval has no start value.
    fn build(model: &CpModel) -> Option<Self> {
        let mut vars = ProblemVariables::new();
        let mut rows = Vec::new();

        let bools: Vec<Variable> = model
            .bool_vars
            .iter()
            .map(|b| match b.fixed {
                Some(value) => {
                    let v = if value { 1.0 } else { 0.0 };
                    vars.add(variable().min(v).max(v))
                }
                None => vars.add(variable().binary()),
            })
            .collect();

        let mut values = Vec::with_capacity(model.int_var_count());
        for var in &model.int_vars {
            let columns: Vec<(i64, Variable)> = var
                .domain
                .values()
                .iter()
                .map(|&t| (t, vars.add(variable().binary())))
                .collect();
            // An empty domain only matters through the intervals and
            // allowed-value rows that use the variable.
            if !columns.is_empty() {
                let total = column_sum(&columns);
                rows.push(constraint!(total == 1.0));
            }
            values.push(columns);
        }

        let mut encoding = Self {
            vars,
            bools,
            values,
            occupancy: Vec::with_capacity(model.interval_count()),
            rows,
        };
        if !encoding.add_intervals(model) {
            return None;
        }
        for c in &model.constraints {
            encoding.add_constraint(model, c);
        }
        Some(encoding)
    }

    fn add_intervals(&mut self, model: &CpModel) -> bool {
        for iv in &model.intervals {
            let starts = self.values[iv.start.0].clone();
            match iv.presence {
                None => {
                    if starts.is_empty() {
                        debug!(interval = %iv.name, "mandatory interval has no start value");
                        return false;
                    }
                    self.occupancy.push(starts);
                }
                Some(presence) => {
                    let mut columns = Vec::with_capacity(starts.len());
                    for (t, x) in starts {
                        let o = self.vars.add(variable().min(0.0).max(1.0));
                        self.rows.push(constraint!(o <= x));
                        columns.push((t, o));
                    }
                    let total = column_sum(&columns);
                    let present = self.literal(presence);
                    self.rows.push(constraint!(total == present));
                    self.occupancy.push(columns);
                }
            }
        }
        true
    }

    fn add_constraint(&mut self, model: &CpModel, constraint: &Constraint) {
        match constraint {
            Constraint::AtMostOne { literals } => {
                let total = self.literal_sum(literals.iter().copied());
                self.rows.push(constraint!(total <= 1.0));
            }
            Constraint::BoolOr {
                enforcement,
                literals,
            } => {
                let mut total = self.literal_sum(literals.iter().copied());
                total += self.literal_sum(enforcement.iter().map(|e| e.not()));
                self.rows.push(constraint!(total >= 1.0));
            }
            Constraint::AllowedValues {
                enforcement,
                var,
                domain,
            } => {
                let mut total: Expression = self.values[var.0]
                    .iter()
                    .filter(|(t, _)| domain.contains(*t))
                    .map(|&(_, x)| x)
                    .sum();
                total += self.literal_sum(enforcement.iter().map(|e| e.not()));
                self.rows.push(constraint!(total >= 1.0));
            }
            Constraint::NoOverlap { intervals } => self.add_no_overlap(model, intervals),
        }
    }

    fn add_no_overlap(&mut self, model: &CpModel, intervals: &[IntervalId]) {
        let members: Vec<(i64, &[(i64, Variable)])> = intervals
            .iter()
            .map(|&id| (model.interval(id).size, self.occupancy[id.0].as_slice()))
            .filter(|&(size, _)| size > 0)
            .collect();
        let points: BTreeSet<i64> = members
            .iter()
            .flat_map(|(_, columns)| columns.iter().map(|&(t, _)| t))
            .collect();

        for m in points {
            let covering: Vec<Variable> = members
                .iter()
                .flat_map(|&(size, columns)| {
                    columns
                        .iter()
                        .filter(move |&&(t, _)| t <= m && m < t + size)
                        .map(|&(_, o)| o)
                })
                .collect();
            if covering.len() > 1 {
                let total: Expression = covering.into_iter().sum();
                self.rows.push(constraint!(total <= 1.0));
            }
        }
    }

    fn objective(&self, model: &CpModel) -> Expression {
        let mut objective = Expression::from(0.0);
        if let Some(o) = &model.objective {
            for (l, w) in o.maximization_terms() {
                objective += self.literal(l) * (w as f64);
            }
        }
        objective
    }

    fn literal(&self, l: Literal) -> Expression {
        let x = self.bools[l.var.0];
        if l.negated {
            Expression::from(1.0) - x
        } else {
            Expression::from(x)
        }
    }

    fn literal_sum(&self, literals: impl IntoIterator<Item = Literal>) -> Expression {
        let mut total = Expression::from(0.0);
        for l in literals {
            total += self.literal(l);
        }
        total
    }
}

fn column_sum(columns: &[(i64, Variable)]) -> Expression {
    columns.iter().map(|&(_, x)| x).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cp::{AbortHandle, Domain};

    fn solve(model: &CpModel) -> CpSolution {
        MipSolver::new().solve(model, &SolverConfig::default())
    }

    #[test]
    fn test_no_overlap_limits_presence() {
        // Two 60-minute intervals inside a 90-minute window
        let mut model = CpModel::new("window", 1000);
        let mut terms = Vec::new();
        let mut ivs = Vec::new();
        for k in 0..2 {
            let p = model.new_bool_var(format!("p{k}"));
            let s = model.new_int_var(format!("s{k}"), Domain::from_values([0, 15, 30]));
            ivs.push(model.new_optional_interval(format!("iv{k}"), s, 60, p.lit()));
            terms.push((p.lit(), 1));
        }
        model.add_no_overlap(ivs);
        model.maximize(terms);

        let solution = solve(&model);
        assert_eq!(solution.status, SolverStatus::Optimal);
        assert_eq!(solution.objective_value, Some(1));
    }

    #[test]
    fn test_no_overlap_places_both_when_room() {
        let mut model = CpModel::new("room", 1000);
        let mut ivs = Vec::new();
        let mut terms = Vec::new();
        for k in 0..2 {
            let p = model.new_bool_var(format!("p{k}"));
            let s = model.new_int_var(format!("s{k}"), Domain::from_values([0, 30, 60]));
            ivs.push(model.new_optional_interval(format!("iv{k}"), s, 60, p.lit()));
            terms.push((p.lit(), 1));
        }
        model.add_no_overlap(ivs.clone());
        model.maximize(terms);

        let solution = solve(&model);
        assert_eq!(solution.objective_value, Some(2));
        let a = solution.interval_bounds(&model, ivs[0]).unwrap();
        let b = solution.interval_bounds(&model, ivs[1]).unwrap();
        assert!(a.1 <= b.0 || b.1 <= a.0);
    }

    #[test]
    fn test_over_constrained_packing_is_proven() {
        // Ten hour-long intervals, room for five.
        let mut model = CpModel::new("packing", 1000);
        let mut ivs = Vec::new();
        let mut terms = Vec::new();
        for k in 0..10 {
            let p = model.new_bool_var(format!("p{k}"));
            let s = model.new_int_var(format!("s{k}"), Domain::from_values((0..=240).step_by(15)));
            ivs.push(model.new_optional_interval(format!("iv{k}"), s, 60, p.lit()));
            terms.push((p.lit(), 1));
        }
        model.add_no_overlap(ivs.clone());
        model.maximize(terms);

        let config = SolverConfig::default().with_time_limit_ms(10_000);
        let solution = MipSolver::new().solve(&model, &config);
        assert_eq!(solution.status, SolverStatus::Optimal);
        assert_eq!(solution.objective_value, Some(5));

        let mut placed: Vec<(i64, i64)> = ivs
            .iter()
            .filter_map(|&iv| solution.interval_bounds(&model, iv))
            .collect();
        placed.sort_unstable();
        assert!(placed.windows(2).all(|w| w[0].1 <= w[1].0));
    }

    #[test]
    fn test_mandatory_intervals_share_a_resource() {
        let mut model = CpModel::new("mandatory", 1000);
        let a = model.new_int_var("a", Domain::from_values([0, 30]));
        let b = model.new_int_var("b", Domain::from_values([0, 30]));
        let ia = model.new_interval("ia", a, 30);
        let ib = model.new_interval("ib", b, 30);
        model.add_no_overlap(vec![ia, ib]);

        let solution = solve(&model);
        assert_eq!(solution.status, SolverStatus::Optimal);
        assert_ne!(solution.int_value(a), solution.int_value(b));
    }

    #[test]
    fn test_enforced_bool_or() {
        let mut model = CpModel::new("imply", 10);
        let a = model.new_bool_var("a");
        let b = model.new_bool_var("b");
        model.add_implication(a.lit(), b.lit());
        model.add_forbidden(vec![b.lit()]);
        model.maximize(vec![(a.lit(), 1)]);

        let solution = solve(&model);
        assert_eq!(solution.status, SolverStatus::Optimal);
        assert!(!solution.value(a));
        assert_eq!(solution.objective_value, Some(0));
    }

    #[test]
    fn test_allowed_values_conditional() {
        let mut model = CpModel::new("allowed", 100);
        let on = model.new_bool_var("on");
        let x = model.new_int_var("x", Domain::from_ranges(&[(0, 10)]));
        model.add_allowed_values(vec![on.lit()], x, Domain::from_values([7]));
        model.maximize(vec![(on.lit(), 1)]);

        let solution = solve(&model);
        assert!(solution.value(on));
        assert_eq!(solution.int_value(x), Some(7));
    }

    #[test]
    fn test_constants_are_respected() {
        let mut model = CpModel::new("constants", 10);
        let off = model.new_constant("off", false);
        let on = model.new_constant("on", true);
        model.maximize(vec![(off.lit(), 5), (on.lit(), 1)]);

        let solution = solve(&model);
        assert!(!solution.value(off));
        assert!(solution.value(on));
        assert_eq!(solution.objective_value, Some(1));
    }

    #[test]
    fn test_infeasible_units() {
        let mut model = CpModel::new("contradiction", 10);
        let a = model.new_bool_var("a");
        model.add_bool_or(vec![a.lit()]);
        model.add_bool_or(vec![a.not()]);

        let solution = solve(&model);
        assert_eq!(solution.status, SolverStatus::Infeasible);
        assert!(!solution.is_solution_found());
    }

    #[test]
    fn test_empty_domain_is_infeasible_when_mandatory() {
        let mut model = CpModel::new("empty", 10);
        let s = model.new_int_var("s", Domain::empty());
        model.new_interval("fixed", s, 5);

        assert_eq!(solve(&model).status, SolverStatus::Infeasible);
    }

    #[test]
    fn test_empty_domain_forces_optional_interval_out() {
        let mut model = CpModel::new("absent", 10);
        let p = model.new_bool_var("p");
        let s = model.new_int_var("s", Domain::empty());
        let iv = model.new_optional_interval("iv", s, 5, p.lit());
        model.maximize(vec![(p.lit(), 1)]);

        let solution = solve(&model);
        assert_eq!(solution.status, SolverStatus::Optimal);
        assert!(!solution.is_present(&model, iv));
        assert_eq!(solution.objective_value, Some(0));
    }

    #[test]
    fn test_invalid_model() {
        let mut model = CpModel::new("invalid", 10);
        model.add_no_overlap(vec![IntervalId(3)]);
        assert_eq!(solve(&model).status, SolverStatus::ModelInvalid);
    }

    #[test]
    fn test_minimize_reports_model_sense() {
        let mut model = CpModel::new("min", 10);
        let a = model.new_bool_var("a");
        let b = model.new_bool_var("b");
        model.add_bool_or(vec![a.lit(), b.lit()]);
        model.minimize(vec![(a.lit(), 5), (b.lit(), 3)]);

        let solution = solve(&model);
        assert_eq!(solution.status, SolverStatus::Optimal);
        assert_eq!(solution.objective_value, Some(3));
        assert!(solution.value(b));
        assert!(!solution.value(a));
    }

    #[test]
    fn test_abort_before_start() {
        let mut model = CpModel::new("abort", 10);
        let a = model.new_bool_var("a");
        model.maximize(vec![(a.lit(), 1)]);

        let abort = AbortHandle::new();
        abort.abort();
        let config = SolverConfig::default().with_abort_handle(abort);
        let solution = MipSolver::new().solve(&model, &config);
        assert_eq!(solution.status, SolverStatus::Unknown);
        assert!(!solution.is_solution_found());
    }

    #[test]
    fn test_no_objective_is_satisfaction() {
        let mut model = CpModel::new("sat", 10);
        let a = model.new_bool_var("a");
        let b = model.new_bool_var("b");
        model.add_at_most_one(vec![a.lit(), b.lit()]);
        model.add_bool_or(vec![a.lit(), b.lit()]);

        let solution = solve(&model);
        assert_eq!(solution.status, SolverStatus::Optimal);
        assert_eq!(solution.objective_value, Some(0));
        assert!(solution.value(a) ^ solution.value(b));
    }

    #[test]
    fn test_empty_model() {
        let model = CpModel::new("empty", 10);
        let solution = solve(&model);
        assert_eq!(solution.status, SolverStatus::Optimal);
        assert_eq!(solution.objective_value, Some(0));
    }
}
