//! CP solver interface.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::model::CpModel;
use super::variables::{BoolVarId, IntVarId, IntervalId, Literal};

/// Status of the solver after execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverStatus {
    /// Proven optimal solution found.
    Optimal,
    /// Feasible (but not necessarily optimal) solution found.
    Feasible,
    /// No feasible solution exists.
    Infeasible,
    /// Model is invalid or malformed.
    ModelInvalid,
    /// Time limit expired or the solve was aborted before a proof.
    /// May still carry the best solution found.
    Unknown,
}

impl SolverStatus {
    /// Whether the status ends the run without any usable output.
    pub fn is_terminal_failure(self) -> bool {
        matches!(self, SolverStatus::Infeasible | SolverStatus::ModelInvalid)
    }
}

/// Solution from a CP solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpSolution {
    /// Solver status.
    pub status: SolverStatus,
    /// Objective value of the returned assignment, in the model's own sense.
    pub objective_value: Option<i64>,
    /// Value of every boolean variable (empty when no solution).
    pub bool_values: Vec<bool>,
    /// Value of every integer variable (empty when no solution).
    pub int_values: Vec<i64>,
    /// Solve time in milliseconds.
    pub solve_time_ms: i64,
}

impl CpSolution {
    /// Creates an empty solution with the given status.
    pub fn empty(status: SolverStatus) -> Self {
        Self {
            status,
            objective_value: None,
            bool_values: Vec::new(),
            int_values: Vec::new(),
            solve_time_ms: 0,
        }
    }

    /// Whether variable values are available.
    pub fn is_solution_found(&self) -> bool {
        match self.status {
            SolverStatus::Optimal | SolverStatus::Feasible => true,
            SolverStatus::Unknown => !self.bool_values.is_empty() || !self.int_values.is_empty(),
            SolverStatus::Infeasible | SolverStatus::ModelInvalid => false,
        }
    }

    /// Value of a boolean variable. `false` when no solution was found.
    pub fn value(&self, var: BoolVarId) -> bool {
        self.bool_values.get(var.0).copied().unwrap_or(false)
    }

    /// Truth value of a literal.
    pub fn literal_value(&self, literal: Literal) -> bool {
        literal.eval(self.value(literal.var))
    }

    /// Value of an integer variable.
    pub fn int_value(&self, var: IntVarId) -> Option<i64> {
        self.int_values.get(var.0).copied()
    }

    /// Whether an interval is present in the solution.
    pub fn is_present(&self, model: &CpModel, interval: IntervalId) -> bool {
        match model.interval(interval).presence {
            None => self.is_solution_found(),
            Some(p) => self.literal_value(p),
        }
    }

    /// `(start, end)` of an interval, when it is present.
    pub fn interval_bounds(&self, model: &CpModel, interval: IntervalId) -> Option<(i64, i64)> {
        if !self.is_present(model, interval) {
            return None;
        }
        let iv = model.interval(interval);
        self.int_value(iv.start).map(|s| (s, iv.end_for(s)))
    }
}

/// Cooperative cancellation flag shared between a caller and a running solve.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the running solve to stop at its next check.
    pub fn abort(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Solver configuration.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Maximum solve time in milliseconds.
    pub time_limit_ms: u64,
    /// Emit debug events describing the solve.
    pub log_search_progress: bool,
    /// External stop request.
    pub abort: AbortHandle,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_limit_ms: 60_000,
            log_search_progress: false,
            abort: AbortHandle::new(),
        }
    }
}

impl SolverConfig {
    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = ms;
        self
    }

    pub fn with_abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }
}

/// Trait for CP solver implementations.
///
/// Implementors provide the actual constraint solving logic. This can wrap
/// an external engine or run an in-process search.
pub trait CpSolver {
    /// Solves the model and returns a solution.
    fn solve(&self, model: &CpModel, config: &SolverConfig) -> CpSolution;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cp::Domain;

    #[test]
    fn test_solver_config_default() {
        let config = SolverConfig::default();
        assert_eq!(config.time_limit_ms, 60_000);
        assert!(!config.abort.is_aborted());
    }

    #[test]
    fn test_abort_handle_is_shared() {
        let handle = AbortHandle::new();
        let config = SolverConfig::default().with_abort_handle(handle.clone());
        assert!(!config.abort.is_aborted());
        handle.abort();
        assert!(config.abort.is_aborted());
        assert!(!AbortHandle::new().is_aborted());
    }

    #[test]
    fn test_empty_solution() {
        let s = CpSolution::empty(SolverStatus::Infeasible);
        assert!(!s.is_solution_found());
        assert!(!s.value(BoolVarId(0)));
        assert_eq!(s.int_value(IntVarId(0)), None);
        assert!(SolverStatus::Infeasible.is_terminal_failure());
        assert!(!SolverStatus::Unknown.is_terminal_failure());
    }

    #[test]
    fn test_interval_bounds() {
        let mut model = CpModel::new("t", 100);
        let p = model.new_bool_var("p");
        let s = model.new_int_var("s", Domain::from_ranges(&[(0, 50)]));
        let iv = model.new_optional_interval("iv", s, 20, p.lit());

        let mut sol = CpSolution::empty(SolverStatus::Feasible);
        sol.bool_values = vec![true];
        sol.int_values = vec![15];
        assert_eq!(sol.interval_bounds(&model, iv), Some((15, 35)));

        sol.bool_values = vec![false];
        assert_eq!(sol.interval_bounds(&model, iv), None);
    }
}
