//! Timetabling engine.
//!
//! One run: snapshot → [`ProblemInstance`] → [`AssembledModel`](super::AssembledModel) → solve →
//! extract. Runs are synchronous and serialized by a run lock; every run
//! builds a fresh model and gets a fresh abort handle, so nothing but the
//! configuration survives between runs.

use std::sync::{Mutex, MutexGuard, TryLockError};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::builder::TimetableModelBuilder;
use super::extract::{extract, ModelSnapshot};
use super::kpi::TimetableKpi;
use crate::config::EngineConfig;
use crate::cp::{AbortHandle, CpSolver, MipSolver, SolverStatus};
use crate::error::{Result, TimetableError};
use crate::instance::{Instance, ProblemInstance};
use crate::models::{ScheduleRecord, ScheduledEvent, Violation};
use crate::store::InstanceSource;

/// Result of one successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleOutcome {
    /// `Optimal`, `Feasible`, or `Unknown` when the time limit ran out after
    /// a solution was found.
    pub status: SolverStatus,
    pub objective_value: Option<i64>,
    pub sessions_total: usize,
    pub sessions_placed: usize,
    /// Events ordered by start minute, activity id, occurrence.
    pub events: Vec<ScheduledEvent>,
    pub violations: Vec<Violation>,
    #[serde(skip)]
    pub model_blob: Vec<u8>,
    pub elapsed_ms: i64,
    pub kpi: TimetableKpi,
}

impl ScheduleOutcome {
    /// Whether the solver proved the timetable optimal.
    pub fn is_optimal(&self) -> bool {
        self.status == SolverStatus::Optimal
    }

    /// Converts the outcome into a persistable record.
    pub fn into_record(self) -> ScheduleRecord {
        ScheduleRecord::new(self.status, self.objective_value, self.model_blob, self.events)
    }
}

/// Runs timetabling passes over instance snapshots.
///
/// # Example
/// ```
/// use u_timetable::instance::Instance;
/// use u_timetable::models::{Activity, Group, Instructor, OpeningWindow, Venue};
/// use u_timetable::{EngineConfig, TimetableEngine};
///
/// let instance = Instance::new()
///     .with_group(Group::new(1))
///     .with_instructor(Instructor::new(1))
///     .with_venue(Venue::new(1))
///     .with_activity(Activity::new(1, 1).with_duration(60))
///     .with_opening_window(OpeningWindow::new("mon", "09:00", "16:30"));
///
/// let engine = TimetableEngine::new(EngineConfig::default());
/// let outcome = engine.solve(instance).unwrap();
/// assert_eq!(outcome.events.len(), 1);
/// assert_eq!(outcome.objective_value, Some(1));
/// ```
pub struct TimetableEngine<S: CpSolver = MipSolver> {
    solver: S,
    config: EngineConfig,
    run_lock: Mutex<()>,
    /// Handle of the current (or last) run.
    abort: Mutex<AbortHandle>,
}

impl TimetableEngine<MipSolver> {
    /// Creates an engine backed by the built-in MIP solver.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_solver(MipSolver::new(), config)
    }
}

impl<S: CpSolver> TimetableEngine<S> {
    pub fn with_solver(solver: S, config: EngineConfig) -> Self {
        Self {
            solver,
            config,
            run_lock: Mutex::new(()),
            abort: Mutex::new(AbortHandle::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Abort handle of the in-flight run.
    ///
    /// Every run installs a new handle once it holds the run lock, before
    /// it reads its snapshot. Outside a run this returns the last run's
    /// handle, and aborting it has no effect on later runs.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Solves one snapshot, waiting for any in-flight run to finish.
    pub fn solve(&self, instance: Instance) -> Result<ScheduleOutcome> {
        let _guard = self.lock();
        let abort = self.start_run();
        self.run_locked(instance, abort)
    }

    /// Solves one snapshot, failing with [`TimetableError::EngineBusy`]
    /// when another run is in flight.
    pub fn try_solve(&self, instance: Instance) -> Result<ScheduleOutcome> {
        let _guard = self.try_lock()?;
        let abort = self.start_run();
        self.run_locked(instance, abort)
    }

    /// Reads a snapshot from `source` and solves it.
    pub fn solve_from(&self, source: &impl InstanceSource) -> Result<ScheduleOutcome> {
        let _guard = self.lock();
        let abort = self.start_run();
        self.run_locked(source.load_instance()?, abort)
    }

    /// Like [`solve_from`](Self::solve_from), but never waits for the lock.
    pub fn try_solve_from(&self, source: &impl InstanceSource) -> Result<ScheduleOutcome> {
        let _guard = self.try_lock()?;
        let abort = self.start_run();
        self.run_locked(source.load_instance()?, abort)
    }

    /// Installs a fresh abort handle. Callers hold the run lock.
    fn start_run(&self) -> AbortHandle {
        let handle = AbortHandle::new();
        *self.abort.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = handle.clone();
        handle
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guarded value is (), so a poisoned lock carries no broken state.
        self.run_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn try_lock(&self) -> Result<MutexGuard<'_, ()>> {
        match self.run_lock.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => Err(TimetableError::EngineBusy),
        }
    }

    fn run_locked(&self, instance: Instance, abort: AbortHandle) -> Result<ScheduleOutcome> {
        let started = Instant::now();
        let problem = ProblemInstance::build(instance)?;
        let assembled = TimetableModelBuilder::from_config(&problem, &self.config).build();

        let solution = self.solver.solve(&assembled.model, &self.config.solver_config(abort));

        let elapsed_ms = started.elapsed().as_millis() as i64;
        match solution.status {
            status if status.is_terminal_failure() => {
                warn!(?status, "solver found no timetable");
                return Err(TimetableError::Infeasible { status });
            }
            SolverStatus::Unknown if !solution.is_solution_found() => {
                warn!(elapsed_ms, "budget exhausted without a solution");
                return Err(TimetableError::BudgetExhausted { elapsed_ms });
            }
            SolverStatus::Unknown => {
                warn!(elapsed_ms, "budget exhausted; keeping best timetable found");
            }
            _ => {}
        }

        let extraction = extract(&problem, &assembled, &solution);
        let status = solution.status;
        let objective_value = solution.objective_value;
        let model_blob = ModelSnapshot::new(assembled, solution).to_blob()?;

        let sessions_total = problem.sessions().len();
        let kpi = TimetableKpi::calculate(&extraction.events, sessions_total, problem.domain().open_minutes());

        info!(
            ?status,
            objective = ?objective_value,
            sessions_total,
            sessions_placed = extraction.events.len(),
            violations = extraction.violations.len(),
            elapsed_ms,
            "timetable run finished"
        );

        Ok(ScheduleOutcome {
            status,
            objective_value,
            sessions_total,
            sessions_placed: extraction.events.len(),
            events: extraction.events,
            violations: extraction.violations,
            model_blob,
            elapsed_ms,
            kpi,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cp::{CpModel, CpSolution, SolverConfig};
    use crate::models::{Activity, Group, Instructor, OpeningWindow, Venue};

    fn scenario_a() -> Instance {
        Instance::new()
            .with_group(Group::new(1))
            .with_instructor(Instructor::new(1))
            .with_venue(Venue::new(1))
            .with_activity(Activity::new(1, 1).with_duration(60))
            .with_opening_window(OpeningWindow::new("mon", "09:00", "16:30"))
    }

    /// Returns a fixed status with no assignment.
    struct FixedSolver(SolverStatus);

    impl CpSolver for FixedSolver {
        fn solve(&self, _model: &CpModel, _config: &SolverConfig) -> CpSolution {
            CpSolution::empty(self.0)
        }
    }

    #[test]
    fn test_solve_scenario_a() {
        let engine = TimetableEngine::new(EngineConfig::default());
        let outcome = engine.solve(scenario_a()).unwrap();

        assert_eq!(outcome.status, SolverStatus::Optimal);
        assert_eq!(outcome.events.len(), 1);
        let event = &outcome.events[0];
        assert!(event.start_minute >= 540 && event.start_minute <= 930);
        assert_eq!(outcome.kpi.sessions_placed, 1);
        assert!(!outcome.model_blob.is_empty());
        assert!(ModelSnapshot::from_blob(&outcome.model_blob).is_ok());
    }

    #[test]
    fn test_infeasible_maps_to_error() {
        let engine = TimetableEngine::with_solver(FixedSolver(SolverStatus::Infeasible), EngineConfig::default());
        assert!(matches!(
            engine.solve(scenario_a()),
            Err(TimetableError::Infeasible {
                status: SolverStatus::Infeasible
            })
        ));
    }

    #[test]
    fn test_unknown_without_solution_is_retryable() {
        let engine = TimetableEngine::with_solver(FixedSolver(SolverStatus::Unknown), EngineConfig::default());
        let err = engine.solve(scenario_a()).unwrap_err();
        assert!(matches!(err, TimetableError::BudgetExhausted { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_validation_error_surfaces() {
        let engine = TimetableEngine::new(EngineConfig::default());
        let instance = scenario_a().with_activity(Activity::new(2, 99));
        assert!(matches!(engine.solve(instance), Err(TimetableError::Validation(_))));
    }

    #[test]
    fn test_try_solve_reports_busy() {
        let engine = TimetableEngine::new(EngineConfig::default());
        let _held = engine.lock();
        assert!(matches!(engine.try_solve(scenario_a()), Err(TimetableError::EngineBusy)));
    }

    /// Reports `Unknown` without a solution when the run was aborted.
    struct AbortAwareSolver;

    impl CpSolver for AbortAwareSolver {
        fn solve(&self, model: &CpModel, config: &SolverConfig) -> CpSolution {
            if config.abort.is_aborted() {
                CpSolution::empty(SolverStatus::Unknown)
            } else {
                MipSolver::new().solve(model, config)
            }
        }
    }

    #[test]
    fn test_abort_after_run_does_not_reach_next_run() {
        let engine = TimetableEngine::with_solver(AbortAwareSolver, EngineConfig::default());
        engine.solve(scenario_a()).unwrap();

        let finished = engine.abort_handle();
        finished.abort();
        assert!(finished.is_aborted());

        let outcome = engine.solve(scenario_a()).unwrap();
        assert_eq!(outcome.events.len(), 1);
        assert!(!engine.abort_handle().is_aborted());
    }

    #[test]
    fn test_each_run_gets_its_own_handle() {
        let engine = TimetableEngine::new(EngineConfig::default());
        let idle = engine.abort_handle();
        engine.solve(scenario_a()).unwrap();
        idle.abort();
        assert!(!engine.abort_handle().is_aborted());
    }

    #[test]
    fn test_record_from_outcome() {
        let engine = TimetableEngine::new(EngineConfig::default());
        let outcome = engine.solve(scenario_a()).unwrap();
        let record = outcome.clone().into_record();
        assert_eq!(record.events, outcome.events);
        assert_eq!(record.objective_value, Some(1));
        assert_eq!(record.model_blob, outcome.model_blob);
    }
}
