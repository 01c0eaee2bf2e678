//! Scheduling service: the parameterless trigger.
//!
//! Wires an [`InstanceSource`], a [`TimetableEngine`] and a
//! [`ScheduleStore`]: read the snapshot, solve, persist the record.

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::engine::{ScheduleOutcome, TimetableEngine};
use super::kpi::TimetableKpi;
use crate::config::EngineConfig;
use crate::cp::{AbortHandle, CpSolver, MipSolver, SolverStatus};
use crate::error::Result;
use crate::models::{ScheduleRecord, Violation};
use crate::store::{InstanceSource, ScheduleStore};

/// Summary of one persisted run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Id of the stored [`ScheduleRecord`](crate::models::ScheduleRecord).
    pub record_id: Uuid,
    pub status: SolverStatus,
    pub objective_value: Option<i64>,
    pub sessions_total: usize,
    pub sessions_placed: usize,
    pub violations: Vec<Violation>,
    pub elapsed_ms: i64,
    pub kpi: TimetableKpi,
}

/// Triggers timetabling runs and stores their results.
///
/// # Example
/// ```
/// use u_timetable::instance::Instance;
/// use u_timetable::models::{Activity, Group, Instructor, OpeningWindow, Venue};
/// use u_timetable::{EngineConfig, InMemoryScheduleStore, ScheduleStore, SchedulingService};
///
/// let instance = Instance::new()
///     .with_group(Group::new(1))
///     .with_instructor(Instructor::new(1))
///     .with_venue(Venue::new(1))
///     .with_activity(Activity::new(1, 1))
///     .with_opening_window(OpeningWindow::new("tue", "18:00", "20:00"));
///
/// let service = SchedulingService::new(instance, InMemoryScheduleStore::new(), EngineConfig::default());
/// let report = service.run_now().unwrap();
/// let record = service.store().get(report.record_id).unwrap().unwrap();
/// assert_eq!(record.events.len(), 1);
/// ```
pub struct SchedulingService<Src, St, S: CpSolver = MipSolver> {
    source: Src,
    store: St,
    engine: TimetableEngine<S>,
}

impl<Src: InstanceSource, St: ScheduleStore> SchedulingService<Src, St> {
    pub fn new(source: Src, store: St, config: EngineConfig) -> Self {
        Self::with_engine(source, store, TimetableEngine::new(config))
    }
}

impl<Src: InstanceSource, St: ScheduleStore, S: CpSolver> SchedulingService<Src, St, S> {
    pub fn with_engine(source: Src, store: St, engine: TimetableEngine<S>) -> Self {
        Self { source, store, engine }
    }

    /// Runs one pass, waiting for any in-flight run to finish first.
    pub fn run_now(&self) -> Result<RunReport> {
        let outcome = self.engine.solve_from(&self.source)?;
        self.persist(outcome)
    }

    /// Runs one pass, or fails with
    /// [`TimetableError::EngineBusy`](crate::TimetableError::EngineBusy)
    /// when a run is already in flight.
    pub fn try_run_now(&self) -> Result<RunReport> {
        let outcome = self.engine.try_solve_from(&self.source)?;
        self.persist(outcome)
    }

    /// Abort handle of the in-flight run; see
    /// [`TimetableEngine::abort_handle`].
    pub fn abort_handle(&self) -> AbortHandle {
        self.engine.abort_handle()
    }

    pub fn source(&self) -> &Src {
        &self.source
    }

    pub fn store(&self) -> &St {
        &self.store
    }

    pub fn engine(&self) -> &TimetableEngine<S> {
        &self.engine
    }

    fn persist(&self, outcome: ScheduleOutcome) -> Result<RunReport> {
        let ScheduleOutcome {
            status,
            objective_value,
            sessions_total,
            sessions_placed,
            events,
            violations,
            model_blob,
            elapsed_ms,
            kpi,
        } = outcome;
        let record = ScheduleRecord::new(status, objective_value, model_blob, events);
        self.store.save(&record)?;
        info!(record_id = %record.id, events = record.events.len(), "schedule record saved");

        Ok(RunReport {
            record_id: record.id,
            status,
            objective_value,
            sessions_total,
            sessions_placed,
            violations,
            elapsed_ms,
            kpi,
        })
    }
}
