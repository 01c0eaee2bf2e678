//! Timetable model assembly, solving and extraction.
//!
//! # Pipeline
//!
//! 1. [`TimetableModelBuilder`] turns a
//!    [`ProblemInstance`](crate::instance::ProblemInstance) into a CP model
//! 2. a [`CpSolver`](crate::cp::CpSolver) solves it under the configured budget
//! 3. [`extract`] reads events and violations back from the solution
//! 4. [`SchedulingService`] persists the result as a
//!    [`ScheduleRecord`](crate::models::ScheduleRecord)
//!
//! [`TimetableEngine`] drives steps 1 to 3 and serializes runs.
//!
//! # KPI
//!
//! [`TimetableKpi`] summarizes a run: placement rate, venue utilization,
//! instructor and group load.
//!
//! # References
//!
//! - Schaerf (1999), "A Survey of Automated Timetabling"
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 1

mod builder;
mod engine;
mod extract;
mod kpi;
mod service;

pub use builder::{AssembledModel, PenaltyVar, ResourceChoice, SessionVars, TimetableModelBuilder};
pub use engine::{ScheduleOutcome, TimetableEngine};
pub use extract::{extract, Extraction, ModelSnapshot};
pub use kpi::TimetableKpi;
pub use service::{RunReport, SchedulingService};
