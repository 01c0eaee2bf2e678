//! Weekly timetabling engine.
//!
//! Places recurring sessions of activities into a one-week horizon of
//! opening windows, booking a venue and an instructor for each, so that no
//! group, venue or instructor is double-booked and as many sessions as
//! possible are placed.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Group`, `Instructor`, `Venue`, `Activity`,
//!   `Session`, `OpeningWindow`, `Restriction`, `Tag`, `ScheduledEvent`
//! - **`validation`**: Input integrity checks (duplicate IDs, references, windows)
//! - **`instance`**: Raw snapshots and their normalized, solver-ready form
//! - **`cp`**: Constraint model and the MIP solver behind it
//! - **`scheduler`**: Model assembly, extraction, engine, service, KPIs
//! - **`store`**: Instance source and schedule store collaborators
//! - **`config`**, **`error`**, **`logging`**: Ambient plumbing
//!
//! # Example
//!
//! ```
//! use u_timetable::instance::Instance;
//! use u_timetable::models::{Activity, Group, Instructor, OpeningWindow, Venue};
//! use u_timetable::{EngineConfig, TimetableEngine};
//!
//! let instance = Instance::new()
//!     .with_group(Group::new(1).with_name("Juniors"))
//!     .with_instructor(Instructor::new(1))
//!     .with_venue(Venue::new(1))
//!     .with_activity(Activity::new(1, 1).with_name("Judo").with_duration(90).with_sessions(2))
//!     .with_opening_window(OpeningWindow::new("weekday", "17:00", "20:00"));
//!
//! let outcome = TimetableEngine::new(EngineConfig::default()).solve(instance).unwrap();
//! assert_eq!(outcome.sessions_placed, 2);
//! ```
//!
//! # References
//!
//! - Schaerf (1999), "A Survey of Automated Timetabling"
//! - Laborie et al. (2018), "IBM ILOG CP Optimizer for Scheduling"

pub mod config;
pub mod cp;
pub mod error;
pub mod instance;
pub mod logging;
pub mod models;
pub mod scheduler;
pub mod store;
pub mod validation;

pub use config::EngineConfig;
pub use error::{Result, TimetableError};
pub use instance::{Instance, ProblemInstance};
pub use scheduler::{RunReport, ScheduleOutcome, SchedulingService, TimetableEngine};
pub use store::{InMemoryScheduleStore, InstanceSource, ScheduleStore};
