//! Engine configuration.
//!
//! Plain serde document with defaults for every field, so a partial JSON
//! object (or `{}`) is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::cp::{AbortHandle, SolverConfig};
use crate::error::{Result, TimetableError};

/// Configuration for a [`TimetableEngine`](crate::scheduler::TimetableEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Wall-clock budget per run (ms).
    pub time_limit_ms: u64,
    /// A placed session must book a venue.
    pub require_venue: bool,
    /// A placed session must book an instructor.
    pub require_instructor: bool,
    /// Log the size of the solver encoding at debug level.
    pub log_search_progress: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            time_limit_ms: 60_000,
            require_venue: true,
            require_instructor: true,
            log_search_progress: false,
        }
    }
}

impl EngineConfig {
    /// Parses a JSON configuration document.
    ///
    /// # Example
    /// ```
    /// use u_timetable::EngineConfig;
    ///
    /// let config = EngineConfig::from_json_str(r#"{"time_limit_ms": 5000, "require_venue": false}"#).unwrap();
    /// assert_eq!(config.time_limit_ms, 5000);
    /// assert!(!config.require_venue);
    /// assert!(config.require_instructor);
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| TimetableError::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = ms;
        self
    }

    /// Sets whether placed sessions must book a venue and an instructor.
    pub fn with_required_resources(mut self, venue: bool, instructor: bool) -> Self {
        self.require_venue = venue;
        self.require_instructor = instructor;
        self
    }

    fn check(&self) -> Result<()> {
        if self.time_limit_ms == 0 {
            return Err(TimetableError::Config("time_limit_ms must be positive".into()));
        }
        Ok(())
    }

    /// Solver settings for one run.
    pub fn solver_config(&self, abort: AbortHandle) -> SolverConfig {
        let mut config = SolverConfig::default()
            .with_time_limit_ms(self.time_limit_ms)
            .with_abort_handle(abort);
        config.log_search_progress = self.log_search_progress;
        config
    }
}
