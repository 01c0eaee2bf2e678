//! Collaborators at the edges of a run.
//!
//! The engine reads no files or environment itself: snapshots come from an
//! [`InstanceSource`] and results go to a [`ScheduleStore`].

use std::sync::RwLock;

use uuid::Uuid;

use crate::error::{Result, TimetableError};
use crate::instance::Instance;
use crate::models::ScheduleRecord;

/// Supplies the read-only snapshot for one run.
pub trait InstanceSource {
    /// Loads the current instance. Called once per run.
    fn load_instance(&self) -> Result<Instance>;
}

impl InstanceSource for Instance {
    fn load_instance(&self) -> Result<Instance> {
        Ok(self.clone())
    }
}

/// Persists schedule records.
pub trait ScheduleStore {
    fn save(&self, record: &ScheduleRecord) -> Result<()>;

    fn get(&self, id: Uuid) -> Result<Option<ScheduleRecord>>;

    /// Most recently saved record.
    fn latest(&self) -> Result<Option<ScheduleRecord>>;
}

/// A [`ScheduleStore`] keeping records in memory, in save order.
#[derive(Debug, Default)]
pub struct InMemoryScheduleStore {
    records: RwLock<Vec<ScheduleRecord>>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> TimetableError {
    TimetableError::Store("record store lock poisoned".into())
}

impl ScheduleStore for InMemoryScheduleStore {
    fn save(&self, record: &ScheduleRecord) -> Result<()> {
        self.records.write().map_err(poisoned)?.push(record.clone());
        Ok(())
    }

    fn get(&self, id: Uuid) -> Result<Option<ScheduleRecord>> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    fn latest(&self) -> Result<Option<ScheduleRecord>> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.last().cloned())
    }
}
