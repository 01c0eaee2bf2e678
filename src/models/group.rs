//! Group (cohort) model.

use serde::{Deserialize, Serialize};

use super::EntityId;

/// A cohort attending sessions together. A group's own sessions never
/// overlap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Unique group identifier.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Cohort gender, if recorded.
    #[serde(default)]
    pub gender: Option<String>,
    /// Cohort age band, if recorded.
    #[serde(default)]
    pub age_group: Option<String>,
}

impl Group {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            name: String::new(),
            gender: None,
            age_group: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = Some(gender.into());
        self
    }

    pub fn with_age_group(mut self, age_group: impl Into<String>) -> Self {
        self.age_group = Some(age_group.into());
        self
    }
}
