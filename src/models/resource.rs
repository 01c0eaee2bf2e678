//! Resource models.
//!
//! Instructors and venues are unary resources: each hosts at most one
//! session at a time. Sessions pick at most one of each.
//!
//! # Reference
//! Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 1.2

use serde::{Deserialize, Serialize};

use super::EntityId;

/// A person who delivers sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instructor {
    /// Unique instructor identifier.
    pub id: EntityId,
    /// Display name.
    pub name: String,
}

impl Instructor {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            name: String::new(),
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// A place where sessions are held.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    /// Unique venue identifier.
    pub id: EntityId,
    /// Display name.
    pub name: String,
}

impl Venue {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            name: String::new(),
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}
