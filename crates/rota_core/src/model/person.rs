//! Roster member model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque person identifier owned by the roster.
pub type PersonId = String;

/// One member of the rotation pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub display_name: String,
    /// Whether this person takes part in the next rotation cycle.
    pub available: bool,
    /// Free-form preferences. Stored and returned, never consulted by planning.
    #[serde(default)]
    pub preferences: BTreeMap<String, String>,
}

impl Person {
    /// Creates an available person with no preferences.
    pub fn new(id: impl Into<PersonId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            available: true,
            preferences: BTreeMap::new(),
        }
    }

    /// Builder-style toggle used by roster imports and tests.
    pub fn with_availability(mut self, available: bool) -> Self {
        self.available = available;
        self
    }
}
