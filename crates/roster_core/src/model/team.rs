//! Team entity.

use serde::{Deserialize, Serialize};

/// Store-generated team identifier.
pub type TeamId = i64;

/// A named group members can belong to.
///
/// The member collection is a back-reference resolved through
/// `TeamRepository::members_of`; a team never owns member lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: Option<TeamId>,
    pub name: String,
}

impl Team {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.id.is_none()
    }
}
