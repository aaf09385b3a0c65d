//! Member entity.
//!
//! # Responsibility
//! - Define the canonical member record and its mutation helpers.
//! - Validate field-level invariants before persistence.
//!
//! # Invariants
//! - `username` is never blank.
//! - `age` is never negative.
//! - `team_id`, when set, names a team that already has an identity.

use crate::model::audit::AuditFields;
use crate::model::team::{Team, TeamId};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-generated member identifier.
pub type MemberId = i64;

/// Field-level validation failure for `Member`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberValidationError {
    BlankUsername,
    NegativeAge(i32),
    /// The team passed to `change_team` has not been persisted yet.
    TransientTeam,
}

impl Display for MemberValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankUsername => write!(f, "member username cannot be blank"),
            Self::NegativeAge(age) => write!(f, "member age cannot be negative, got {age}"),
            Self::TransientTeam => write!(f, "team must be persisted before members can join it"),
        }
    }
}

impl Error for MemberValidationError {}

/// A person on the roster, optionally belonging to a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: Option<MemberId>,
    pub username: String,
    pub age: i32,
    /// Lazily resolved many-to-one association.
    pub team_id: Option<TeamId>,
    pub audit: AuditFields,
}

impl Member {
    /// Creates a transient member with age `0` and no team.
    pub fn new(username: impl Into<String>) -> Self {
        Self::with_age(username, 0)
    }

    pub fn with_age(username: impl Into<String>, age: i32) -> Self {
        Self {
            id: None,
            username: username.into(),
            age,
            team_id: None,
            audit: AuditFields::default(),
        }
    }

    /// Creates a transient member already attached to a persisted team.
    pub fn with_team(
        username: impl Into<String>,
        age: i32,
        team: &Team,
    ) -> Result<Self, MemberValidationError> {
        let mut member = Self::with_age(username, age);
        member.change_team(team)?;
        Ok(member)
    }

    pub fn change_username(&mut self, username: impl Into<String>) {
        self.username = username.into();
    }

    /// Points this member at `team`.
    pub fn change_team(&mut self, team: &Team) -> Result<(), MemberValidationError> {
        let team_id = team.id.ok_or(MemberValidationError::TransientTeam)?;
        self.team_id = Some(team_id);
        Ok(())
    }

    pub fn leave_team(&mut self) {
        self.team_id = None;
    }

    pub fn is_transient(&self) -> bool {
        self.id.is_none()
    }

    /// Checks field invariants. Called by every write path.
    pub fn validate(&self) -> Result<(), MemberValidationError> {
        if self.username.trim().is_empty() {
            return Err(MemberValidationError::BlankUsername);
        }
        if self.age < 0 {
            return Err(MemberValidationError::NegativeAge(self.age));
        }
        Ok(())
    }

    /// Compares the persistent columns, ignoring audit metadata.
    pub(crate) fn same_state(&self, other: &Member) -> bool {
        self.username == other.username && self.age == other.age && self.team_id == other.team_id
    }
}
