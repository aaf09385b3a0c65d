//! Query projections.

use crate::model::member::MemberId;
use serde::Serialize;

/// Member row joined with its team's name.
///
/// Built column-by-column by the query layer; never persisted or tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberDto {
    pub id: MemberId,
    pub username: String,
    /// `None` when the member has no team.
    pub team_name: Option<String>,
}

impl MemberDto {
    pub fn new(id: MemberId, username: impl Into<String>, team_name: Option<String>) -> Self {
        Self {
            id,
            username: username.into(),
            team_name,
        }
    }
}
