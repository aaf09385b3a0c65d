//! Row-to-entity conversion shared by the session and repositories.

use crate::model::audit::AuditFields;
use crate::model::member::Member;
use crate::model::team::Team;
use crate::repo::error::{RepoError, RepoResult};
use rusqlite::Row;

pub(crate) fn member_from_row(row: &Row<'_>) -> RepoResult<Member> {
    let member = Member {
        id: Some(row.get("id")?),
        username: row.get("username")?,
        age: row.get("age")?,
        team_id: row.get("team_id")?,
        audit: AuditFields {
            created_date: row.get("created_date")?,
            updated_date: row.get("updated_date")?,
            created_by: row.get("created_by")?,
            updated_by: row.get("updated_by")?,
        },
    };
    member.validate().map_err(|err| {
        RepoError::InvalidData(format!(
            "member {} failed validation: {err}",
            member.id.unwrap_or_default()
        ))
    })?;
    Ok(member)
}

/// Reads the join-fetched team columns; `None` for members without a team.
pub(crate) fn fetched_team_from_row(row: &Row<'_>) -> RepoResult<Option<Team>> {
    let id: Option<i64> = row.get("team_ref_id")?;
    match id {
        Some(id) => Ok(Some(Team {
            id: Some(id),
            name: row.get("team_ref_name")?,
        })),
        None => Ok(None),
    }
}

pub(crate) fn team_from_row(row: &Row<'_>) -> RepoResult<Team> {
    Ok(Team {
        id: Some(row.get("id")?),
        name: row.get("name")?,
    })
}
