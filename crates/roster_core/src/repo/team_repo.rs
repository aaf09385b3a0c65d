//! Team repository contracts and SQLite implementation.
//!
//! # Invariants
//! - `members_of` is a read of the member side; teams hold no member list.

use crate::model::member::Member;
use crate::model::team::{Team, TeamId};
use crate::query::hints::{FetchGraph, QueryHints};
use crate::query::select::MemberSelect;
use crate::query::{MemberFilter, Sort};
use crate::repo::error::{RepoError, RepoResult};
use crate::session::Session;
use rusqlite::types::Value;

/// Repository interface for team operations.
pub trait TeamRepository {
    fn save(&self, team: Team) -> RepoResult<Team>;
    fn find_by_id(&self, id: TeamId) -> RepoResult<Option<Team>>;
    fn find_all(&self) -> RepoResult<Vec<Team>>;
    fn find_by_name(&self, name: &str) -> RepoResult<Vec<Team>>;
    /// Back-reference collection: members whose team is `id`.
    fn members_of(&self, id: TeamId) -> RepoResult<Vec<Member>>;
    fn count(&self) -> RepoResult<u64>;
}

/// SQLite-backed team repository bound to one session.
pub struct SqliteTeamRepository<'s, 'conn> {
    session: &'s Session<'conn>,
}

impl<'s, 'conn> SqliteTeamRepository<'s, 'conn> {
    pub fn new(session: &'s Session<'conn>) -> Self {
        Self { session }
    }
}

impl TeamRepository for SqliteTeamRepository<'_, '_> {
    fn save(&self, team: Team) -> RepoResult<Team> {
        let id = match team.id {
            None => self.session.persist_team(team)?,
            Some(id) => {
                self.session
                    .find_team(id)?
                    .ok_or(RepoError::NotFound { entity: "team", id })?;
                return self
                    .session
                    .update_team(id, |managed| managed.name = team.name);
            }
        };
        self.session
            .find_team(id)?
            .ok_or(RepoError::NotManaged { entity: "team", id })
    }

    fn find_by_id(&self, id: TeamId) -> RepoResult<Option<Team>> {
        self.session.find_team(id)
    }

    fn find_all(&self) -> RepoResult<Vec<Team>> {
        self.session
            .load_teams("SELECT id, name FROM team ORDER BY id ASC;", Vec::new())
    }

    fn find_by_name(&self, name: &str) -> RepoResult<Vec<Team>> {
        self.session.load_teams(
            "SELECT id, name FROM team WHERE name = ?1 ORDER BY id ASC;",
            vec![Value::Text(name.to_string())],
        )
    }

    fn members_of(&self, id: TeamId) -> RepoResult<Vec<Member>> {
        let filter = MemberFilter::all().and_team(id);
        let (sql, binds) = MemberSelect::new(&filter)
            .sorted(&Sort::unsorted())
            .content_sql();
        self.session
            .load_members(&sql, binds, FetchGraph::none(), QueryHints::default())
    }

    fn count(&self) -> RepoResult<u64> {
        self.session.count("SELECT COUNT(*) FROM team;", Vec::new())
    }
}
