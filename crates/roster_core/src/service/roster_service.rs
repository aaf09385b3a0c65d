//! Roster use-case service.
//!
//! # Responsibility
//! - Provide member/team entry points for CLI callers.
//! - Delegate persistence to repository implementations.
//!
//! # Invariants
//! - Service APIs never bypass repository validation/persistence contracts.
//! - Bulk age updates always clear the persistence context afterwards.

use crate::model::dto::MemberDto;
use crate::model::member::{Member, MemberId, MemberValidationError};
use crate::model::team::{Team, TeamId};
use crate::page::{Page, PageRequest, PageRequestError};
use crate::query::sort::{Direction, MemberField, Sort};
use crate::repo::error::RepoError;
use crate::repo::member_repo::MemberRepository;
use crate::repo::team_repo::TeamRepository;
use crate::session::ClearMode;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for roster use-cases.
#[derive(Debug)]
pub enum RosterServiceError {
    MemberNotFound(MemberId),
    TeamNotFound(TeamId),
    InvalidPageRequest(PageRequestError),
    Repo(RepoError),
}

impl Display for RosterServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MemberNotFound(id) => write!(f, "member not found: {id}"),
            Self::TeamNotFound(id) => write!(f, "team not found: {id}"),
            Self::InvalidPageRequest(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RosterServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidPageRequest(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for RosterServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                entity: "member",
                id,
            } => Self::MemberNotFound(id),
            RepoError::NotFound { entity: "team", id } => Self::TeamNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<MemberValidationError> for RosterServiceError {
    fn from(value: MemberValidationError) -> Self {
        Self::Repo(RepoError::Validation(value))
    }
}

impl From<PageRequestError> for RosterServiceError {
    fn from(value: PageRequestError) -> Self {
        Self::InvalidPageRequest(value)
    }
}

pub type RosterResult<T> = Result<T, RosterServiceError>;

/// Use-case facade over member and team repositories.
pub struct RosterService<M: MemberRepository, T: TeamRepository> {
    members: M,
    teams: T,
}

impl<M: MemberRepository, T: TeamRepository> RosterService<M, T> {
    pub fn new(members: M, teams: T) -> Self {
        Self { members, teams }
    }

    /// Registers a new member without a team.
    pub fn register_member(&self, username: impl Into<String>, age: i32) -> RosterResult<Member> {
        Ok(self.members.save(Member::with_age(username, age))?)
    }

    pub fn create_team(&self, name: impl Into<String>) -> RosterResult<Team> {
        Ok(self.teams.save(Team::new(name))?)
    }

    /// Moves a member into a team. The change is written on the next flush.
    pub fn assign_team(&self, member_id: MemberId, team_id: TeamId) -> RosterResult<Member> {
        let team = self
            .teams
            .find_by_id(team_id)?
            .ok_or(RosterServiceError::TeamNotFound(team_id))?;
        let mut member = self
            .members
            .find_by_id(member_id)?
            .ok_or(RosterServiceError::MemberNotFound(member_id))?;
        member.change_team(&team)?;
        Ok(self.members.save(member)?)
    }

    pub fn rename_member(&self, member_id: MemberId, username: &str) -> RosterResult<Member> {
        let mut member = self
            .members
            .find_by_id(member_id)?
            .ok_or(RosterServiceError::MemberNotFound(member_id))?;
        member.change_username(username);
        Ok(self.members.save(member)?)
    }

    /// Ages every member at least `age` old by one year.
    pub fn age_up_from(&self, age: i32) -> RosterResult<usize> {
        Ok(self
            .members
            .bulk_age_plus(age, ClearMode::ClearAutomatically)?)
    }

    /// One page of members with the given age, sorted by username
    /// descending, exposed as projections instead of entities.
    pub fn member_page(&self, age: i32, page: u64, size: u64) -> RosterResult<Page<MemberDto>> {
        let request =
            PageRequest::of_sorted(page, size, Sort::by(Direction::Desc, MemberField::Username))?;
        let members = self.members.find_by_age(age, &request)?;

        let mut team_names = Vec::with_capacity(members.number_of_elements());
        for member in members.content() {
            let name = match member.team_id {
                Some(team_id) => self.teams.find_by_id(team_id)?.map(|team| team.name),
                None => None,
            };
            team_names.push(name);
        }

        let mut team_names = team_names.into_iter();
        Ok(members.map(|member| {
            MemberDto::new(
                member.id.unwrap_or_default(),
                member.username,
                team_names.next().flatten(),
            )
        }))
    }

    pub fn members(&self) -> &M {
        &self.members
    }

    pub fn teams(&self) -> &T {
        &self.teams
    }
}
