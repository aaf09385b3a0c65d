//! Core persistence logic for the member/team roster.
//! This crate is the single source of truth for roster invariants: entity
//! lifecycle, change tracking, declarative lookups and paging.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod page;
pub mod query;
pub mod repo;
pub mod service;
pub mod session;

pub use config::{ConfigError, StoreConfig};
pub use db::{open_db, open_db_in_memory, open_db_in_memory_with, open_db_with, DbError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::audit::AuditFields;
pub use model::dto::MemberDto;
pub use model::member::{Member, MemberId, MemberValidationError};
pub use model::team::{Team, TeamId};
pub use page::{Page, PageRequest, PageRequestError, Slice};
pub use query::{
    Direction, FetchGraph, LockMode, MemberField, MemberFilter, NamedQuery, QueryHints,
    QueryParam, Sort,
};
pub use repo::error::{RepoError, RepoResult};
pub use repo::member_repo::{MemberRepository, SqliteMemberRepository};
pub use repo::team_repo::{SqliteTeamRepository, TeamRepository};
pub use service::roster_service::{RosterResult, RosterService, RosterServiceError};
pub use session::audit::AuditHooks;
pub use session::{transaction, transaction_with, ClearMode, EntityState, Session};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
