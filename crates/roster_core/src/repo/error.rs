//! Repository error taxonomy.
//!
//! # Responsibility
//! - Give callers semantic failures (`NonUniqueResult`, `LockTimeout`, ...)
//!   instead of raw SQLite result codes.
//!
//! # Invariants
//! - SQLite constraint codes always map to `ConstraintViolation`.
//! - SQLite busy/locked codes always map to `LockTimeout`.

use crate::db::DbError;
use crate::model::member::MemberValidationError;
use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for roster persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(MemberValidationError),
    Db(DbError),
    /// Write targeted an entity that is not in storage.
    NotFound { entity: &'static str, id: i64 },
    /// A single-result lookup matched more than one row.
    NonUniqueResult { actual: usize },
    /// Referential-integrity or uniqueness violation, reported at flush/commit.
    ConstraintViolation(String),
    /// Lock wait exceeded the configured busy timeout.
    LockTimeout(String),
    /// A pessimistic lock was requested after a deferred session had
    /// already read; SQLite cannot wait for the lock from that state.
    LockAfterRead,
    /// Declarative query text or predicate cannot be prepared.
    MalformedQuery { query: String, message: String },
    /// Operation requires an entity managed by the current session.
    NotManaged { entity: &'static str, id: i64 },
    /// An entity that already has an identity was passed to `persist`.
    DetachedEntity { entity: &'static str, id: i64 },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Persisted data cannot be converted to a valid entity.
    InvalidData(String),
}

impl RepoError {
    pub(crate) fn malformed(query: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedQuery {
            query: query.into(),
            message: message.into(),
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::NonUniqueResult { actual } => {
                write!(f, "query did not return a unique result: {actual} rows")
            }
            Self::ConstraintViolation(message) => write!(f, "constraint violation: {message}"),
            Self::LockTimeout(message) => write!(f, "lock wait timed out: {message}"),
            Self::LockAfterRead => write!(
                f,
                "pessimistic lock requested after the session already read; begin it with `Session::begin_locking`"
            ),
            Self::MalformedQuery { query, message } => {
                write!(f, "malformed query `{query}`: {message}")
            }
            Self::NotManaged { entity, id } => {
                write!(f, "{entity} {id} is not managed by this session")
            }
            Self::DetachedEntity { entity, id } => {
                write!(f, "{entity} {id} already has an identity; merge it instead")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MemberValidationError> for RepoError {
    fn from(value: MemberValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Sqlite(err) => err.into(),
            other => Self::Db(other),
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        match value.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => Self::ConstraintViolation(value.to_string()),
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                Self::LockTimeout(value.to_string())
            }
            _ => Self::Db(DbError::Sqlite(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RepoError;
    use rusqlite::ffi;

    fn sqlite_failure(code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(ffi::Error::new(code), None)
    }

    #[test]
    fn sqlite_codes_are_classified() {
        assert!(matches!(
            RepoError::from(sqlite_failure(ffi::SQLITE_BUSY)),
            RepoError::LockTimeout(_)
        ));
        assert!(matches!(
            RepoError::from(sqlite_failure(ffi::SQLITE_CONSTRAINT_FOREIGNKEY)),
            RepoError::ConstraintViolation(_)
        ));
        assert!(matches!(
            RepoError::from(sqlite_failure(ffi::SQLITE_IOERR)),
            RepoError::Db(_)
        ));
    }
}
