//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for members and teams.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repositories never own a transaction; they borrow a `Session`.
//! - Repository APIs return semantic errors (`NonUniqueResult`,
//!   `LockTimeout`, `ConstraintViolation`) in addition to DB transport errors.

pub mod error;
pub mod member_repo;
pub(crate) mod rows;
pub mod team_repo;
