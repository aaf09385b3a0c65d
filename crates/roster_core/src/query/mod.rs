//! Query building for the repository layer.
//!
//! # Responsibility
//! - Turn explicit predicate/sort/fetch specifications into parameterized SQL.
//! - Parse declarative named-parameter queries once, failing fast on bad text.
//!
//! # Invariants
//! - User-supplied values are always bound, never spliced into SQL text.
//! - Content and count statements built from one filter share its predicate.

pub mod filter;
pub mod hints;
pub mod named;
pub mod select;
pub mod sort;

pub use filter::MemberFilter;
pub use hints::{FetchGraph, LockMode, QueryHints};
pub use named::{NamedQuery, QueryParam};
pub use sort::{Direction, MemberField, Order, Sort};
