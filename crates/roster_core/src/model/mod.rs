//! Roster domain model.
//!
//! # Responsibility
//! - Define the `Member` / `Team` records persisted by the repository layer.
//! - Define read-only projections built directly by queries.
//!
//! # Invariants
//! - Identity is a store-generated surrogate key; `None` means transient.
//! - A member references at most one team; teams do not own members.

pub mod audit;
pub mod dto;
pub mod member;
pub mod team;
