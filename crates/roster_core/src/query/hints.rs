//! Per-query fetch, tracking and locking directives.

/// Associations to join-fetch with the root member rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchGraph {
    pub team: bool,
}

impl FetchGraph {
    /// Associations stay lazy.
    pub fn none() -> Self {
        Self::default()
    }

    /// Loads each member's team in the same statement.
    pub fn team() -> Self {
        Self { team: true }
    }
}

/// Tracking hints for returned entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryHints {
    /// Results are managed without a baseline snapshot and are never
    /// written back on flush.
    pub read_only: bool,
}

impl QueryHints {
    pub fn read_only() -> Self {
        Self { read_only: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockMode {
    #[default]
    None,
    /// Exclusive write lock held until the session ends.
    PessimisticWrite,
}
