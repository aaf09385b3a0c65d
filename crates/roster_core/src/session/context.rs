//! In-memory persistence context (identity map + change-tracking baselines).

use crate::model::member::{Member, MemberId};
use crate::model::team::{Team, TeamId};
use std::collections::{BTreeMap, BTreeSet};

/// Lifecycle of an entity instance relative to one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// No identity yet.
    Transient,
    /// Tracked by the session; changes are written on flush.
    Managed,
    /// Has an identity but is no longer tracked (after `clear`/`detach`).
    Detached,
    /// Deleted through this session.
    Removed,
}

#[derive(Debug, Clone)]
pub(crate) struct Tracked<T> {
    pub entity: T,
    /// Baseline for dirty checking. `None` for read-only instances.
    pub snapshot: Option<T>,
}

impl<T: Clone> Tracked<T> {
    pub fn new(entity: T, read_only: bool) -> Self {
        let snapshot = if read_only { None } else { Some(entity.clone()) };
        Self { entity, snapshot }
    }
}

#[derive(Debug, Default)]
pub(crate) struct PersistenceContext {
    pub members: BTreeMap<MemberId, Tracked<Member>>,
    pub teams: BTreeMap<TeamId, Tracked<Team>>,
    pub removed_members: BTreeSet<MemberId>,
}

impl PersistenceContext {
    /// Registers a loaded member unless an instance is already managed, in
    /// which case the managed instance wins. Returns the managed copy.
    pub fn merge_member(&mut self, loaded: Member, read_only: bool) -> Option<Member> {
        let id = loaded.id?;
        if self.removed_members.contains(&id) {
            return None;
        }
        let tracked = self
            .members
            .entry(id)
            .or_insert_with(|| Tracked::new(loaded, read_only));
        Some(tracked.entity.clone())
    }

    pub fn merge_team(&mut self, loaded: Team) -> Option<Team> {
        let id = loaded.id?;
        let tracked = self
            .teams
            .entry(id)
            .or_insert_with(|| Tracked::new(loaded, false));
        Some(tracked.entity.clone())
    }

    pub fn member_state(&self, member: &Member) -> EntityState {
        match member.id {
            None => EntityState::Transient,
            Some(id) if self.members.contains_key(&id) => EntityState::Managed,
            Some(id) if self.removed_members.contains(&id) => EntityState::Removed,
            Some(_) => EntityState::Detached,
        }
    }

    pub fn clear(&mut self) -> usize {
        let detached = self.members.len() + self.teams.len();
        self.members.clear();
        self.teams.clear();
        detached
    }
}
