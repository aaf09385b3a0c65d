//! Unit of work over one SQLite transaction.
//!
//! # Responsibility
//! - Own the transaction boundary and the in-memory persistence context.
//! - Write pending entity changes on flush via snapshot dirty checking.
//! - Route repository statements so they are counted and auto-flushed.
//!
//! # Invariants
//! - At most one managed instance per entity id; a managed instance wins
//!   over freshly read row contents until `clear`/`detach`.
//! - Read-only instances are never written back.
//! - A session that is dropped without `commit` rolls back.
//! - Bulk statements bypass the context; `ClearMode::ClearAutomatically`
//!   detaches everything right after they run.
//! - No context borrow outlives a public call; entity edits go through
//!   `update_member` / `update_team`.
//! - A pessimistic lock is only taken while the session has not yet read
//!   under a deferred transaction; `begin_locking` holds it from the start.

pub mod audit;
pub mod context;

use crate::config::StoreConfig;
use crate::db::migrations::{current_user_version, latest_version};
use crate::model::member::{Member, MemberId};
use crate::model::team::{Team, TeamId};
use crate::query::hints::{FetchGraph, QueryHints};
use crate::query::select::MEMBER_COLUMNS;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::rows::{fetched_team_from_row, member_from_row, team_from_row};
use audit::AuditHooks;
use context::{PersistenceContext, Tracked};
use log::{debug, error, info, warn};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, CachedStatement, Connection, Params, Transaction, TransactionBehavior,
};
use std::cell::{Cell, RefCell};
use std::time::Instant;

pub use context::EntityState;

/// Whether a bulk statement detaches all managed instances afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClearMode {
    /// Managed instances keep their pre-update values.
    #[default]
    Keep,
    ClearAutomatically,
}

/// One transaction plus its persistence context.
pub struct Session<'conn> {
    tx: Transaction<'conn>,
    context: RefCell<PersistenceContext>,
    hooks: AuditHooks,
    statements: Cell<u64>,
    /// Set once the transaction holds the store write lock.
    write_locked: Cell<bool>,
    has_read: Cell<bool>,
    started_at: Instant,
}

impl<'conn> Session<'conn> {
    /// Begins a session with default config.
    pub fn begin(conn: &'conn mut Connection) -> RepoResult<Self> {
        Self::begin_with(conn, &StoreConfig::default())
    }

    /// Begins a deferred transaction on a migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when migrations have not been applied.
    pub fn begin_with(conn: &'conn mut Connection, config: &StoreConfig) -> RepoResult<Self> {
        Self::begin_with_behavior(conn, config, TransactionBehavior::Deferred)
    }

    /// Begins an immediate transaction that holds the store write lock until
    /// commit or rollback. Waits up to the busy timeout for a current holder.
    ///
    /// # Errors
    /// - `LockTimeout` when the lock is still held after the busy timeout.
    pub fn begin_locking(conn: &'conn mut Connection, config: &StoreConfig) -> RepoResult<Self> {
        let started_at = Instant::now();
        match Self::begin_with_behavior(conn, config, TransactionBehavior::Immediate) {
            Ok(session) => {
                debug!(
                    "event=lock_acquire module=session status=ok mode=immediate wait_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(session)
            }
            Err(err) => {
                warn!(
                    "event=lock_acquire module=session status=error mode=immediate wait_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                Err(err)
            }
        }
    }

    fn begin_with_behavior(
        conn: &'conn mut Connection,
        config: &StoreConfig,
        behavior: TransactionBehavior,
    ) -> RepoResult<Self> {
        ensure_migrated(conn)?;
        let write_locked = !matches!(behavior, TransactionBehavior::Deferred);
        let tx = conn.transaction_with_behavior(behavior)?;
        debug!("event=session_begin module=session status=ok write_locked={write_locked}");
        Ok(Self {
            tx,
            context: RefCell::new(PersistenceContext::default()),
            hooks: AuditHooks::new(config.auditor.clone()),
            statements: Cell::new(0),
            write_locked: Cell::new(write_locked),
            has_read: Cell::new(false),
            started_at: Instant::now(),
        })
    }

    pub fn with_audit_hooks(mut self, hooks: AuditHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Raw connection inside this transaction. Statements issued here are
    /// neither counted nor reflected in the persistence context.
    pub fn connection(&self) -> &Connection {
        &self.tx
    }

    /// Number of statements this session sent to SQLite.
    pub fn statement_count(&self) -> u64 {
        self.statements.get()
    }

    /// Inserts a transient member and starts tracking it.
    ///
    /// # Errors
    /// - `DetachedEntity` when the member already has an identity.
    /// - `Validation` when field invariants fail.
    pub fn persist_member(&self, mut member: Member) -> RepoResult<MemberId> {
        if let Some(id) = member.id {
            return Err(RepoError::DetachedEntity {
                entity: "member",
                id,
            });
        }
        member.validate()?;
        self.hooks.pre_insert(&mut member);

        self.execute_write(
            "INSERT INTO member (
                username,
                age,
                team_id,
                created_date,
                updated_date,
                created_by,
                updated_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                member.username.as_str(),
                member.age,
                member.team_id,
                member.audit.created_date,
                member.audit.updated_date,
                member.audit.created_by.as_deref(),
                member.audit.updated_by.as_deref(),
            ],
        )?;

        let id = self.tx.last_insert_rowid();
        member.id = Some(id);
        self.context
            .borrow_mut()
            .members
            .insert(id, Tracked::new(member, false));
        Ok(id)
    }

    /// Inserts a transient team and starts tracking it.
    pub fn persist_team(&self, mut team: Team) -> RepoResult<TeamId> {
        if let Some(id) = team.id {
            return Err(RepoError::DetachedEntity { entity: "team", id });
        }
        self.execute_write("INSERT INTO team (name) VALUES (?1);", [team.name.as_str()])?;

        let id = self.tx.last_insert_rowid();
        team.id = Some(id);
        self.context
            .borrow_mut()
            .teams
            .insert(id, Tracked::new(team, false));
        Ok(id)
    }

    /// Copies the state of a detached member onto its managed instance,
    /// loading it first when needed. Returns the managed copy.
    pub fn merge_member(&self, detached: Member) -> RepoResult<Member> {
        let id = match detached.id {
            Some(id) => id,
            None => {
                let id = self.persist_member(detached)?;
                return self.managed_member(id);
            }
        };
        detached.validate()?;
        if !self.contains_member(id) && self.find_member(id)?.is_none() {
            return Err(RepoError::NotFound {
                entity: "member",
                id,
            });
        }

        let mut context = self.context.borrow_mut();
        let tracked = context.members.get_mut(&id).ok_or(RepoError::NotManaged {
            entity: "member",
            id,
        })?;
        tracked.entity.username = detached.username;
        tracked.entity.age = detached.age;
        tracked.entity.team_id = detached.team_id;
        Ok(tracked.entity.clone())
    }

    /// Looks a member up in the context first, then in storage.
    pub fn find_member(&self, id: MemberId) -> RepoResult<Option<Member>> {
        {
            let context = self.context.borrow();
            if let Some(tracked) = context.members.get(&id) {
                return Ok(Some(tracked.entity.clone()));
            }
            if context.removed_members.contains(&id) {
                return Ok(None);
            }
        }

        let sql = format!("SELECT {MEMBER_COLUMNS} FROM member m WHERE m.id = ?1;");
        let loaded = self.load_members(
            &sql,
            vec![Value::Integer(id)],
            FetchGraph::none(),
            QueryHints::default(),
        )?;
        Ok(loaded.into_iter().next())
    }

    /// Looks a team up in the context first, then in storage.
    pub fn find_team(&self, id: TeamId) -> RepoResult<Option<Team>> {
        if let Some(tracked) = self.context.borrow().teams.get(&id) {
            return Ok(Some(tracked.entity.clone()));
        }

        self.flush()?;
        let mut stmt = self.read_statement("SELECT id, name FROM team WHERE id = ?1;")?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            let team = team_from_row(row)?;
            return Ok(self.context.borrow_mut().merge_team(team));
        }

        Ok(None)
    }

    /// Resolves a member's lazily-loaded team. No statement is issued when
    /// the team is already in the context (e.g. join-fetched).
    pub fn team_of(&self, member: &Member) -> RepoResult<Option<Team>> {
        match member.team_id {
            Some(team_id) => self.find_team(team_id),
            None => Ok(None),
        }
    }

    /// Applies `edit` to a managed member; the change is written on flush.
    /// Identity and audit columns are not editable this way. `edit` runs on
    /// a copy, so it may call back into the session.
    ///
    /// # Errors
    /// - `NotManaged` when `id` is not (or no longer) managed.
    pub fn update_member<F>(&self, id: MemberId, edit: F) -> RepoResult<Member>
    where
        F: FnOnce(&mut Member),
    {
        let mut edited = self.managed_member(id)?;
        edit(&mut edited);

        let mut context = self.context.borrow_mut();
        let tracked = context.members.get_mut(&id).ok_or(RepoError::NotManaged {
            entity: "member",
            id,
        })?;
        tracked.entity.username = edited.username;
        tracked.entity.age = edited.age;
        tracked.entity.team_id = edited.team_id;
        Ok(tracked.entity.clone())
    }

    /// Applies `edit` to a managed team; the change is written on flush.
    pub fn update_team<F>(&self, id: TeamId, edit: F) -> RepoResult<Team>
    where
        F: FnOnce(&mut Team),
    {
        let not_managed = RepoError::NotManaged { entity: "team", id };
        let mut edited = match self.context.borrow().teams.get(&id) {
            Some(tracked) => tracked.entity.clone(),
            None => return Err(not_managed),
        };
        edit(&mut edited);

        let mut context = self.context.borrow_mut();
        let tracked = context.teams.get_mut(&id).ok_or(not_managed)?;
        tracked.entity.name = edited.name;
        Ok(tracked.entity.clone())
    }

    pub fn contains_member(&self, id: MemberId) -> bool {
        self.context.borrow().members.contains_key(&id)
    }

    pub fn state_of_member(&self, member: &Member) -> EntityState {
        self.context.borrow().member_state(member)
    }

    pub fn managed_count(&self) -> usize {
        let context = self.context.borrow();
        context.members.len() + context.teams.len()
    }

    /// Writes every changed, non-read-only managed instance.
    ///
    /// Returns the number of rows written.
    pub fn flush(&self) -> RepoResult<usize> {
        let started_at = Instant::now();
        let mut context = self.context.borrow_mut();
        let mut written = 0;

        for tracked in context.members.values_mut() {
            let Some(snapshot) = tracked.snapshot.as_ref() else {
                continue;
            };
            if tracked.entity.same_state(snapshot) {
                continue;
            }
            tracked.entity.validate()?;
            self.hooks.pre_update(&mut tracked.entity);
            self.write_member(&tracked.entity)?;
            tracked.snapshot = Some(tracked.entity.clone());
            written += 1;
        }

        for tracked in context.teams.values_mut() {
            let Some(snapshot) = tracked.snapshot.as_ref() else {
                continue;
            };
            if tracked.entity.name == snapshot.name {
                continue;
            }
            self.write_team(&tracked.entity)?;
            tracked.snapshot = Some(tracked.entity.clone());
            written += 1;
        }

        if written > 0 {
            debug!(
                "event=flush module=session status=ok rows={} duration_ms={}",
                written,
                started_at.elapsed().as_millis()
            );
        }
        Ok(written)
    }

    /// Detaches every managed instance without writing pending changes.
    pub fn clear(&self) {
        let detached = self.context.borrow_mut().clear();
        debug!("event=persistence_context_clear module=session status=ok detached={detached}");
    }

    /// Detaches one member. Returns whether it was managed.
    pub fn detach_member(&self, id: MemberId) -> bool {
        self.context.borrow_mut().members.remove(&id).is_some()
    }

    /// Deletes a member row and marks the id as removed for this session.
    pub fn remove_member(&self, id: MemberId) -> RepoResult<()> {
        let changed = self.execute_write("DELETE FROM member WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "member",
                id,
            });
        }

        let mut context = self.context.borrow_mut();
        context.members.remove(&id);
        context.removed_members.insert(id);
        Ok(())
    }

    /// Flushes and commits. Deferred constraint violations surface here.
    pub fn commit(self) -> RepoResult<()> {
        self.flush()?;
        let statements = self.statements.get();
        let duration_ms = self.started_at.elapsed().as_millis();
        match self.tx.commit() {
            Ok(()) => {
                info!(
                    "event=session_commit module=session status=ok statements={statements} duration_ms={duration_ms}"
                );
                Ok(())
            }
            Err(err) => {
                let err = RepoError::from(err);
                error!(
                    "event=session_commit module=session status=error statements={statements} duration_ms={duration_ms} error={err}"
                );
                Err(err)
            }
        }
    }

    /// Discards every change made in this session.
    pub fn rollback(self) -> RepoResult<()> {
        let statements = self.statements.get();
        self.tx.rollback()?;
        info!("event=session_rollback module=session status=ok statements={statements}");
        Ok(())
    }

    fn statement(&self, sql: &str) -> RepoResult<CachedStatement<'_>> {
        self.statements.set(self.statements.get() + 1);
        Ok(self.tx.prepare_cached(sql)?)
    }

    /// Prepares a statement that reads under the transaction's snapshot.
    pub(crate) fn read_statement(&self, sql: &str) -> RepoResult<CachedStatement<'_>> {
        self.has_read.set(true);
        self.statement(sql)
    }

    /// Runs a write; a successful one means the write lock is now held.
    fn execute_write<P: Params>(&self, sql: &str, params: P) -> RepoResult<usize> {
        let changed = self.statement(sql)?.execute(params)?;
        self.write_locked.set(true);
        Ok(changed)
    }

    /// Runs a member read after auto-flushing, merging rows (and any
    /// join-fetched teams) into the context.
    pub(crate) fn load_members(
        &self,
        sql: &str,
        binds: Vec<Value>,
        fetch: FetchGraph,
        hints: QueryHints,
    ) -> RepoResult<Vec<Member>> {
        self.flush()?;
        let mut stmt = self.read_statement(sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut members = Vec::new();

        while let Some(row) = rows.next()? {
            let member = member_from_row(row)?;
            let team = if fetch.team {
                fetched_team_from_row(row)?
            } else {
                None
            };

            let mut context = self.context.borrow_mut();
            if let Some(team) = team {
                context.merge_team(team);
            }
            if let Some(managed) = context.merge_member(member, hints.read_only) {
                members.push(managed);
            }
        }

        Ok(members)
    }

    pub(crate) fn load_teams(&self, sql: &str, binds: Vec<Value>) -> RepoResult<Vec<Team>> {
        self.flush()?;
        let mut stmt = self.read_statement(sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut teams = Vec::new();
        while let Some(row) = rows.next()? {
            let team = team_from_row(row)?;
            if let Some(managed) = self.context.borrow_mut().merge_team(team) {
                teams.push(managed);
            }
        }
        Ok(teams)
    }

    /// Runs a scalar `COUNT(*)` after auto-flushing.
    pub(crate) fn count(&self, sql: &str, binds: Vec<Value>) -> RepoResult<u64> {
        self.flush()?;
        let count: i64 = self
            .read_statement(sql)?
            .query_row(params_from_iter(binds), |row| row.get(0))?;
        u64::try_from(count).map_err(|_| RepoError::InvalidData(format!("negative count {count}")))
    }

    /// Runs a set-based write directly against storage.
    pub(crate) fn execute_bulk(
        &self,
        sql: &str,
        binds: Vec<Value>,
        clear: ClearMode,
    ) -> RepoResult<usize> {
        let started_at = Instant::now();
        self.flush()?;
        let affected = match self.execute_write(sql, params_from_iter(binds)) {
            Ok(affected) => affected,
            Err(err) => {
                let err = RepoError::from(err);
                error!(
                    "event=bulk_update module=session status=error duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                return Err(err);
            }
        };

        if clear == ClearMode::ClearAutomatically {
            self.clear();
        }
        info!(
            "event=bulk_update module=session status=ok rows={} cleared={} duration_ms={}",
            affected,
            clear == ClearMode::ClearAutomatically,
            started_at.elapsed().as_millis()
        );
        Ok(affected)
    }

    /// Takes the store write lock by running `sql` (a no-op update over the
    /// target rows). Blocks up to the busy timeout.
    ///
    /// # Errors
    /// - `LockAfterRead` when a deferred session has already read without
    ///   writing: SQLite cannot wait for the lock from there.
    pub(crate) fn acquire_write_lock(&self, sql: &str, binds: Vec<Value>) -> RepoResult<usize> {
        let started_at = Instant::now();
        self.flush()?;
        if self.has_read.get() && !self.write_locked.get() {
            let err = RepoError::LockAfterRead;
            warn!("event=lock_acquire module=session status=error error={err}");
            return Err(err);
        }
        match self.execute_write(sql, params_from_iter(binds)) {
            Ok(rows) => {
                debug!(
                    "event=lock_acquire module=session status=ok rows={} wait_ms={}",
                    rows,
                    started_at.elapsed().as_millis()
                );
                Ok(rows)
            }
            Err(err) => {
                let err = RepoError::from(err);
                warn!(
                    "event=lock_acquire module=session status=error wait_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                Err(err)
            }
        }
    }

    fn managed_member(&self, id: MemberId) -> RepoResult<Member> {
        self.context
            .borrow()
            .members
            .get(&id)
            .map(|tracked| tracked.entity.clone())
            .ok_or(RepoError::NotManaged {
                entity: "member",
                id,
            })
    }

    fn write_member(&self, member: &Member) -> RepoResult<()> {
        let id = member.id.ok_or_else(|| {
            RepoError::InvalidData("managed member without identity".to_string())
        })?;
        let changed = self.execute_write(
            "UPDATE member
             SET
                username = ?1,
                age = ?2,
                team_id = ?3,
                updated_date = ?4,
                updated_by = ?5
             WHERE id = ?6;",
            params![
                member.username.as_str(),
                member.age,
                member.team_id,
                member.audit.updated_date,
                member.audit.updated_by.as_deref(),
                id,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "member",
                id,
            });
        }
        Ok(())
    }

    fn write_team(&self, team: &Team) -> RepoResult<()> {
        let id = team
            .id
            .ok_or_else(|| RepoError::InvalidData("managed team without identity".to_string()))?;
        let changed = self.execute_write(
            "UPDATE team SET name = ?1 WHERE id = ?2;",
            params![team.name.as_str(), id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "team", id });
        }
        Ok(())
    }
}

/// Runs `work` in a fresh session with default config: commit on `Ok`,
/// rollback on `Err`.
pub fn transaction<T, E, F>(conn: &mut Connection, work: F) -> Result<T, E>
where
    E: From<RepoError>,
    F: FnOnce(&Session<'_>) -> Result<T, E>,
{
    transaction_with(conn, &StoreConfig::default(), work)
}

/// Same as [`transaction`] with an explicit config.
pub fn transaction_with<T, E, F>(conn: &mut Connection, config: &StoreConfig, work: F) -> Result<T, E>
where
    E: From<RepoError>,
    F: FnOnce(&Session<'_>) -> Result<T, E>,
{
    let session = Session::begin_with(conn, config)?;
    match work(&session) {
        Ok(value) => {
            session.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = session.rollback() {
                error!("event=session_rollback module=session status=error error={rollback_err}");
            }
            Err(err)
        }
    }
}

fn ensure_migrated(conn: &Connection) -> RepoResult<()> {
    let actual_version = current_user_version(conn)?;
    let expected_version = latest_version();
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}
