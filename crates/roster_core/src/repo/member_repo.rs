//! Member repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the member lookups, pages, projections, bulk updates and locked
//!   reads used by roster use-cases.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Every read goes through the owning `Session`, so results are merged into
//!   its identity map and pending changes are flushed first.
//! - Declared queries are prepared at construction; a malformed one fails
//!   `try_new` instead of the first call.
//! - Collection lookups return an empty `Vec` when nothing matches; single
//!   lookups return `None` and fail with `NonUniqueResult` on several rows.

use crate::model::dto::MemberDto;
use crate::model::member::{Member, MemberId};
use crate::page::{Page, PageRequest, Slice};
use crate::query::hints::{FetchGraph, LockMode, QueryHints};
use crate::query::named::{NamedQuery, QueryParam};
use crate::query::select::{push_window, MemberSelect, Window, FETCHED_TEAM_COLUMNS, MEMBER_COLUMNS};
use crate::query::{MemberFilter, Sort};
use crate::repo::error::{RepoError, RepoResult};
use crate::session::{ClearMode, Session};
use rusqlite::params_from_iter;

/// Repository interface for member operations.
pub trait MemberRepository {
    /// Persists a transient member or merges a detached one; returns the
    /// managed copy.
    fn save(&self, member: Member) -> RepoResult<Member>;
    fn find_by_id(&self, id: MemberId) -> RepoResult<Option<Member>>;
    /// All members, with associations fetched per `fetch`.
    fn find_all(&self, fetch: FetchGraph) -> RepoResult<Vec<Member>>;
    fn count(&self) -> RepoResult<u64>;
    fn delete_by_id(&self, id: MemberId) -> RepoResult<()>;

    /// `(id, username, team name)` for every member; team name is `None`
    /// for members without a team.
    fn find_member_dto(&self) -> RepoResult<Vec<MemberDto>>;

    fn find_list_by_username(&self, username: &str) -> RepoResult<Vec<Member>>;
    fn find_member_by_username(&self, username: &str) -> RepoResult<Option<Member>>;

    /// Zero-or-one lookup where absence must be handled explicitly.
    fn find_optional_by_username(&self, username: &str) -> RepoResult<Option<Member>> {
        self.find_member_by_username(username)
    }

    /// Members of one age; the content query joins `team`, the count query
    /// does not.
    fn find_by_age(&self, age: i32, request: &PageRequest) -> RepoResult<Page<Member>>;
    /// Count-free variant of [`MemberRepository::find_by_age`].
    fn find_slice_by_age(&self, age: i32, request: &PageRequest) -> RepoResult<Slice<Member>>;
    fn find_page(
        &self,
        filter: &MemberFilter,
        request: &PageRequest,
        fetch: FetchGraph,
    ) -> RepoResult<Page<Member>>;

    fn find_by(
        &self,
        filter: &MemberFilter,
        sort: &Sort,
        fetch: FetchGraph,
        hints: QueryHints,
    ) -> RepoResult<Vec<Member>>;
    fn find_one(
        &self,
        filter: &MemberFilter,
        fetch: FetchGraph,
        hints: QueryHints,
    ) -> RepoResult<Option<Member>>;

    /// Adds one year to every member at least `age` old, directly in
    /// storage. Returns the affected row count.
    fn bulk_age_plus(&self, age: i32, clear: ClearMode) -> RepoResult<usize>;

    fn find_member_entity_graph(&self) -> RepoResult<Vec<Member>>;
    fn find_entity_graph_by_username(&self, username: &str) -> RepoResult<Vec<Member>>;
    /// Single lookup whose result is never written back on flush.
    fn find_read_only_by_username(&self, username: &str) -> RepoResult<Option<Member>>;
    /// Reads under a write lock held until the session ends.
    ///
    /// Waits for a current holder when the session was opened with
    /// `Session::begin_locking`, or when this is its first read. A deferred
    /// session that already read fails with `LockAfterRead`.
    fn find_lock_by_username(&self, username: &str) -> RepoResult<Vec<Member>>;
    fn find_with_lock(
        &self,
        filter: &MemberFilter,
        sort: &Sort,
        lock: LockMode,
    ) -> RepoResult<Vec<Member>>;

    /// Hand-written query path, outside the derived lookups.
    fn find_member_custom(&self) -> RepoResult<Vec<Member>>;
}

#[derive(Debug, Clone)]
struct DeclaredQueries {
    member_dto: NamedQuery,
    by_age_content: NamedQuery,
    by_age_count: NamedQuery,
    bulk_age_plus: NamedQuery,
    member_custom: NamedQuery,
}

impl DeclaredQueries {
    fn prepare(session: &Session<'_>) -> RepoResult<Self> {
        let conn = session.connection();
        Ok(Self {
            member_dto: NamedQuery::prepare(
                conn,
                "SELECT m.id AS id, m.username AS username, t.name AS team_name
                 FROM member m
                 LEFT JOIN team t ON t.id = m.team_id
                 ORDER BY m.id ASC",
            )?,
            by_age_content: NamedQuery::prepare(
                conn,
                format!(
                    "SELECT {MEMBER_COLUMNS}, {FETCHED_TEAM_COLUMNS}
                     FROM member m
                     LEFT JOIN team t ON t.id = m.team_id
                     WHERE m.age = :age"
                ),
            )?,
            by_age_count: NamedQuery::prepare(
                conn,
                "SELECT COUNT(*) FROM member m WHERE m.age = :age",
            )?,
            bulk_age_plus: NamedQuery::prepare(
                conn,
                "UPDATE member SET age = age + 1 WHERE age >= :age",
            )?,
            member_custom: NamedQuery::prepare(
                conn,
                format!("SELECT {MEMBER_COLUMNS} FROM member m ORDER BY m.id ASC"),
            )?,
        })
    }
}

/// SQLite-backed member repository bound to one session.
pub struct SqliteMemberRepository<'s, 'conn> {
    session: &'s Session<'conn>,
    queries: DeclaredQueries,
}

impl<'s, 'conn> SqliteMemberRepository<'s, 'conn> {
    /// Prepares declared queries against the session's connection.
    ///
    /// # Errors
    /// - `MalformedQuery` when a declared query does not match the schema.
    pub fn try_new(session: &'s Session<'conn>) -> RepoResult<Self> {
        let queries = DeclaredQueries::prepare(session)?;
        Ok(Self { session, queries })
    }

    pub fn session(&self) -> &'s Session<'conn> {
        self.session
    }
}

impl MemberRepository for SqliteMemberRepository<'_, '_> {
    fn save(&self, member: Member) -> RepoResult<Member> {
        if member.is_transient() {
            let id = self.session.persist_member(member)?;
            return self
                .session
                .find_member(id)?
                .ok_or(RepoError::NotManaged {
                    entity: "member",
                    id,
                });
        }
        self.session.merge_member(member)
    }

    fn find_by_id(&self, id: MemberId) -> RepoResult<Option<Member>> {
        self.session.find_member(id)
    }

    fn find_all(&self, fetch: FetchGraph) -> RepoResult<Vec<Member>> {
        self.find_by(
            &MemberFilter::all(),
            &Sort::unsorted(),
            fetch,
            QueryHints::default(),
        )
    }

    fn count(&self) -> RepoResult<u64> {
        let (sql, binds) = MemberSelect::new(&MemberFilter::all()).count_sql();
        self.session.count(&sql, binds)
    }

    fn delete_by_id(&self, id: MemberId) -> RepoResult<()> {
        self.session.remove_member(id)
    }

    fn find_member_dto(&self) -> RepoResult<Vec<MemberDto>> {
        self.session.flush()?;
        let query = &self.queries.member_dto;
        let binds = query.bind(&[])?;
        let mut stmt = self.session.read_statement(query.sql())?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut dtos = Vec::new();
        while let Some(row) = rows.next()? {
            dtos.push(MemberDto {
                id: row.get("id")?,
                username: row.get("username")?,
                team_name: row.get("team_name")?,
            });
        }
        Ok(dtos)
    }

    fn find_list_by_username(&self, username: &str) -> RepoResult<Vec<Member>> {
        self.find_by(
            &MemberFilter::username(username),
            &Sort::unsorted(),
            FetchGraph::none(),
            QueryHints::default(),
        )
    }

    fn find_member_by_username(&self, username: &str) -> RepoResult<Option<Member>> {
        self.find_one(
            &MemberFilter::username(username),
            FetchGraph::none(),
            QueryHints::default(),
        )
    }

    fn find_by_age(&self, age: i32, request: &PageRequest) -> RepoResult<Page<Member>> {
        let content_query = &self.queries.by_age_content;
        let mut binds = content_query.bind(&[QueryParam::new("age", age)])?;
        let mut sql = content_query.sql().to_string();
        sql.push_str(&request.sort().render());
        push_window(
            &mut sql,
            &mut binds,
            Window {
                limit: request.size(),
                offset: request.offset(),
            },
        );

        let content = self
            .session
            .load_members(&sql, binds, FetchGraph::team(), QueryHints::default())?;
        Page::from_window(content, request, || {
            let count_query = &self.queries.by_age_count;
            let binds = count_query.bind(&[QueryParam::new("age", age)])?;
            self.session.count(count_query.sql(), binds)
        })
    }

    fn find_slice_by_age(&self, age: i32, request: &PageRequest) -> RepoResult<Slice<Member>> {
        let filter = MemberFilter::age(age);
        let (sql, binds) = MemberSelect::new(&filter)
            .sorted(request.sort())
            .window(request.size().saturating_add(1), request.offset())
            .content_sql();
        let content = self
            .session
            .load_members(&sql, binds, FetchGraph::none(), QueryHints::default())?;
        Ok(Slice::from_lookahead(content, request))
    }

    fn find_page(
        &self,
        filter: &MemberFilter,
        request: &PageRequest,
        fetch: FetchGraph,
    ) -> RepoResult<Page<Member>> {
        let select = MemberSelect::new(filter)
            .sorted(request.sort())
            .fetch(fetch)
            .window(request.size(), request.offset());
        let (sql, binds) = select.content_sql();
        let content = self
            .session
            .load_members(&sql, binds, fetch, QueryHints::default())?;
        Page::from_window(content, request, || {
            let (count_sql, count_binds) = select.count_sql();
            self.session.count(&count_sql, count_binds)
        })
    }

    fn find_by(
        &self,
        filter: &MemberFilter,
        sort: &Sort,
        fetch: FetchGraph,
        hints: QueryHints,
    ) -> RepoResult<Vec<Member>> {
        let (sql, binds) = MemberSelect::new(filter)
            .sorted(sort)
            .fetch(fetch)
            .content_sql();
        self.session.load_members(&sql, binds, fetch, hints)
    }

    fn find_one(
        &self,
        filter: &MemberFilter,
        fetch: FetchGraph,
        hints: QueryHints,
    ) -> RepoResult<Option<Member>> {
        let mut found = self.find_by(filter, &Sort::unsorted(), fetch, hints)?;
        match found.len() {
            0 | 1 => Ok(found.pop()),
            actual => Err(RepoError::NonUniqueResult { actual }),
        }
    }

    fn bulk_age_plus(&self, age: i32, clear: ClearMode) -> RepoResult<usize> {
        let query = &self.queries.bulk_age_plus;
        let binds = query.bind(&[QueryParam::new("age", age)])?;
        self.session.execute_bulk(query.sql(), binds, clear)
    }

    fn find_member_entity_graph(&self) -> RepoResult<Vec<Member>> {
        self.find_all(FetchGraph::team())
    }

    fn find_entity_graph_by_username(&self, username: &str) -> RepoResult<Vec<Member>> {
        self.find_by(
            &MemberFilter::username(username),
            &Sort::unsorted(),
            FetchGraph::team(),
            QueryHints::default(),
        )
    }

    fn find_read_only_by_username(&self, username: &str) -> RepoResult<Option<Member>> {
        self.find_one(
            &MemberFilter::username(username),
            FetchGraph::none(),
            QueryHints::read_only(),
        )
    }

    fn find_lock_by_username(&self, username: &str) -> RepoResult<Vec<Member>> {
        self.find_with_lock(
            &MemberFilter::username(username),
            &Sort::unsorted(),
            LockMode::PessimisticWrite,
        )
    }

    fn find_with_lock(
        &self,
        filter: &MemberFilter,
        sort: &Sort,
        lock: LockMode,
    ) -> RepoResult<Vec<Member>> {
        let select = MemberSelect::new(filter).sorted(sort);
        if lock == LockMode::PessimisticWrite {
            let (lock_sql, lock_binds) = select.lock_sql();
            self.session.acquire_write_lock(&lock_sql, lock_binds)?;
        }
        let (sql, binds) = select.content_sql();
        self.session
            .load_members(&sql, binds, FetchGraph::none(), QueryHints::default())
    }

    fn find_member_custom(&self) -> RepoResult<Vec<Member>> {
        let query = &self.queries.member_custom;
        let binds = query.bind(&[])?;
        self.session
            .load_members(query.sql(), binds, FetchGraph::none(), QueryHints::default())
    }
}
