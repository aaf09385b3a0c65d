//! SQL assembly for member reads, counts and lock escalation.

use crate::query::filter::MemberFilter;
use crate::query::hints::FetchGraph;
use crate::query::sort::Sort;
use rusqlite::types::Value;

/// Member columns selected against alias `m`.
pub(crate) const MEMBER_COLUMNS: &str = "m.id,
    m.username,
    m.age,
    m.team_id,
    m.created_date,
    m.updated_date,
    m.created_by,
    m.updated_by";

/// Team columns selected when the team association is join-fetched.
pub(crate) const FETCHED_TEAM_COLUMNS: &str = "t.id AS team_ref_id, t.name AS team_ref_name";

/// Row window (`LIMIT` / `OFFSET`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Window {
    pub limit: u64,
    pub offset: u64,
}

/// Builder for one member read.
#[derive(Debug, Clone)]
pub(crate) struct MemberSelect<'a> {
    filter: &'a MemberFilter,
    sort: Option<&'a Sort>,
    fetch: FetchGraph,
    window: Option<Window>,
}

impl<'a> MemberSelect<'a> {
    pub fn new(filter: &'a MemberFilter) -> Self {
        Self {
            filter,
            sort: None,
            fetch: FetchGraph::none(),
            window: None,
        }
    }

    pub fn sorted(mut self, sort: &'a Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn fetch(mut self, fetch: FetchGraph) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn window(mut self, limit: u64, offset: u64) -> Self {
        self.window = Some(Window { limit, offset });
        self
    }

    /// Content statement: root rows plus any join-fetched associations.
    pub fn content_sql(&self) -> (String, Vec<Value>) {
        let mut binds = Vec::new();
        let mut sql = if self.fetch.team {
            format!(
                "SELECT {MEMBER_COLUMNS}, {FETCHED_TEAM_COLUMNS}
                 FROM member m
                 LEFT JOIN team t ON t.id = m.team_id"
            )
        } else {
            format!("SELECT {MEMBER_COLUMNS} FROM member m")
        };

        sql.push_str(&self.filter.render(&mut binds));
        match self.sort {
            Some(sort) => sql.push_str(&sort.render()),
            None => sql.push_str(&Sort::unsorted().render()),
        }
        if let Some(window) = self.window {
            push_window(&mut sql, &mut binds, window);
        }

        (sql, binds)
    }

    /// Count statement. Never joins: the filter is join-independent.
    pub fn count_sql(&self) -> (String, Vec<Value>) {
        let mut binds = Vec::new();
        let mut sql = String::from("SELECT COUNT(*) FROM member m");
        sql.push_str(&self.filter.render(&mut binds));
        (sql, binds)
    }

    /// No-op write over the matching rows that takes the store's write lock
    /// before the content statement runs.
    pub fn lock_sql(&self) -> (String, Vec<Value>) {
        let mut binds = Vec::new();
        let mut sql = String::from("UPDATE member AS m SET id = id");
        sql.push_str(&self.filter.render(&mut binds));
        (sql, binds)
    }
}

pub(crate) fn push_window(sql: &mut String, binds: &mut Vec<Value>, window: Window) {
    sql.push_str(" LIMIT ? OFFSET ?");
    binds.push(Value::Integer(clamp_i64(window.limit)));
    binds.push(Value::Integer(clamp_i64(window.offset)));
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::MemberSelect;
    use crate::query::{Direction, FetchGraph, MemberField, MemberFilter, Sort};
    use rusqlite::types::Value;

    #[test]
    fn count_omits_join_but_keeps_predicate() {
        let filter = MemberFilter::age(10);
        let sort = Sort::by(Direction::Desc, MemberField::Username);
        let select = MemberSelect::new(&filter)
            .sorted(&sort)
            .fetch(FetchGraph::team())
            .window(3, 3);

        let (content, content_binds) = select.content_sql();
        let (count, count_binds) = select.count_sql();

        assert!(content.contains("LEFT JOIN team t"));
        assert!(content.ends_with("ORDER BY m.username DESC, m.id ASC LIMIT ? OFFSET ?"));
        assert_eq!(
            content_binds,
            vec![Value::Integer(10), Value::Integer(3), Value::Integer(3)]
        );

        assert_eq!(count, "SELECT COUNT(*) FROM member m WHERE m.age = ?");
        assert_eq!(count_binds, vec![Value::Integer(10)]);
    }

    #[test]
    fn lock_statement_targets_same_rows() {
        let filter = MemberFilter::username("member1");
        let (sql, binds) = MemberSelect::new(&filter).lock_sql();
        assert_eq!(sql, "UPDATE member AS m SET id = id WHERE m.username = ?");
        assert_eq!(binds, vec![Value::Text("member1".to_string())]);
    }
}
