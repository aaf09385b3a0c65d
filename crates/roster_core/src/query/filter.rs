//! Explicit member predicate.

use crate::model::team::TeamId;
use rusqlite::types::Value;

/// Conjunction of optional member conditions. An empty filter matches all rows.
///
/// Conditions only reference `member` columns (team name goes through a
/// correlated sub-select), so the same predicate works with or without a
/// team join.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberFilter {
    pub username_eq: Option<String>,
    /// SQL `LIKE` pattern, e.g. `mem%`.
    pub username_like: Option<String>,
    pub age_eq: Option<i32>,
    pub age_gte: Option<i32>,
    pub age_lte: Option<i32>,
    pub team_id_eq: Option<TeamId>,
    pub team_name_eq: Option<String>,
    pub has_team: Option<bool>,
}

impl MemberFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn username(username: impl Into<String>) -> Self {
        Self {
            username_eq: Some(username.into()),
            ..Self::default()
        }
    }

    pub fn age(age: i32) -> Self {
        Self {
            age_eq: Some(age),
            ..Self::default()
        }
    }

    pub fn and_username_like(mut self, pattern: impl Into<String>) -> Self {
        self.username_like = Some(pattern.into());
        self
    }

    pub fn and_age_gte(mut self, age: i32) -> Self {
        self.age_gte = Some(age);
        self
    }

    pub fn and_age_lte(mut self, age: i32) -> Self {
        self.age_lte = Some(age);
        self
    }

    pub fn and_team(mut self, team_id: TeamId) -> Self {
        self.team_id_eq = Some(team_id);
        self
    }

    pub fn and_team_name(mut self, name: impl Into<String>) -> Self {
        self.team_name_eq = Some(name.into());
        self
    }

    pub fn and_has_team(mut self, has_team: bool) -> Self {
        self.has_team = Some(has_team);
        self
    }

    /// Renders ` WHERE ...` (or an empty string) against alias `m`, appending
    /// bind values in placeholder order.
    pub(crate) fn render(&self, binds: &mut Vec<Value>) -> String {
        let mut clauses: Vec<&'static str> = Vec::new();

        if let Some(username) = &self.username_eq {
            clauses.push("m.username = ?");
            binds.push(Value::Text(username.clone()));
        }
        if let Some(pattern) = &self.username_like {
            clauses.push("m.username LIKE ?");
            binds.push(Value::Text(pattern.clone()));
        }
        if let Some(age) = self.age_eq {
            clauses.push("m.age = ?");
            binds.push(Value::Integer(i64::from(age)));
        }
        if let Some(age) = self.age_gte {
            clauses.push("m.age >= ?");
            binds.push(Value::Integer(i64::from(age)));
        }
        if let Some(age) = self.age_lte {
            clauses.push("m.age <= ?");
            binds.push(Value::Integer(i64::from(age)));
        }
        if let Some(team_id) = self.team_id_eq {
            clauses.push("m.team_id = ?");
            binds.push(Value::Integer(team_id));
        }
        if let Some(name) = &self.team_name_eq {
            clauses.push("EXISTS (SELECT 1 FROM team ft WHERE ft.id = m.team_id AND ft.name = ?)");
            binds.push(Value::Text(name.clone()));
        }
        match self.has_team {
            Some(true) => clauses.push("m.team_id IS NOT NULL"),
            Some(false) => clauses.push("m.team_id IS NULL"),
            None => {}
        }

        if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        }
    }
}
