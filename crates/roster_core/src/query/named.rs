//! Declarative queries with `:name` parameters.
//!
//! # Responsibility
//! - Rewrite `:name` placeholders into positional SQLite parameters.
//! - Validate query text against the live schema before first use.
//!
//! # Invariants
//! - Placeholders inside single-quoted literals are left untouched.
//! - A name used several times binds to one positional slot.
//! - Binding rejects missing and unknown parameter names.

use crate::repo::error::{RepoError, RepoResult};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use rusqlite::types::Value;
use rusqlite::Connection;

static NAMED_PARAM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"'(?:[^']|'')*'|:([A-Za-z_][A-Za-z0-9_]*)").expect("valid named parameter regex")
});

/// One named bind value.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParam {
    pub name: String,
    pub value: Value,
}

impl QueryParam {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Parsed declarative query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedQuery {
    text: String,
    sql: String,
    params: Vec<String>,
}

impl NamedQuery {
    /// Parses query text without touching the database.
    ///
    /// # Errors
    /// - `MalformedQuery` for blank text or raw `?` placeholders.
    pub fn parse(text: impl Into<String>) -> RepoResult<Self> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(RepoError::malformed(text.clone(), "query text is blank"));
        }

        let mut params: Vec<String> = Vec::new();
        let sql = NAMED_PARAM_RE.replace_all(trimmed, |caps: &Captures<'_>| match caps.get(1) {
            Some(name) => {
                let name = name.as_str();
                let slot = match params.iter().position(|known| known == name) {
                    Some(index) => index + 1,
                    None => {
                        params.push(name.to_string());
                        params.len()
                    }
                };
                format!("?{slot}")
            }
            None => caps[0].to_string(),
        });
        let sql = sql.into_owned();

        let without_literals = NAMED_PARAM_RE.replace_all(trimmed, "");
        if without_literals.contains('?') {
            return Err(RepoError::malformed(
                text.clone(),
                "positional `?` placeholders are not allowed; use `:name`",
            ));
        }

        Ok(Self { text, sql, params })
    }

    /// Parses and prepares the query on `conn` so schema errors surface now
    /// rather than on first execution.
    pub fn prepare(conn: &Connection, text: impl Into<String>) -> RepoResult<Self> {
        let query = Self::parse(text)?;
        conn.prepare(&query.sql)
            .map_err(|err| RepoError::malformed(query.text.clone(), err.to_string()))?;
        Ok(query)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Positional SQL handed to SQLite.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn param_names(&self) -> &[String] {
        &self.params
    }

    /// Orders `params` into positional bind values.
    pub fn bind(&self, params: &[QueryParam]) -> RepoResult<Vec<Value>> {
        if let Some(unknown) = params
            .iter()
            .find(|param| !self.params.iter().any(|name| *name == param.name))
        {
            return Err(RepoError::malformed(
                self.text.clone(),
                format!("unknown parameter `:{}`", unknown.name),
            ));
        }

        self.params
            .iter()
            .map(|name| {
                params
                    .iter()
                    .find(|param| param.name == *name)
                    .map(|param| param.value.clone())
                    .ok_or_else(|| {
                        RepoError::malformed(
                            self.text.clone(),
                            format!("missing value for parameter `:{name}`"),
                        )
                    })
            })
            .collect()
    }
}
