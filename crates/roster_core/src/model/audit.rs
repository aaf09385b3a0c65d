//! Audit columns shared by audited entities.

use serde::{Deserialize, Serialize};

/// Creation/modification metadata. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFields {
    pub created_date: i64,
    pub updated_date: i64,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
}

impl AuditFields {
    /// Stamps both creation and modification columns.
    pub fn stamp_insert(&mut self, now_ms: i64, auditor: &str) {
        self.created_date = now_ms;
        self.updated_date = now_ms;
        self.created_by = Some(auditor.to_string());
        self.updated_by = Some(auditor.to_string());
    }

    /// Stamps modification columns, never moving `updated_date` before
    /// `created_date`.
    pub fn stamp_update(&mut self, now_ms: i64, auditor: &str) {
        self.updated_date = now_ms.max(self.created_date).max(self.updated_date);
        self.updated_by = Some(auditor.to_string());
    }
}
