//! Explicit pre-insert / pre-update audit hooks.
//!
//! The session calls these right before it writes a row; nothing is
//! triggered by listeners behind the caller's back.

use crate::model::member::Member;
use std::time::{SystemTime, UNIX_EPOCH};

/// Epoch-millisecond time source.
pub type Clock = fn() -> i64;

/// Stamps audit columns with the acting principal and the current time.
#[derive(Debug, Clone)]
pub struct AuditHooks {
    auditor: String,
    clock: Clock,
}

impl AuditHooks {
    pub fn new(auditor: impl Into<String>) -> Self {
        Self::with_clock(auditor, system_clock_ms)
    }

    pub fn with_clock(auditor: impl Into<String>, clock: Clock) -> Self {
        Self {
            auditor: auditor.into(),
            clock,
        }
    }

    pub fn auditor(&self) -> &str {
        &self.auditor
    }

    pub fn pre_insert(&self, member: &mut Member) {
        member.audit.stamp_insert((self.clock)(), &self.auditor);
    }

    pub fn pre_update(&self, member: &mut Member) {
        member.audit.stamp_update((self.clock)(), &self.auditor);
    }
}

fn system_clock_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
