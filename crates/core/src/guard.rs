//! Access decisions for protected content

use crate::record::SessionRecord;
use crate::state::SessionReader;

/// Outcome of an access check
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    /// The presentation layer should send the user to the login entry point
    RequireLogin,
}

/// Pure decision over a record
pub fn can_access(record: &SessionRecord) -> bool {
    record.is_authenticated()
}

/// Reports whether protected content may be shown. Never mutates the session.
#[derive(Debug, Clone)]
pub struct AccessGuard {
    reader: SessionReader,
}

impl AccessGuard {
    pub fn new(reader: SessionReader) -> Self {
        Self { reader }
    }

    pub fn can_access(&self) -> bool {
        self.reader.is_authenticated()
    }

    pub fn decide(&self) -> AccessDecision {
        if self.can_access() {
            AccessDecision::Allow
        } else {
            AccessDecision::RequireLogin
        }
    }

    /// Wait until the session changes and report the new decision
    pub async fn next_decision(&mut self) -> Option<AccessDecision> {
        let record = self.reader.changed().await?;
        Some(if can_access(&record) {
            AccessDecision::Allow
        } else {
            AccessDecision::RequireLogin
        })
    }
}
