//! Heuristic security checks run against a submitted expense.
//!
//! The engine reloads the expense with its related entities, applies an ordered list of named
//! rules, then replays the historical-stats rules once per scope (author, and payee when the
//! author does not administer the payee profile). Findings are returned in evaluation order.

mod context;
mod engine;
pub mod router;
pub mod rules;
pub mod stats;

#[cfg(test)]
mod tests;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{CollectiveId, ExpenseStatus};
use crate::storage::{ResolutionError, StorageError};

pub use context::{Author, ResolvedExpense, RoleSet};
pub use engine::SecurityCheckEngine;
pub use router::security_router;
pub use rules::{ExpenseRule, StatsContext, StatsRule};

/// Entity a finding is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scope {
    Author,
    Collective,
    Payee,
    PayoutMethod,
}

impl Scope {
    pub const fn label(self) -> &'static str {
        match self {
            Scope::Author => "AUTHOR",
            Scope::Collective => "COLLECTIVE",
            Scope::Payee => "PAYEE",
            Scope::PayoutMethod => "PAYOUT_METHOD",
        }
    }

    /// Label with only the first letter upper-cased, as used in finding messages.
    pub fn capitalized(self) -> String {
        let lower = self.label().to_ascii_lowercase();
        let mut chars = lower.chars();
        match chars.next() {
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            None => String::new(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Severity of a finding; ordered from `Pass` to `High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Level {
    Pass,
    Low,
    Medium,
    High,
}

impl Level {
    pub const fn label(self) -> &'static str {
        match self {
            Level::Pass => "PASS",
            Level::Low => "LOW",
            Level::Medium => "MEDIUM",
            Level::High => "HIGH",
        }
    }
}

/// A single finding produced by a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityCheck {
    pub scope: Scope,
    pub level: Level,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl SecurityCheck {
    pub fn new(scope: Scope, level: Level, message: impl Into<String>) -> Self {
        Self {
            scope,
            level,
            message: message.into(),
            details: None,
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Most severe level among the findings, `None` when there are none.
pub fn highest_level(checks: &[SecurityCheck]) -> Option<Level> {
    checks.iter().map(|check| check.level).max()
}

/// Failure of a whole evaluation; no partial findings are ever returned.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("could not resolve expense: {0}")]
    Resolution(#[from] ResolutionError),
    #[error("could not load expense stats: {0}")]
    Storage(#[from] StorageError),
    #[error("malformed stats for collective {collective_id} ({status}): {reason}")]
    MalformedStat {
        collective_id: CollectiveId,
        status: ExpenseStatus,
        reason: String,
    },
}
