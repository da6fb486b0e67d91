//! CSV import of historical expenses into an [`InMemoryStore`].
//!
//! Each row describes one expense together with the ids of the entities it touches. Users and
//! collectives referenced by a row are registered on first sight so that the resulting store can
//! resolve every imported expense.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use tracing::info;

use crate::domain::{
    Collective, CollectiveId, CollectiveKind, Expense, ExpenseId, ExpenseStatus, User, UserId,
};
use crate::storage::InMemoryStore;

#[derive(Debug)]
pub enum FixtureImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidStatus { line: usize, value: String },
    InvalidTimestamp { line: usize, value: String },
}

impl fmt::Display for FixtureImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixtureImportError::Io(err) => write!(f, "failed to read fixtures: {}", err),
            FixtureImportError::Csv(err) => write!(f, "failed to parse fixtures: {}", err),
            FixtureImportError::InvalidStatus { line, value } => {
                write!(f, "line {}: unknown expense status '{}'", line, value)
            }
            FixtureImportError::InvalidTimestamp { line, value } => {
                write!(f, "line {}: unparseable created_at '{}'", line, value)
            }
        }
    }
}

impl std::error::Error for FixtureImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FixtureImportError::Io(err) => Some(err),
            FixtureImportError::Csv(err) => Some(err),
            FixtureImportError::InvalidStatus { .. }
            | FixtureImportError::InvalidTimestamp { .. } => None,
        }
    }
}

impl From<std::io::Error> for FixtureImportError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<csv::Error> for FixtureImportError {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}

/// Counts of what an import registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub expenses: usize,
    pub users: usize,
    pub collectives: usize,
}

#[derive(Debug, Deserialize)]
struct ExpenseRow {
    id: i64,
    user_id: i64,
    user_collective_id: i64,
    #[serde(default, deserialize_with = "flag")]
    two_factor: bool,
    from_collective_id: i64,
    collective_id: i64,
    #[serde(default)]
    host_collective_id: Option<i64>,
    amount: i64,
    status: String,
    created_at: String,
}

fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(matches!(
        raw.as_deref().map(|value| value.trim().to_ascii_lowercase()).as_deref(),
        Some("true" | "1" | "yes")
    ))
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub fn import_file(path: &Path, store: &InMemoryStore) -> Result<ImportSummary, FixtureImportError> {
    let file = File::open(path)?;
    let summary = import_reader(file, store)?;
    info!(
        path = %path.display(),
        expenses = summary.expenses,
        users = summary.users,
        collectives = summary.collectives,
        "imported expense fixtures"
    );
    Ok(summary)
}

/// Rows are validated before anything is written, so a failed import leaves the store untouched.
pub fn import_reader<R: Read>(
    reader: R,
    store: &InMemoryStore,
) -> Result<ImportSummary, FixtureImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut expenses = Vec::new();
    let mut users = Vec::new();
    for (index, record) in csv_reader.deserialize::<ExpenseRow>().enumerate() {
        let row = record?;
        // Header is line 1.
        let line = index + 2;
        let status =
            ExpenseStatus::parse(&row.status).ok_or_else(|| FixtureImportError::InvalidStatus {
                line,
                value: row.status.clone(),
            })?;
        let created_at = parse_timestamp(&row.created_at).ok_or_else(|| {
            FixtureImportError::InvalidTimestamp {
                line,
                value: row.created_at.clone(),
            }
        })?;

        users.push(User {
            id: UserId(row.user_id),
            collective_id: CollectiveId(row.user_collective_id),
            two_factor_enabled: row.two_factor,
        });
        expenses.push(Expense {
            id: ExpenseId(row.id),
            user_id: UserId(row.user_id),
            from_collective_id: CollectiveId(row.from_collective_id),
            collective_id: CollectiveId(row.collective_id),
            host_collective_id: row.host_collective_id.map(CollectiveId),
            payout_method_id: None,
            amount: row.amount,
            currency: "USD".to_string(),
            status,
            description: String::new(),
            created_at,
            updated_at: created_at,
        });
    }

    let mut summary = ImportSummary::default();
    for user in users {
        if store.user(user.id).is_none() {
            summary.users += 1;
        }
        if register(store, user.collective_id, CollectiveKind::User, None) {
            summary.collectives += 1;
        }
        store.insert_user(user);
    }
    for expense in expenses {
        // User profiles are already registered; any other payee is an organization.
        if register(store, expense.from_collective_id, CollectiveKind::Organization, None) {
            summary.collectives += 1;
        }
        if let Some(host_id) = expense.host_collective_id {
            if register(store, host_id, CollectiveKind::Organization, None) {
                summary.collectives += 1;
            }
        }
        if register(
            store,
            expense.collective_id,
            CollectiveKind::Collective,
            expense.host_collective_id,
        ) {
            summary.collectives += 1;
        }
        store.insert_expense(expense);
        summary.expenses += 1;
    }

    Ok(summary)
}

/// Returns `true` when the collective was not known yet.
fn register(
    store: &InMemoryStore,
    id: CollectiveId,
    kind: CollectiveKind,
    host_collective_id: Option<CollectiveId>,
) -> bool {
    if store.collective(id).is_some() {
        return false;
    }
    store.insert_collective(Collective {
        id,
        slug: format!("collective-{id}"),
        name: format!("Collective {id}"),
        kind,
        parent_collective_id: None,
        host_collective_id,
    });
    true
}
