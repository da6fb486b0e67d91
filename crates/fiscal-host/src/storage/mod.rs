//! Collaborator contracts for the storage layer.
//!
//! The engine and loaders receive implementations of these traits by injection; nothing in the
//! crate reaches for a process-wide model registry. `InMemoryStore` backs the service and tests.

pub mod filter;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    CollectiveId, ExpenseId, ExpenseStatus, PayoutMethod, PayoutMethodId, UserId,
};
use crate::security::ResolvedExpense;

pub use filter::{Field, Filter, FilterValue, Filterable};
pub use memory::InMemoryStore;

/// Aggregate over the historical expenses sharing a (collective, status) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseStat {
    pub collective_id: CollectiveId,
    pub status: ExpenseStatus,
    pub count: u64,
    pub amount_avg: f64,
    /// Sample standard deviation; absent when the group holds a single expense.
    pub amount_stddev: Option<f64>,
    pub last_created_at: DateTime<Utc>,
}

/// Grouped-aggregate queries over historical expenses.
#[async_trait]
pub trait ExpenseStatsStore: Send + Sync {
    /// Rows grouped by (collective, status), most recently active group first.
    async fn expense_stats(&self, filter: &Filter) -> Result<Vec<ExpenseStat>, StorageError>;
}

#[async_trait]
pub trait PayoutMethodStore: Send + Sync {
    async fn find_payout_methods(&self, filter: &Filter)
        -> Result<Vec<PayoutMethod>, StorageError>;
}

/// Loads an expense together with every entity the security checks read.
#[async_trait]
pub trait ExpenseResolver: Send + Sync {
    async fn resolve_expense(&self, id: ExpenseId) -> Result<ResolvedExpense, ResolutionError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("unsupported query: {0}")]
    UnsupportedQuery(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("expense {0} not found")]
    ExpenseNotFound(ExpenseId),
    #[error("user {0} not found")]
    UserNotFound(UserId),
    #[error("collective {0} not found")]
    CollectiveNotFound(CollectiveId),
    #[error("payout method {0} not found")]
    PayoutMethodNotFound(PayoutMethodId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
