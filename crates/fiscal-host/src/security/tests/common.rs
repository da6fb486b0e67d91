use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::domain::{
    Collective, CollectiveId, CollectiveKind, Expense, ExpenseId, ExpenseStatus, MemberRole,
    Membership, User, UserId,
};
use crate::security::SecurityCheckEngine;
use crate::storage::{ExpenseStat, ExpenseStatsStore, Filter, InMemoryStore, StorageError};

pub(super) const AUTHOR: UserId = UserId(1);
pub(super) const AUTHOR_PROFILE: CollectiveId = CollectiveId(100);
pub(super) const COLLECTIVE: CollectiveId = CollectiveId(10);
pub(super) const HOST: CollectiveId = CollectiveId(5);
pub(super) const SUBMITTED: ExpenseId = ExpenseId(100);

pub(super) fn at(day: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap() + Duration::days(day)
}

pub(super) fn collective(id: CollectiveId, kind: CollectiveKind) -> Collective {
    Collective {
        id,
        slug: format!("collective-{id}"),
        name: format!("Collective {id}"),
        kind,
        parent_collective_id: None,
        host_collective_id: None,
    }
}

pub(super) fn expense(id: i64, status: ExpenseStatus, amount: i64, day: i64) -> Expense {
    Expense {
        id: ExpenseId(id),
        user_id: AUTHOR,
        from_collective_id: AUTHOR_PROFILE,
        collective_id: COLLECTIVE,
        host_collective_id: None,
        payout_method_id: None,
        amount,
        currency: "USD".to_string(),
        status,
        description: format!("expense #{id}"),
        created_at: at(day),
        updated_at: at(day),
    }
}

/// Collective hosted by `HOST`, plus the author and their profile.
pub(super) fn base_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    store.insert_collective(collective(HOST, CollectiveKind::Organization));
    store.insert_collective(Collective {
        host_collective_id: Some(HOST),
        ..collective(COLLECTIVE, CollectiveKind::Collective)
    });
    store.insert_collective(collective(AUTHOR_PROFILE, CollectiveKind::User));
    store.insert_user(User {
        id: AUTHOR,
        collective_id: AUTHOR_PROFILE,
        two_factor_enabled: false,
    });
    store
}

/// Four paid expenses at 1000e2, two spam ones, and a new 2000e2 submission.
pub(super) fn history_store() -> InMemoryStore {
    let store = base_store();
    for (offset, id) in (1..=4).enumerate() {
        store.insert_expense(expense(id, ExpenseStatus::Paid, 1000_00, offset as i64));
    }
    store.insert_expense(expense(5, ExpenseStatus::Spam, 50_00, 10));
    store.insert_expense(expense(6, ExpenseStatus::Spam, 70_00, 11));
    store.insert_expense(expense(SUBMITTED.0, ExpenseStatus::Pending, 2000_00, 20));
    store
}

pub(super) fn grant_admin(store: &InMemoryStore, member: CollectiveId, collective: CollectiveId) {
    store.insert_membership(Membership {
        member_collective_id: member,
        collective_id: collective,
        role: MemberRole::Admin,
    });
}

pub(super) fn engine_for(
    store: InMemoryStore,
) -> SecurityCheckEngine<InMemoryStore, InMemoryStore> {
    let shared = Arc::new(store);
    SecurityCheckEngine::new(shared.clone(), shared)
}

pub(super) fn paid_stat(amount_avg: f64, amount_stddev: Option<f64>) -> ExpenseStat {
    ExpenseStat {
        collective_id: COLLECTIVE,
        status: ExpenseStatus::Paid,
        count: 3,
        amount_avg,
        amount_stddev,
        last_created_at: at(3),
    }
}

/// Returns the same rows for every query and records the filters it saw.
#[derive(Default)]
pub(super) struct StaticStats {
    pub(super) rows: Vec<ExpenseStat>,
    pub(super) filters: Mutex<Vec<String>>,
}

impl StaticStats {
    pub(super) fn new(rows: Vec<ExpenseStat>) -> Self {
        Self {
            rows,
            filters: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn filters(&self) -> Vec<String> {
        self.filters.lock().expect("filter mutex poisoned").clone()
    }
}

#[async_trait]
impl ExpenseStatsStore for StaticStats {
    async fn expense_stats(&self, filter: &Filter) -> Result<Vec<ExpenseStat>, StorageError> {
        self.filters
            .lock()
            .expect("filter mutex poisoned")
            .push(filter.to_string());
        Ok(self.rows.clone())
    }
}

pub(super) struct UnavailableStats;

#[async_trait]
impl ExpenseStatsStore for UnavailableStats {
    async fn expense_stats(&self, _filter: &Filter) -> Result<Vec<ExpenseStat>, StorageError> {
        Err(StorageError::Unavailable("replica offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
