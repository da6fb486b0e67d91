use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{
    ExpenseResolver, ExpenseStat, ExpenseStatsStore, Filter, PayoutMethodStore, ResolutionError,
    StorageError,
};
use crate::domain::{
    Collective, CollectiveId, Expense, ExpenseId, ExpenseStatus, Membership, PayoutMethod, User,
    UserId,
};
use crate::security::{Author, ResolvedExpense, RoleSet};

#[derive(Debug, Default)]
struct Tables {
    collectives: HashMap<CollectiveId, Collective>,
    users: HashMap<UserId, User>,
    memberships: Vec<Membership>,
    payout_methods: Vec<PayoutMethod>,
    expenses: BTreeMap<ExpenseId, Expense>,
}

/// Process-local store implementing every storage collaborator.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().expect("store mutex poisoned")
    }

    pub fn insert_collective(&self, collective: Collective) {
        self.tables().collectives.insert(collective.id, collective);
    }

    pub fn insert_user(&self, user: User) {
        self.tables().users.insert(user.id, user);
    }

    pub fn insert_membership(&self, membership: Membership) {
        let mut tables = self.tables();
        if !tables.memberships.contains(&membership) {
            tables.memberships.push(membership);
        }
    }

    pub fn insert_payout_method(&self, payout_method: PayoutMethod) {
        let mut tables = self.tables();
        tables
            .payout_methods
            .retain(|existing| existing.id != payout_method.id);
        tables.payout_methods.push(payout_method);
    }

    /// Insert or replace an expense by id.
    pub fn insert_expense(&self, expense: Expense) {
        self.tables().expenses.insert(expense.id, expense);
    }

    pub fn expense(&self, id: ExpenseId) -> Option<Expense> {
        self.tables().expenses.get(&id).cloned()
    }

    pub fn collective(&self, id: CollectiveId) -> Option<Collective> {
        self.tables().collectives.get(&id).cloned()
    }

    pub fn user(&self, id: UserId) -> Option<User> {
        self.tables().users.get(&id).cloned()
    }
}

#[async_trait]
impl ExpenseStatsStore for InMemoryStore {
    async fn expense_stats(&self, filter: &Filter) -> Result<Vec<ExpenseStat>, StorageError> {
        let tables = self.tables();
        let mut groups: BTreeMap<(CollectiveId, ExpenseStatus), Vec<&Expense>> = BTreeMap::new();
        for expense in tables.expenses.values() {
            if filter.matches(expense) {
                groups
                    .entry((expense.collective_id, expense.status))
                    .or_default()
                    .push(expense);
            }
        }

        let mut stats: Vec<ExpenseStat> = groups
            .into_iter()
            .filter_map(|((collective_id, status), expenses)| {
                aggregate(collective_id, status, &expenses)
            })
            .collect();
        stats.sort_by(|a, b| b.last_created_at.cmp(&a.last_created_at));
        Ok(stats)
    }
}

fn aggregate(
    collective_id: CollectiveId,
    status: ExpenseStatus,
    expenses: &[&Expense],
) -> Option<ExpenseStat> {
    let last_created_at = expenses.iter().map(|expense| expense.created_at).max()?;
    let count = expenses.len();
    let mean = expenses.iter().map(|expense| expense.amount as f64).sum::<f64>() / count as f64;
    let amount_stddev = if count > 1 {
        let squares: f64 = expenses
            .iter()
            .map(|expense| (expense.amount as f64 - mean).powi(2))
            .sum();
        Some((squares / (count - 1) as f64).sqrt())
    } else {
        None
    };

    Some(ExpenseStat {
        collective_id,
        status,
        count: count as u64,
        amount_avg: mean,
        amount_stddev,
        last_created_at,
    })
}

#[async_trait]
impl PayoutMethodStore for InMemoryStore {
    async fn find_payout_methods(
        &self,
        filter: &Filter,
    ) -> Result<Vec<PayoutMethod>, StorageError> {
        let tables = self.tables();
        Ok(tables
            .payout_methods
            .iter()
            .filter(|payout_method| filter.matches(*payout_method))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ExpenseResolver for InMemoryStore {
    async fn resolve_expense(&self, id: ExpenseId) -> Result<ResolvedExpense, ResolutionError> {
        let tables = self.tables();
        let expense = tables
            .expenses
            .get(&id)
            .cloned()
            .ok_or(ResolutionError::ExpenseNotFound(id))?;
        let lookup_collective = |collective_id: CollectiveId| {
            tables
                .collectives
                .get(&collective_id)
                .cloned()
                .ok_or(ResolutionError::CollectiveNotFound(collective_id))
        };
        let collective = lookup_collective(expense.collective_id)?;
        let from_collective = lookup_collective(expense.from_collective_id)?;

        let user = tables
            .users
            .get(&expense.user_id)
            .cloned()
            .ok_or(ResolutionError::UserNotFound(expense.user_id))?;
        let roles = RoleSet::for_member(user.collective_id, &tables.memberships);

        let payout_method = match expense.payout_method_id {
            Some(payout_method_id) => Some(
                tables
                    .payout_methods
                    .iter()
                    .find(|payout_method| payout_method.id == payout_method_id)
                    .cloned()
                    .ok_or(ResolutionError::PayoutMethodNotFound(payout_method_id))?,
            ),
            None => None,
        };

        Ok(ResolvedExpense {
            expense,
            collective,
            from_collective,
            author: Author::new(user, roles),
            payout_method,
        })
    }
}
