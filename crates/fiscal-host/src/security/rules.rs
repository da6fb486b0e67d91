use serde_json::json;

use crate::domain::Expense;
use crate::storage::ExpenseStat;

use super::{Level, ResolvedExpense, Scope, SecurityCheck};

/// Rule evaluated once against the resolved expense.
pub trait ExpenseRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn evaluate(&self, expense: &ResolvedExpense) -> Option<SecurityCheck>;
}

/// Rule evaluated once per scope against that scope's historical stats.
pub trait StatsRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn evaluate(&self, context: &StatsContext<'_>) -> Option<SecurityCheck>;
}

/// Rounded stats for one scope, alongside the expense being checked.
#[derive(Debug, Clone, Copy)]
pub struct StatsContext<'a> {
    pub scope: Scope,
    pub expense: &'a Expense,
    pub stats: &'a [ExpenseStat],
}

impl<'a> StatsContext<'a> {
    pub fn new(scope: Scope, expense: &'a Expense, stats: &'a [ExpenseStat]) -> Self {
        Self {
            scope,
            expense,
            stats,
        }
    }

    /// The PAID group for the collective the expense is submitted to.
    pub fn paid_in_collective(&self) -> Option<&'a ExpenseStat> {
        self.stats
            .iter()
            .find(|stat| stat.is_paid_in(self.expense.collective_id))
    }

    pub fn spam_or_rejected(&self) -> Vec<&'a ExpenseStat> {
        self.stats
            .iter()
            .filter(|stat| stat.is_spam_or_rejected())
            .collect()
    }
}

pub fn default_expense_rules() -> Vec<Box<dyn ExpenseRule>> {
    vec![
        Box::new(TwoFactorRule),
        Box::new(CollectiveAdminRule),
        Box::new(HostAdminRule),
    ]
}

pub fn default_stats_rules() -> Vec<Box<dyn StatsRule>> {
    vec![
        Box::new(SpamOrRejectedRule),
        Box::new(PaymentHistoryRule),
        Box::new(AmountAnomalyRule),
    ]
}

pub struct TwoFactorRule;

impl ExpenseRule for TwoFactorRule {
    fn name(&self) -> &'static str {
        "two_factor"
    }

    fn evaluate(&self, expense: &ResolvedExpense) -> Option<SecurityCheck> {
        let check = if expense.author.has_two_factor_authentication() {
            SecurityCheck::new(Scope::Author, Level::Pass, "Author has 2FA enabled")
        } else {
            SecurityCheck::new(Scope::Author, Level::Medium, "Author is not using 2FA")
        };
        Some(check)
    }
}

pub struct CollectiveAdminRule;

impl ExpenseRule for CollectiveAdminRule {
    fn name(&self) -> &'static str {
        "collective_admin"
    }

    fn evaluate(&self, expense: &ResolvedExpense) -> Option<SecurityCheck> {
        expense
            .author
            .is_admin_of_collective(&expense.collective)
            .then(|| {
                SecurityCheck::new(
                    Scope::Author,
                    Level::Pass,
                    "Author is the admin of the collective",
                )
            })
    }
}

pub struct HostAdminRule;

impl ExpenseRule for HostAdminRule {
    fn name(&self) -> &'static str {
        "host_admin"
    }

    fn evaluate(&self, expense: &ResolvedExpense) -> Option<SecurityCheck> {
        let host_id = expense.host_collective_id()?;
        expense.author.is_admin(host_id).then(|| {
            SecurityCheck::new(
                Scope::Author,
                Level::Pass,
                "Author is the admin of the fiscal host",
            )
        })
    }
}

pub struct SpamOrRejectedRule;

impl StatsRule for SpamOrRejectedRule {
    fn name(&self) -> &'static str {
        "spam_or_rejected"
    }

    fn evaluate(&self, context: &StatsContext<'_>) -> Option<SecurityCheck> {
        let flagged = context.spam_or_rejected();
        if flagged.is_empty() {
            return None;
        }

        let message = format!(
            "{} has expenses that were previously rejected or marked as SPAM",
            context.scope.capitalized()
        );
        Some(SecurityCheck::new(context.scope, Level::High, message).with_meta(json!(flagged)))
    }
}

pub struct PaymentHistoryRule;

impl StatsRule for PaymentHistoryRule {
    fn name(&self) -> &'static str {
        "payment_history"
    }

    fn evaluate(&self, context: &StatsContext<'_>) -> Option<SecurityCheck> {
        let scope = context.scope;
        let check = match context.paid_in_collective() {
            Some(paid) if paid.count > 0 => SecurityCheck::new(
                scope,
                Level::Pass,
                format!(
                    "{} was successfully paid {} times by this collective",
                    scope.capitalized(),
                    paid.count
                ),
            )
            .with_meta(json!(paid)),
            _ => SecurityCheck::new(
                scope,
                Level::Low,
                format!("{} has never been paid by this collective", scope.capitalized()),
            ),
        };
        Some(check)
    }
}

/// Flags amounts above the average plus one deviation of past payments.
///
/// The comparison runs against the rounded figures, so a boundary value can flip depending on
/// the rounding; that matches what reviewers see in the message.
pub struct AmountAnomalyRule;

impl StatsRule for AmountAnomalyRule {
    fn name(&self) -> &'static str {
        "amount_anomaly"
    }

    fn evaluate(&self, context: &StatsContext<'_>) -> Option<SecurityCheck> {
        let paid = context.paid_in_collective()?;
        if (context.expense.amount as f64) <= paid.normal_amount_ceiling() {
            return None;
        }

        let message = format!(
            "Expense amount is above normal for this {}: avg. {}",
            context.scope.capitalized(),
            paid.amount_avg
        );
        Some(SecurityCheck::new(context.scope, Level::Medium, message).with_meta(json!(paid)))
    }
}
