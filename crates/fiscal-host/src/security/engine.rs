use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::{Expense, ExpenseId};
use crate::storage::{ExpenseResolver, ExpenseStat, ExpenseStatsStore, Field, Filter};

use super::rules::{default_expense_rules, default_stats_rules, ExpenseRule, StatsContext, StatsRule};
use super::{highest_level, stats, CheckError, ResolvedExpense, Scope, SecurityCheck};

/// Runs the ordered rule set against an expense and its history.
pub struct SecurityCheckEngine<R, S> {
    resolver: Arc<R>,
    stats: Arc<S>,
    expense_rules: Vec<Box<dyn ExpenseRule>>,
    stats_rules: Vec<Box<dyn StatsRule>>,
}

impl<R, S> SecurityCheckEngine<R, S>
where
    R: ExpenseResolver + 'static,
    S: ExpenseStatsStore + 'static,
{
    pub fn new(resolver: Arc<R>, stats: Arc<S>) -> Self {
        Self {
            resolver,
            stats,
            expense_rules: default_expense_rules(),
            stats_rules: default_stats_rules(),
        }
    }

    /// Replace the ordered rule lists.
    pub fn with_rules(
        mut self,
        expense_rules: Vec<Box<dyn ExpenseRule>>,
        stats_rules: Vec<Box<dyn StatsRule>>,
    ) -> Self {
        self.expense_rules = expense_rules;
        self.stats_rules = stats_rules;
        self
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.expense_rules
            .iter()
            .map(|rule| rule.name())
            .chain(self.stats_rules.iter().map(|rule| rule.name()))
            .collect()
    }

    /// Reload `expense` with its related entities and evaluate every rule.
    pub async fn evaluate(&self, expense: &Expense) -> Result<Vec<SecurityCheck>, CheckError> {
        self.evaluate_by_id(expense.id).await
    }

    pub async fn evaluate_by_id(&self, id: ExpenseId) -> Result<Vec<SecurityCheck>, CheckError> {
        let resolved = self.resolver.resolve_expense(id).await?;
        let author_is_payee = resolved.author_is_payee();

        let mut checks: Vec<SecurityCheck> = self
            .expense_rules
            .iter()
            .filter_map(|rule| rule.evaluate(&resolved))
            .collect();

        let mut scopes = vec![(
            Scope::Author,
            Filter::eq(Field::UserId, resolved.expense.user_id),
        )];
        if !author_is_payee {
            scopes.push((
                Scope::Payee,
                Filter::eq(Field::FromCollectiveId, resolved.expense.from_collective_id),
            ));
        }

        for (scope, filter) in scopes {
            let stats = self.scope_stats(scope, &filter).await?;
            self.apply_stats_rules(scope, &resolved, &stats, &mut checks);
        }

        info!(
            expense_id = %id,
            findings = checks.len(),
            highest = highest_level(&checks).map(|level| level.label()).unwrap_or("NONE"),
            "security checks evaluated"
        );
        Ok(checks)
    }

    async fn scope_stats(
        &self,
        scope: Scope,
        filter: &Filter,
    ) -> Result<Vec<ExpenseStat>, CheckError> {
        let raw = self.stats.expense_stats(filter).await?;
        let rounded = stats::prepare(raw)?;
        debug!(%scope, %filter, groups = rounded.len(), stats = ?rounded, "loaded expense stats");
        Ok(rounded)
    }

    fn apply_stats_rules(
        &self,
        scope: Scope,
        resolved: &ResolvedExpense,
        stats: &[ExpenseStat],
        checks: &mut Vec<SecurityCheck>,
    ) {
        let context = StatsContext::new(scope, &resolved.expense, stats);
        checks.extend(
            self.stats_rules
                .iter()
                .filter_map(|rule| rule.evaluate(&context)),
        );
    }
}
