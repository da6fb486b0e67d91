use crate::domain::{CollectiveId, ExpenseStatus};
use crate::storage::ExpenseStat;

use super::CheckError;

const DISPLAY_PRECISION: i32 = 2;

/// Round half up at a decimal precision by shifting the decimal exponent in text form.
///
/// Multiplying by a power of ten would turn `1.005` into `100.49999999999999`; shifting the
/// exponent keeps the shortest decimal representation and rounds it to `1.01`.
pub fn round_to(value: f64, precision: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }

    let shifted = match format!("{value}e{precision}").parse::<f64>() {
        Ok(shifted) => shifted,
        Err(_) => return value,
    };
    let rounded = (shifted + 0.5).floor();
    format!("{rounded}e{}", -precision)
        .parse::<f64>()
        .unwrap_or(value)
}

impl ExpenseStat {
    /// Copy with the average and deviation rounded for display and threshold checks.
    pub fn rounded(&self) -> ExpenseStat {
        ExpenseStat {
            amount_avg: round_to(self.amount_avg, DISPLAY_PRECISION),
            amount_stddev: self
                .amount_stddev
                .map(|stddev| round_to(stddev, DISPLAY_PRECISION)),
            ..self.clone()
        }
    }

    pub fn is_paid_in(&self, collective_id: CollectiveId) -> bool {
        self.status == ExpenseStatus::Paid && self.collective_id == collective_id
    }

    pub fn is_spam_or_rejected(&self) -> bool {
        matches!(self.status, ExpenseStatus::Spam | ExpenseStatus::Rejected)
    }

    /// Upper bound of a "normal" amount: average plus one deviation.
    pub fn normal_amount_ceiling(&self) -> f64 {
        self.amount_avg + self.amount_stddev.unwrap_or(0.0)
    }
}

/// Reject aggregate rows no grouped query can legitimately produce.
pub(crate) fn validate(stat: &ExpenseStat) -> Result<(), CheckError> {
    let malformed = |reason: &str| CheckError::MalformedStat {
        collective_id: stat.collective_id,
        status: stat.status,
        reason: reason.to_string(),
    };

    if stat.count == 0 {
        return Err(malformed("group has no expenses"));
    }
    if !stat.amount_avg.is_finite() {
        return Err(malformed("average amount is not a finite number"));
    }
    if let Some(stddev) = stat.amount_stddev {
        if !stddev.is_finite() || stddev < 0.0 {
            return Err(malformed("standard deviation must be finite and non-negative"));
        }
    }
    Ok(())
}

/// Validate then round every row, preserving the store's ordering.
pub(crate) fn prepare(stats: Vec<ExpenseStat>) -> Result<Vec<ExpenseStat>, CheckError> {
    stats
        .into_iter()
        .map(|stat| validate(&stat).map(|_| stat.rounded()))
        .collect()
}
