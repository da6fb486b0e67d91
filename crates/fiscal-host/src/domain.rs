use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of a submitted expense.
    ExpenseId
);
id_type!(
    /// Identifier of a user account.
    UserId
);
id_type!(
    /// Identifier of any collective profile (users, organizations, hosts, events...).
    CollectiveId
);
id_type!(PayoutMethodId);

/// Account types a collective profile can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectiveKind {
    User,
    Organization,
    Collective,
    Fund,
    Event,
    Project,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collective {
    pub id: CollectiveId,
    pub slug: String,
    pub name: String,
    pub kind: CollectiveKind,
    #[serde(default)]
    pub parent_collective_id: Option<CollectiveId>,
    #[serde(default)]
    pub host_collective_id: Option<CollectiveId>,
}

impl Collective {
    /// Events and projects inherit their admins from the parent collective.
    pub fn inherits_parent_admins(&self) -> bool {
        matches!(self.kind, CollectiveKind::Event | CollectiveKind::Project)
    }
}

/// A user account; `collective_id` points at the user's own profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub collective_id: CollectiveId,
    pub two_factor_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberRole {
    Admin,
    Member,
    Accountant,
    Host,
}

/// Links a member profile to a collective with a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub member_collective_id: CollectiveId,
    pub collective_id: CollectiveId,
    pub role: MemberRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutMethodType {
    Paypal,
    BankAccount,
    Other,
    AccountBalance,
    CreditCard,
}

impl PayoutMethodType {
    pub const fn label(self) -> &'static str {
        match self {
            PayoutMethodType::Paypal => "PAYPAL",
            PayoutMethodType::BankAccount => "BANK_ACCOUNT",
            PayoutMethodType::Other => "OTHER",
            PayoutMethodType::AccountBalance => "ACCOUNT_BALANCE",
            PayoutMethodType::CreditCard => "CREDIT_CARD",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutMethod {
    pub id: PayoutMethodId,
    pub collective_id: CollectiveId,
    pub kind: PayoutMethodType,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
    pub is_saved: bool,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle states of an expense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpenseStatus {
    Draft,
    Unverified,
    Pending,
    Incomplete,
    Approved,
    Rejected,
    Processing,
    Error,
    ScheduledForPayment,
    Paid,
    Spam,
    Canceled,
}

impl ExpenseStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ExpenseStatus::Draft => "DRAFT",
            ExpenseStatus::Unverified => "UNVERIFIED",
            ExpenseStatus::Pending => "PENDING",
            ExpenseStatus::Incomplete => "INCOMPLETE",
            ExpenseStatus::Approved => "APPROVED",
            ExpenseStatus::Rejected => "REJECTED",
            ExpenseStatus::Processing => "PROCESSING",
            ExpenseStatus::Error => "ERROR",
            ExpenseStatus::ScheduledForPayment => "SCHEDULED_FOR_PAYMENT",
            ExpenseStatus::Paid => "PAID",
            ExpenseStatus::Spam => "SPAM",
            ExpenseStatus::Canceled => "CANCELED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let status = match raw.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => ExpenseStatus::Draft,
            "UNVERIFIED" => ExpenseStatus::Unverified,
            "PENDING" => ExpenseStatus::Pending,
            "INCOMPLETE" => ExpenseStatus::Incomplete,
            "APPROVED" => ExpenseStatus::Approved,
            "REJECTED" => ExpenseStatus::Rejected,
            "PROCESSING" => ExpenseStatus::Processing,
            "ERROR" => ExpenseStatus::Error,
            "SCHEDULED_FOR_PAYMENT" => ExpenseStatus::ScheduledForPayment,
            "PAID" => ExpenseStatus::Paid,
            "SPAM" => ExpenseStatus::Spam,
            "CANCELED" => ExpenseStatus::Canceled,
            _ => return None,
        };
        Some(status)
    }
}

impl fmt::Display for ExpenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An expense submitted by a user on behalf of a payee profile.
///
/// `amount` is expressed in the smallest currency unit (cents).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub user_id: UserId,
    pub from_collective_id: CollectiveId,
    pub collective_id: CollectiveId,
    #[serde(default)]
    pub host_collective_id: Option<CollectiveId>,
    #[serde(default)]
    pub payout_method_id: Option<PayoutMethodId>,
    pub amount: i64,
    pub currency: String,
    pub status: ExpenseStatus,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_labels_round_trip_through_parse() {
        for status in [
            ExpenseStatus::Pending,
            ExpenseStatus::ScheduledForPayment,
            ExpenseStatus::Spam,
        ] {
            assert_eq!(ExpenseStatus::parse(status.label()), Some(status));
        }
        assert_eq!(ExpenseStatus::parse(" paid "), Some(ExpenseStatus::Paid));
        assert_eq!(ExpenseStatus::parse("LOST"), None);
    }

    #[test]
    fn status_serializes_in_screaming_case() {
        let json = serde_json::to_string(&ExpenseStatus::ScheduledForPayment).expect("serializes");
        assert_eq!(json, "\"SCHEDULED_FOR_PAYMENT\"");
    }
}
