use std::fmt;

use crate::domain::{CollectiveId, Expense, ExpenseStatus, PayoutMethod, PayoutMethodType, UserId};

/// Record attributes a storage query can constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    CollectiveId,
    FromCollectiveId,
    UserId,
    Status,
    Type,
    IsSaved,
}

impl Field {
    pub const fn column(self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::CollectiveId => "CollectiveId",
            Field::FromCollectiveId => "FromCollectiveId",
            Field::UserId => "UserId",
            Field::Status => "status",
            Field::Type => "type",
            Field::IsSaved => "isSaved",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterValue {
    Int(i64),
    Bool(bool),
    Text(String),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Int(value) => write!(f, "{value}"),
            FilterValue::Bool(value) => write!(f, "{value}"),
            FilterValue::Text(value) => write!(f, "'{value}'"),
        }
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Int(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl From<CollectiveId> for FilterValue {
    fn from(value: CollectiveId) -> Self {
        FilterValue::Int(value.0)
    }
}

impl From<UserId> for FilterValue {
    fn from(value: UserId) -> Self {
        FilterValue::Int(value.0)
    }
}

impl From<ExpenseStatus> for FilterValue {
    fn from(value: ExpenseStatus) -> Self {
        FilterValue::Text(value.label().to_string())
    }
}

impl From<PayoutMethodType> for FilterValue {
    fn from(value: PayoutMethodType) -> Self {
        FilterValue::Text(value.label().to_string())
    }
}

/// Storage-agnostic predicate passed to every collaborator query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq(Field, FilterValue),
    In(Field, Vec<FilterValue>),
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: Field, value: impl Into<FilterValue>) -> Self {
        Filter::Eq(field, value.into())
    }

    pub fn any_of<I, V>(field: Field, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FilterValue>,
    {
        Filter::In(field, values.into_iter().map(Into::into).collect())
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And(mut clauses) => {
                clauses.push(other);
                Filter::And(clauses)
            }
            clause => Filter::And(vec![clause, other]),
        }
    }

    pub fn matches<T: Filterable + ?Sized>(&self, record: &T) -> bool {
        match self {
            Filter::Eq(field, expected) => record.field(*field).as_ref() == Some(expected),
            Filter::In(field, values) => record
                .field(*field)
                .map(|actual| values.contains(&actual))
                .unwrap_or(false),
            Filter::And(clauses) => clauses.iter().all(|clause| clause.matches(record)),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Eq(field, value) => write!(f, "{} = {}", field.column(), value),
            Filter::In(field, values) => {
                let rendered: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "{} IN ({})", field.column(), rendered.join(", "))
            }
            Filter::And(clauses) => {
                let rendered: Vec<String> = clauses.iter().map(ToString::to_string).collect();
                write!(f, "{}", rendered.join(" AND "))
            }
        }
    }
}

/// Exposes the queryable attributes of a stored record.
pub trait Filterable {
    fn field(&self, field: Field) -> Option<FilterValue>;
}

impl Filterable for Expense {
    fn field(&self, field: Field) -> Option<FilterValue> {
        match field {
            Field::Id => Some(FilterValue::Int(self.id.0)),
            Field::CollectiveId => Some(self.collective_id.into()),
            Field::FromCollectiveId => Some(self.from_collective_id.into()),
            Field::UserId => Some(self.user_id.into()),
            Field::Status => Some(self.status.into()),
            Field::Type | Field::IsSaved => None,
        }
    }
}

impl Filterable for PayoutMethod {
    fn field(&self, field: Field) -> Option<FilterValue> {
        match field {
            Field::Id => Some(FilterValue::Int(self.id.0)),
            Field::CollectiveId => Some(self.collective_id.into()),
            Field::Type => Some(self.kind.into()),
            Field::IsSaved => Some(self.is_saved.into()),
            Field::FromCollectiveId | Field::UserId | Field::Status => None,
        }
    }
}
