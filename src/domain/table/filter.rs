//! Conjunctive filter expressions over table entities
//!
//! A [`TableFilter`] renders to the OData `$filter` syntax understood by the
//! table service and can also be evaluated locally against a [`TableEntity`].

use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;

use super::entity::{TableEntity, PARTITION_KEY, ROW_KEY};

/// Comparison operators supported by the table service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Comparison {
    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "eq"),
            Self::Ne => write!(f, "ne"),
            Self::Gt => write!(f, "gt"),
            Self::Ge => write!(f, "ge"),
            Self::Lt => write!(f, "lt"),
            Self::Le => write!(f, "le"),
        }
    }
}

/// Literal operand of a filter clause
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    String(String),
    Int(i64),
    Double(f64),
    Bool(bool),
}

impl FilterValue {
    fn to_odata(&self) -> String {
        match self {
            Self::String(s) => format!("'{}'", s.replace('\'', "''")),
            Self::Int(n) => n.to_string(),
            Self::Double(n) => format!("{:?}", n),
            Self::Bool(b) => b.to_string(),
        }
    }

    fn compare(&self, actual: &Value) -> Option<Ordering> {
        match (self, actual) {
            (Self::String(expected), Value::String(actual)) => Some(actual.as_str().cmp(expected)),
            (Self::Int(expected), Value::Number(actual)) => match actual.as_i64() {
                Some(actual) => Some(actual.cmp(expected)),
                None => actual.as_f64()?.partial_cmp(&(*expected as f64)),
            },
            (Self::Double(expected), Value::Number(actual)) => {
                actual.as_f64()?.partial_cmp(expected)
            }
            (Self::Bool(expected), Value::Bool(actual)) => Some(actual.cmp(expected)),
            _ => None,
        }
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for FilterValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for FilterValue {
    fn from(n: i32) -> Self {
        Self::Int(n as i64)
    }
}

impl From<f64> for FilterValue {
    fn from(n: f64) -> Self {
        Self::Double(n)
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// A single `property op literal` clause
#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    pub property: String,
    pub comparison: Comparison,
    pub value: FilterValue,
}

impl FilterClause {
    pub fn new(
        property: impl Into<String>,
        comparison: Comparison,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self {
            property: property.into(),
            comparison,
            value: value.into(),
        }
    }

    pub fn to_odata(&self) -> String {
        format!(
            "{} {} {}",
            self.property,
            self.comparison,
            self.value.to_odata()
        )
    }

    /// Evaluates the clause against an entity. A missing property or a type
    /// mismatch never matches, as on the service.
    pub fn matches(&self, entity: &TableEntity) -> bool {
        let key_value;
        let actual = match self.property.as_str() {
            PARTITION_KEY => {
                key_value = Value::String(entity.partition_key.clone());
                &key_value
            }
            ROW_KEY => {
                key_value = Value::String(entity.row_key.clone());
                &key_value
            }
            name => match entity.property(name) {
                Some(value) => value,
                None => return false,
            },
        };

        self.value
            .compare(actual)
            .is_some_and(|ordering| self.comparison.accepts(ordering))
    }
}

/// Conjunction of clauses; an empty filter matches every entity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableFilter {
    clauses: Vec<FilterClause>,
}

impl TableFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, clause: FilterClause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn and_where(
        self,
        property: impl Into<String>,
        comparison: Comparison,
        value: impl Into<FilterValue>,
    ) -> Self {
        self.and(FilterClause::new(property, comparison, value))
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Renders the `$filter` expression, or `None` when there is nothing to filter on
    pub fn to_odata(&self) -> Option<String> {
        if self.clauses.is_empty() {
            return None;
        }

        Some(
            self.clauses
                .iter()
                .map(FilterClause::to_odata)
                .collect::<Vec<_>>()
                .join(" and "),
        )
    }

    pub fn matches(&self, entity: &TableEntity) -> bool {
        self.clauses.iter().all(|clause| clause.matches(entity))
    }
}
