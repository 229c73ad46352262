//! Subscriber search criteria

use super::entity::{property, Subscriber};
use crate::domain::table::{Comparison, TableFilter, PARTITION_KEY, ROW_KEY};

/// Upper bound appended to a name prefix to form a range query
pub const PREFIX_SENTINEL: char = '~';

/// Partial search criteria; every present criterion is ANDed.
///
/// Balances are stored as text, so the table service cannot compare them
/// numerically. `min_balance` is therefore not part of [`Self::to_table_filter`]
/// and is applied to the mapped records via [`Self::accepts_balance`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriberFilter {
    pub partition_key: Option<String>,
    pub row_key: Option<String>,
    pub name_prefix: Option<String>,
    pub min_balance: Option<f64>,
}

impl SubscriberFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_partition_key(mut self, partition_key: impl Into<String>) -> Self {
        self.partition_key = Some(partition_key.into());
        self
    }

    pub fn with_row_key(mut self, row_key: impl Into<String>) -> Self {
        self.row_key = Some(row_key.into());
        self
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(prefix.into());
        self
    }

    pub fn with_min_balance(mut self, min_balance: f64) -> Self {
        self.min_balance = Some(min_balance);
        self
    }

    /// Clauses the table service can evaluate
    pub fn to_table_filter(&self) -> TableFilter {
        let mut filter = TableFilter::new();

        if let Some(ref row_key) = self.row_key {
            filter = filter.and_where(ROW_KEY, Comparison::Eq, row_key.as_str());
        }

        if let Some(ref partition_key) = self.partition_key {
            filter = filter.and_where(PARTITION_KEY, Comparison::Eq, partition_key.as_str());
        }

        if let Some(ref prefix) = self.name_prefix {
            let upper = format!("{}{}", prefix, PREFIX_SENTINEL);
            filter = filter
                .and_where(property::NAME, Comparison::Ge, prefix.as_str())
                .and_where(property::NAME, Comparison::Lt, upper);
        }

        filter
    }

    /// Renders the complete criteria, including the balance bound, for display
    pub fn describe(&self) -> String {
        let mut parts: Vec<String> = self.to_table_filter().to_odata().into_iter().collect();

        if let Some(min_balance) = self.min_balance {
            parts.push(format!("{} ge {:?}", property::BALANCE, min_balance));
        }

        if parts.is_empty() {
            "(all records)".to_string()
        } else {
            parts.join(" and ")
        }
    }

    pub fn accepts_balance(&self, subscriber: &Subscriber) -> bool {
        match self.min_balance {
            Some(min_balance) => subscriber
                .balance
                .is_some_and(|balance| balance >= min_balance),
            None => true,
        }
    }
}
