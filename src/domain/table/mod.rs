//! Table domain - Partition-key/row-key table store abstraction

mod entity;
mod filter;
mod store;
mod validation;

pub use entity::{
    ContinuationToken, ETag, EntityPage, TableCreation, TableEntity, PARTITION_KEY, ROW_KEY,
    TIMESTAMP,
};
pub use filter::{Comparison, FilterClause, FilterValue, TableFilter};
pub use store::TableStore;
pub use validation::{
    validate_partition_key, validate_row_key, validate_table_name, TableValidationError,
};

#[cfg(test)]
pub use store::MockTableStore;
