//! Table store trait definition

use async_trait::async_trait;

use super::entity::{ContinuationToken, ETag, EntityPage, TableCreation, TableEntity};
use super::filter::TableFilter;
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Primitive operations of a partition-key/row-key table service.
///
/// Every method is a single round trip. Implementations report a duplicate
/// identity on insert and a stale ETag on replace as [`DomainError::Conflict`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Creates the table if it does not exist yet
    async fn create_table(&self, table: &str) -> Result<TableCreation, DomainError>;

    /// Inserts a new entity, returns the stored entity with its ETag
    async fn insert_entity(
        &self,
        table: &str,
        entity: &TableEntity,
    ) -> Result<TableEntity, DomainError>;

    /// Point read by identity
    async fn get_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<TableEntity>, DomainError>;

    /// Fetches one page of entities matching the filter
    async fn query_entities(
        &self,
        table: &str,
        filter: &TableFilter,
        page_size: usize,
        continuation: Option<ContinuationToken>,
    ) -> Result<EntityPage, DomainError>;

    /// Replaces every property of an existing entity if its ETag still matches,
    /// returns the new ETag
    async fn replace_entity(
        &self,
        table: &str,
        entity: &TableEntity,
        etag: &ETag,
    ) -> Result<ETag, DomainError>;

    /// Unconditionally deletes an entity, returns false if it did not exist
    async fn delete_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<bool, DomainError>;
}
