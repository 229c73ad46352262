//! In-memory table store implementation

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::table::{
    ContinuationToken, ETag, EntityPage, TableCreation, TableEntity, TableFilter, TableStore,
};
use crate::domain::DomainError;

type EntityKey = (String, String);
type Table = BTreeMap<EntityKey, TableEntity>;

/// Thread-safe in-memory table store
///
/// Mirrors the service semantics the client relies on: ordered
/// `(PartitionKey, RowKey)` iteration, continuation tokens, per-write ETags,
/// duplicate-insert and stale-ETag conflicts. Data is lost when the process
/// terminates.
#[derive(Debug, Default)]
pub struct InMemoryTableStore {
    tables: RwLock<HashMap<String, Table>>,
    version: AtomicU64,
}

impl InMemoryTableStore {
    /// Creates a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn next_etag(&self) -> ETag {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        ETag::new(format!("W/\"{}\"", version))
    }

    /// Copy of `entity` carrying a fresh timestamp and ETag
    fn stamp(&self, entity: &TableEntity) -> (TableEntity, ETag) {
        let etag = self.next_etag();
        let mut stored = entity.clone();
        stored.timestamp = Some(Utc::now());
        stored.etag = Some(etag.clone());
        (stored, etag)
    }
}

fn table_not_found(table: &str) -> DomainError {
    DomainError::not_found(format!("Table '{}' does not exist", table))
}

fn key(partition_key: &str, row_key: &str) -> EntityKey {
    (partition_key.to_string(), row_key.to_string())
}

#[async_trait]
impl TableStore for InMemoryTableStore {
    async fn create_table(&self, table: &str) -> Result<TableCreation, DomainError> {
        let mut tables = self.tables.write().map_err(|e| {
            DomainError::storage(format!("Failed to acquire write lock: {}", e))
        })?;

        if tables.contains_key(table) {
            return Ok(TableCreation::AlreadyExists);
        }

        tables.insert(table.to_string(), Table::new());
        Ok(TableCreation::Created)
    }

    async fn insert_entity(
        &self,
        table: &str,
        entity: &TableEntity,
    ) -> Result<TableEntity, DomainError> {
        let mut tables = self.tables.write().map_err(|e| {
            DomainError::storage(format!("Failed to acquire write lock: {}", e))
        })?;
        let rows = tables.get_mut(table).ok_or_else(|| table_not_found(table))?;

        let key = key(&entity.partition_key, &entity.row_key);
        if rows.contains_key(&key) {
            return Err(DomainError::conflict(format!(
                "Entity '{}/{}' already exists",
                entity.partition_key, entity.row_key
            )));
        }

        let (stored, _) = self.stamp(entity);
        rows.insert(key, stored.clone());
        Ok(stored)
    }

    async fn get_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<TableEntity>, DomainError> {
        let tables = self.tables.read().map_err(|e| {
            DomainError::storage(format!("Failed to acquire read lock: {}", e))
        })?;
        let rows = tables.get(table).ok_or_else(|| table_not_found(table))?;

        Ok(rows.get(&key(partition_key, row_key)).cloned())
    }

    async fn query_entities(
        &self,
        table: &str,
        filter: &TableFilter,
        page_size: usize,
        continuation: Option<ContinuationToken>,
    ) -> Result<EntityPage, DomainError> {
        let tables = self.tables.read().map_err(|e| {
            DomainError::storage(format!("Failed to acquire read lock: {}", e))
        })?;
        let rows = tables.get(table).ok_or_else(|| table_not_found(table))?;

        let start = match continuation {
            Some(token) => Bound::Included(key(
                &token.next_partition_key,
                token.next_row_key.as_deref().unwrap_or_default(),
            )),
            None => Bound::Unbounded,
        };

        let mut matching = rows
            .range((start, Bound::Unbounded))
            .map(|(_, entity)| entity)
            .filter(|entity| filter.matches(entity));

        let entities: Vec<TableEntity> = matching
            .by_ref()
            .take(page_size.max(1))
            .cloned()
            .collect();

        let continuation = matching.next().map(|next| ContinuationToken {
            next_partition_key: next.partition_key.clone(),
            next_row_key: Some(next.row_key.clone()),
        });

        Ok(EntityPage {
            entities,
            continuation,
        })
    }

    async fn replace_entity(
        &self,
        table: &str,
        entity: &TableEntity,
        etag: &ETag,
    ) -> Result<ETag, DomainError> {
        let mut tables = self.tables.write().map_err(|e| {
            DomainError::storage(format!("Failed to acquire write lock: {}", e))
        })?;
        let rows = tables.get_mut(table).ok_or_else(|| table_not_found(table))?;

        let key = key(&entity.partition_key, &entity.row_key);
        let current = rows.get(&key).ok_or_else(|| {
            DomainError::not_found(format!(
                "Entity '{}/{}' not found",
                entity.partition_key, entity.row_key
            ))
        })?;

        if current.etag.as_ref() != Some(etag) {
            return Err(DomainError::conflict(format!(
                "Entity '{}/{}' was modified since it was read",
                entity.partition_key, entity.row_key
            )));
        }

        let (stored, new_etag) = self.stamp(entity);
        rows.insert(key, stored);
        Ok(new_etag)
    }

    async fn delete_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<bool, DomainError> {
        let mut tables = self.tables.write().map_err(|e| {
            DomainError::storage(format!("Failed to acquire write lock: {}", e))
        })?;
        let rows = tables.get_mut(table).ok_or_else(|| table_not_found(table))?;

        Ok(rows.remove(&key(partition_key, row_key)).is_some())
    }
}
