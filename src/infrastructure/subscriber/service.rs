//! Subscriber service - the entity store client used by every command

use std::pin::pin;
use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

use crate::domain::subscriber::{Subscriber, SubscriberFilter};
use crate::domain::table::{
    validate_partition_key, validate_row_key, validate_table_name, ContinuationToken,
    TableEntity, TableFilter, TableStore,
};
use crate::domain::DomainError;

/// Hard cap on records materialized by a single query
pub const MAX_QUERY_RESULTS: usize = 2000;

/// Default number of entities requested per round trip
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Outcome of an import run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    /// Records skipped because their identity already existed
    pub duplicates: usize,
}

/// Field changes for an update; `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateSubscriberRequest {
    pub name: Option<String>,
    pub gender: Option<String>,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub about: Option<String>,
    pub email: Option<String>,
    pub age: Option<i32>,
    pub balance: Option<f64>,
    pub is_active: Option<bool>,
}

impl UpdateSubscriberRequest {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Produces the modified copy of `current`. Identity, timestamp and
    /// concurrency token are carried over unchanged.
    pub fn apply(&self, current: &Subscriber) -> Subscriber {
        let mut updated = current.clone();

        if let Some(ref name) = self.name {
            updated.name = Some(name.clone());
        }
        if let Some(ref gender) = self.gender {
            updated.gender = Some(gender.clone());
        }
        if let Some(ref company) = self.company {
            updated.company = Some(company.clone());
        }
        if let Some(ref phone) = self.phone {
            updated.phone = Some(phone.clone());
        }
        if let Some(ref address) = self.address {
            updated.address = Some(address.clone());
        }
        if let Some(ref about) = self.about {
            updated.about = Some(about.clone());
        }
        if let Some(ref email) = self.email {
            updated.email = Some(email.clone());
        }
        if let Some(age) = self.age {
            updated.age = Some(age);
        }
        if let Some(balance) = self.balance {
            updated.balance = Some(balance);
        }
        if let Some(is_active) = self.is_active {
            updated.is_active = Some(is_active);
        }

        updated
    }
}

/// Maps subscribers to and from one table of a [`TableStore`].
///
/// Every operation is a sequence of single round trips; nothing is cached and
/// nothing is retried. Consistency is left to the store's per-entity ETag.
#[derive(Clone)]
pub struct SubscriberService {
    store: Arc<dyn TableStore>,
    table_name: String,
    page_size: usize,
}

impl SubscriberService {
    pub fn new(store: Arc<dyn TableStore>, table_name: impl Into<String>) -> Result<Self, DomainError> {
        let table_name = table_name.into();
        validate_table_name(&table_name).map_err(|e| DomainError::configuration(e.to_string()))?;

        Ok(Self {
            store,
            table_name,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Creates the backing table if needed. Returns false when the table is
    /// still being deleted by the service.
    pub async fn ensure_table_exists(&self) -> Result<bool, DomainError> {
        let creation = self.store.create_table(&self.table_name).await?;

        if creation.is_usable() {
            debug!(table = %self.table_name, outcome = ?creation, "Table ready");
        } else {
            warn!(
                table = %self.table_name,
                "Table is being deleted, try again once the deletion has completed"
            );
        }

        Ok(creation.is_usable())
    }

    /// Inserts a single subscriber; a duplicate identity is a conflict
    pub async fn add(&self, subscriber: &Subscriber) -> Result<Subscriber, DomainError> {
        subscriber
            .validate_keys()
            .map_err(|e| DomainError::validation(e.to_string()))?;

        let stored = self
            .store
            .insert_entity(&self.table_name, &subscriber.to_table_entity())
            .await?;

        Ok(Subscriber::from_table_entity(stored))
    }

    /// Inserts every record in order. Duplicates are logged and skipped;
    /// anything else aborts the run, keeping what was already written.
    pub async fn import(&self, subscribers: &[Subscriber]) -> Result<ImportReport, DomainError> {
        info!(count = subscribers.len(), table = %self.table_name, "Importing subscribers");

        let mut report = ImportReport::default();

        for subscriber in subscribers {
            match self.add(subscriber).await {
                Ok(_) => report.imported += 1,
                Err(DomainError::Conflict { message }) => {
                    warn!(
                        subscriber = %subscriber.identity(),
                        reason = %message,
                        "Subscriber already exists, skipping"
                    );
                    report.duplicates += 1;
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            imported = report.imported,
            duplicates = report.duplicates,
            "Import finished"
        );

        Ok(report)
    }

    pub async fn get(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<Subscriber>, DomainError> {
        validate_keys(partition_key, row_key)?;

        let entity = self
            .store
            .get_entity(&self.table_name, partition_key, row_key)
            .await?;

        Ok(entity.map(Subscriber::from_table_entity))
    }

    /// Lazily pages through every entity matching `filter`. A page is only
    /// requested once the previous one has been consumed.
    fn entities(
        &self,
        filter: TableFilter,
    ) -> impl Stream<Item = Result<TableEntity, DomainError>> + '_ {
        // `None` once the last page has been fetched
        let start: Option<Option<ContinuationToken>> = Some(None);

        stream::try_unfold(start, move |state| {
            let filter = filter.clone();
            async move {
                let Some(continuation) = state else {
                    return Ok(None);
                };

                let page = self
                    .store
                    .query_entities(&self.table_name, &filter, self.page_size, continuation)
                    .await?;

                debug!(
                    table = %self.table_name,
                    entities = page.entities.len(),
                    more = page.continuation.is_some(),
                    "Fetched page"
                );

                let next = page.continuation.map(Some);
                let entities = stream::iter(page.entities.into_iter().map(Ok::<_, DomainError>));
                Ok::<_, DomainError>(Some((entities, next)))
            }
        })
        .try_flatten()
    }

    /// Lazy sequence of subscribers matching `filter`, without a cap
    pub fn query_stream<'a>(
        &'a self,
        filter: &'a SubscriberFilter,
    ) -> impl Stream<Item = Result<Subscriber, DomainError>> + 'a {
        self.entities(filter.to_table_filter())
            .map_ok(Subscriber::from_table_entity)
            .try_filter(move |subscriber| futures::future::ready(filter.accepts_balance(subscriber)))
    }

    /// Runs the filter and materializes at most [`MAX_QUERY_RESULTS`] records;
    /// anything beyond the cap is never fetched.
    pub async fn query(&self, filter: &SubscriberFilter) -> Result<Vec<Subscriber>, DomainError> {
        debug!(filter = %filter.describe(), "Querying subscribers");

        let subscribers: Vec<Subscriber> = self
            .query_stream(filter)
            .take(MAX_QUERY_RESULTS)
            .try_collect()
            .await?;

        // Later pages are never requested, so whether more records match is unknown
        if subscribers.len() == MAX_QUERY_RESULTS {
            info!(
                limit = MAX_QUERY_RESULTS,
                "Query reached the record limit, further matches were not read"
            );
        }

        Ok(subscribers)
    }

    /// Conditionally replaces a previously read subscriber. Fails with
    /// `Conflict` if the record changed since `subscriber` was read.
    pub async fn replace(&self, subscriber: &Subscriber) -> Result<Subscriber, DomainError> {
        let etag = subscriber.concurrency_token.as_ref().ok_or_else(|| {
            DomainError::validation(format!(
                "Subscriber '{}' has no concurrency token, read it before updating",
                subscriber.identity()
            ))
        })?;

        let new_etag = self
            .store
            .replace_entity(&self.table_name, &subscriber.to_table_entity(), etag)
            .await?;

        let mut updated = subscriber.clone();
        updated.concurrency_token = Some(new_etag);
        Ok(updated)
    }

    /// Read, apply `changes`, conditionally write back. The losing side of a
    /// concurrent update fails with `Conflict` and is not retried.
    pub async fn update_record(
        &self,
        partition_key: &str,
        row_key: &str,
        changes: &UpdateSubscriberRequest,
    ) -> Result<Subscriber, DomainError> {
        let current = self.get(partition_key, row_key).await?.ok_or_else(|| {
            DomainError::not_found(format!(
                "Subscriber '{}/{}' not found",
                partition_key, row_key
            ))
        })?;

        let updated = changes.apply(&current);
        debug_assert!(updated.has_same_identity(&current));

        let result = self.replace(&updated).await?;
        info!(subscriber = %result.identity(), "Subscriber updated");
        Ok(result)
    }

    /// Deletes one subscriber; returns false if it did not exist
    pub async fn delete_record(&self, partition_key: &str, row_key: &str) -> Result<bool, DomainError> {
        validate_keys(partition_key, row_key)?;

        let deleted = self
            .store
            .delete_entity(&self.table_name, partition_key, row_key)
            .await?;

        if deleted {
            info!(partition_key = %partition_key, row_key = %row_key, "Subscriber deleted");
        } else {
            info!(partition_key = %partition_key, row_key = %row_key, "Subscriber not found, nothing deleted");
        }

        Ok(deleted)
    }

    /// Walks the whole table deleting one entity per round trip. Returns the
    /// number of entities removed.
    pub async fn delete_all(&self) -> Result<usize, DomainError> {
        info!(table = %self.table_name, "Deleting all subscribers");

        let mut entities = pin!(self.entities(TableFilter::new()));
        let mut deleted = 0;

        while let Some(entity) = entities.try_next().await? {
            if self
                .store
                .delete_entity(&self.table_name, &entity.partition_key, &entity.row_key)
                .await?
            {
                deleted += 1;
            }
        }

        info!(deleted = deleted, "Deleted all subscribers");
        Ok(deleted)
    }
}

fn validate_keys(partition_key: &str, row_key: &str) -> Result<(), DomainError> {
    validate_partition_key(partition_key).map_err(|e| DomainError::validation(e.to_string()))?;
    validate_row_key(row_key).map_err(|e| DomainError::validation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::table::{ETag, EntityPage, MockTableStore, TableCreation};
    use crate::infrastructure::table::InMemoryTableStore;

    async fn service() -> SubscriberService {
        let service = SubscriberService::new(Arc::new(InMemoryTableStore::new()), "subscribers")
            .unwrap()
            .with_page_size(50);
        assert!(service.ensure_table_exists().await.unwrap());
        service
    }

    fn subscriber(partition_key: &str, row_key: &str, name: &str, balance: f64) -> Subscriber {
        Subscriber {
            name: Some(name.to_string()),
            email: Some(format!("{}@example.com", name.to_lowercase())),
            age: Some(30),
            balance: Some(balance),
            is_active: Some(true),
            ..Subscriber::new(partition_key, row_key)
        }
    }

    fn without_metadata(mut subscriber: Subscriber) -> Subscriber {
        subscriber.timestamp = None;
        subscriber.concurrency_token = None;
        subscriber
    }

    #[test]
    fn test_invalid_table_name_rejected() {
        let result = SubscriberService::new(Arc::new(InMemoryTableStore::new()), "no-dashes");
        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }

    #[test]
    fn test_update_request_apply_keeps_identity_and_token() {
        let mut current = subscriber("p", "r", "John", 10.0);
        current.concurrency_token = Some(ETag::new("W/\"1\""));

        let changes = UpdateSubscriberRequest {
            name: Some("Johnny".to_string()),
            balance: Some(20.5),
            ..Default::default()
        };
        let updated = changes.apply(&current);

        assert_eq!(updated.name.as_deref(), Some("Johnny"));
        assert_eq!(updated.balance, Some(20.5));
        assert_eq!(updated.email, current.email);
        assert_eq!(updated.concurrency_token, current.concurrency_token);
        assert!(updated.has_same_identity(&current));
        assert!(!changes.is_empty());
        assert!(UpdateSubscriberRequest::default().is_empty());
    }

    #[tokio::test]
    async fn test_insert_then_query_round_trip() {
        let service = service().await;
        let original = subscriber("customers", "R1", "John", 150.0);

        service.add(&original).await.unwrap();

        let filter = SubscriberFilter::new()
            .with_partition_key("customers")
            .with_row_key("R1");
        let found = service.query(&filter).await.unwrap();

        assert_eq!(found.len(), 1);
        assert!(found[0].concurrency_token.is_some());
        assert!(found[0].timestamp.is_some());
        assert_eq!(without_metadata(found[0].clone()), original);
    }

    #[tokio::test]
    async fn test_reinsert_reports_conflict_and_keeps_original() {
        let service = service().await;
        service
            .add(&subscriber("customers", "R1", "John", 150.0))
            .await
            .unwrap();

        let result = service.add(&subscriber("customers", "R1", "Impostor", 1.0)).await;
        assert!(matches!(result, Err(DomainError::Conflict { .. })));

        let stored = service.get("customers", "R1").await.unwrap().unwrap();
        assert_eq!(stored.name.as_deref(), Some("John"));
    }

    #[tokio::test]
    async fn test_add_rejects_invalid_keys() {
        let service = service().await;
        let result = service.add(&subscriber("customers", "a/b", "John", 1.0)).await;
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_import_skips_duplicates() {
        let service = service().await;
        service
            .add(&subscriber("customers", "R2", "Existing", 1.0))
            .await
            .unwrap();

        let records = vec![
            subscriber("customers", "R1", "John", 150.0),
            subscriber("customers", "R2", "Duplicate", 2.0),
            subscriber("customers", "R3", "Amy", 50.0),
        ];
        let report = service.import(&records).await.unwrap();

        assert_eq!(
            report,
            ImportReport {
                imported: 2,
                duplicates: 1
            }
        );
        let existing = service.get("customers", "R2").await.unwrap().unwrap();
        assert_eq!(existing.name.as_deref(), Some("Existing"));
    }

    #[tokio::test]
    async fn test_query_filter_combination() {
        let service = service().await;
        service
            .import(&[
                subscriber("customers", "R1", "John", 150.0),
                subscriber("customers", "R2", "Amy", 500.0),
                subscriber("customers", "R3", "Joanna", 50.0),
                subscriber("customers", "R4", "Jon", 120.0),
            ])
            .await
            .unwrap();

        let filter = SubscriberFilter::new()
            .with_row_key("R1")
            .with_name_prefix("Jo")
            .with_min_balance(100.0);
        let found = service.query(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name.as_deref(), Some("John"));

        let prefix_and_balance = SubscriberFilter::new()
            .with_name_prefix("Jo")
            .with_min_balance(100.0);
        let names: Vec<_> = service
            .query(&prefix_and_balance)
            .await
            .unwrap()
            .into_iter()
            .filter_map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["John", "Jon"]);
    }

    #[tokio::test]
    async fn test_query_caps_results() {
        let service = service().await;
        let records: Vec<_> = (0..MAX_QUERY_RESULTS + 25)
            .map(|i| subscriber("bulk", &format!("{:05}", i), "Bulk", 1.0))
            .collect();
        service.import(&records).await.unwrap();

        let found = service.query(&SubscriberFilter::new()).await.unwrap();
        assert_eq!(found.len(), MAX_QUERY_RESULTS);
        assert_eq!(found.last().unwrap().row_key, format!("{:05}", MAX_QUERY_RESULTS - 1));
    }

    #[tokio::test]
    async fn test_query_stops_requesting_pages_at_cap() {
        let mut store = MockTableStore::new();
        // Every page is full and claims more data follows
        store
            .expect_query_entities()
            .times(2)
            .returning(|_, _, page_size, _| {
                Ok(EntityPage {
                    entities: (0..page_size)
                        .map(|i| TableEntity::new("p", format!("{}", i)))
                        .collect(),
                    continuation: Some(ContinuationToken {
                        next_partition_key: "p".to_string(),
                        next_row_key: Some("next".to_string()),
                    }),
                })
            });

        let service = SubscriberService::new(Arc::new(store), "subscribers")
            .unwrap()
            .with_page_size(1000);

        let found = service.query(&SubscriberFilter::new()).await.unwrap();
        assert_eq!(found.len(), MAX_QUERY_RESULTS);
    }

    #[tokio::test]
    async fn test_update_record_replaces_fields() {
        let service = service().await;
        service
            .add(&subscriber("customers", "R1", "John", 150.0))
            .await
            .unwrap();

        let changes = UpdateSubscriberRequest {
            phone: Some("555-0101".to_string()),
            balance: Some(175.25),
            ..Default::default()
        };
        let updated = service.update_record("customers", "R1", &changes).await.unwrap();
        assert_eq!(updated.phone.as_deref(), Some("555-0101"));

        let stored = service.get("customers", "R1").await.unwrap().unwrap();
        assert_eq!(stored.phone.as_deref(), Some("555-0101"));
        assert_eq!(stored.balance, Some(175.25));
        assert_eq!(stored.name.as_deref(), Some("John"));
        assert_eq!(stored.concurrency_token, updated.concurrency_token);
    }

    #[tokio::test]
    async fn test_update_record_losing_writer_gets_conflict() {
        let mut store = MockTableStore::new();
        let read_version = ETag::new("W/\"1\"");

        // Both updates read the same version
        let stored = subscriber("customers", "R1", "John", 150.0).to_table_entity();
        store.expect_get_entity().times(2).returning(move |_, _, _| {
            let mut entity = stored.clone();
            entity.etag = Some(ETag::new("W/\"1\""));
            Ok(Some(entity))
        });

        let mut writes = 0;
        store
            .expect_replace_entity()
            .times(2)
            .withf(move |_, _, etag| *etag == read_version)
            .returning(move |_, _, _| {
                writes += 1;
                if writes == 1 {
                    Ok(ETag::new("W/\"2\""))
                } else {
                    Err(DomainError::conflict("HTTP 412 - UpdateConditionNotSatisfied"))
                }
            });

        let service = SubscriberService::new(Arc::new(store), "subscribers").unwrap();
        let first = UpdateSubscriberRequest {
            name: Some("First".to_string()),
            ..Default::default()
        };
        let second = UpdateSubscriberRequest {
            name: Some("Second".to_string()),
            ..Default::default()
        };

        let winner = service.update_record("customers", "R1", &first).await.unwrap();
        assert_eq!(winner.concurrency_token, Some(ETag::new("W/\"2\"")));

        let loser = service.update_record("customers", "R1", &second).await;
        assert!(matches!(loser, Err(DomainError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_update_missing_record_is_not_found() {
        let service = service().await;
        let changes = UpdateSubscriberRequest {
            name: Some("Ghost".to_string()),
            ..Default::default()
        };

        let result = service.update_record("customers", "missing", &changes).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
        assert!(service.get("customers", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_updates_have_one_winner() {
        let service = service().await;
        service
            .add(&subscriber("customers", "R1", "John", 150.0))
            .await
            .unwrap();

        // Both callers read the same version before either writes
        let first_read = service.get("customers", "R1").await.unwrap().unwrap();
        let second_read = service.get("customers", "R1").await.unwrap().unwrap();

        let first = UpdateSubscriberRequest {
            name: Some("First".to_string()),
            ..Default::default()
        }
        .apply(&first_read);
        let second = UpdateSubscriberRequest {
            name: Some("Second".to_string()),
            company: Some("Other".to_string()),
            ..Default::default()
        }
        .apply(&second_read);

        assert!(service.replace(&first).await.is_ok());
        let loser = service.replace(&second).await;
        assert!(matches!(loser, Err(DomainError::Conflict { .. })));

        let stored = service.get("customers", "R1").await.unwrap().unwrap();
        assert_eq!(stored.name.as_deref(), Some("First"));
        assert_eq!(stored.company, None);
    }

    #[tokio::test]
    async fn test_replace_requires_concurrency_token() {
        let service = service().await;
        let result = service
            .replace(&subscriber("customers", "R1", "John", 1.0))
            .await;
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_delete_record() {
        let service = service().await;
        service
            .add(&subscriber("customers", "R1", "John", 150.0))
            .await
            .unwrap();

        assert!(service.delete_record("customers", "R1").await.unwrap());
        assert!(!service.delete_record("customers", "R1").await.unwrap());
        assert!(service.get("customers", "R1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_all_empties_table() {
        let service = service().await;
        let records: Vec<_> = (0..120)
            .map(|i| subscriber(&format!("p{}", i % 3), &format!("r{}", i), "Someone", 1.0))
            .collect();
        service.import(&records).await.unwrap();

        let deleted = service.delete_all().await.unwrap();
        assert_eq!(deleted, 120);

        let remaining = service.query(&SubscriberFilter::new()).await.unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn test_delete_all_on_empty_table() {
        let service = service().await;
        assert_eq!(service.delete_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ensure_table_exists_being_deleted() {
        let mut store = MockTableStore::new();
        store
            .expect_create_table()
            .returning(|_| Ok(TableCreation::BeingDeleted));

        let service = SubscriberService::new(Arc::new(store), "subscribers").unwrap();
        assert!(!service.ensure_table_exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_ensure_table_exists_propagates_failures() {
        let mut store = MockTableStore::new();
        store
            .expect_create_table()
            .returning(|_| Err(DomainError::storage("HTTP 403 - AuthenticationFailed")));

        let service = SubscriberService::new(Arc::new(store), "subscribers").unwrap();
        let result = service.ensure_table_exists().await;
        assert!(matches!(result, Err(DomainError::Storage { .. })));
    }

    #[tokio::test]
    async fn test_import_aborts_on_store_failure() {
        let mut store = MockTableStore::new();
        let mut calls = 0;
        store.expect_insert_entity().times(2).returning(move |_, entity| {
            calls += 1;
            if calls == 1 {
                Ok(entity.clone())
            } else {
                Err(DomainError::storage("HTTP 500 - InternalError"))
            }
        });

        let service = SubscriberService::new(Arc::new(store), "subscribers").unwrap();
        let records = vec![
            subscriber("customers", "R1", "John", 1.0),
            subscriber("customers", "R2", "Amy", 1.0),
            subscriber("customers", "R3", "Never", 1.0),
        ];

        let result = service.import(&records).await;
        assert!(matches!(result, Err(DomainError::Storage { .. })));
    }
}
