//! Table store factory for runtime backend selection

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::StorageConfig;
use crate::domain::table::TableStore;
use crate::domain::DomainError;

use super::azure::AzureTableStore;
use super::connection::StorageAccount;
use super::in_memory::InMemoryTableStore;

/// Supported table store backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Azure Table Storage (or Azurite)
    Azure,
    /// In-memory store (for testing/development)
    InMemory,
}

impl StorageBackend {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "azure" | "table" | "tables" | "azure-table" => Some(Self::Azure),
            "memory" | "inmemory" | "in-memory" | "in_memory" => Some(Self::InMemory),
            _ => None,
        }
    }
}

/// Factory for creating table store instances
#[derive(Debug)]
pub struct TableStoreFactory;

impl TableStoreFactory {
    /// Creates a table store based on the configuration
    pub fn create(config: &StorageConfig) -> Result<Arc<dyn TableStore>, DomainError> {
        let backend = StorageBackend::from_str(&config.backend).ok_or_else(|| {
            DomainError::configuration(format!("Unknown storage backend '{}'", config.backend))
        })?;

        match backend {
            StorageBackend::InMemory => {
                info!("Using in-memory table store");
                Ok(Arc::new(InMemoryTableStore::new()))
            }
            StorageBackend::Azure => {
                let account = Self::resolve_account(config)?;
                info!(
                    account = %account.name(),
                    endpoint = %account.table_endpoint(),
                    "Using Azure table store"
                );
                let store =
                    AzureTableStore::new(account, Duration::from_secs(config.timeout_secs))?;
                Ok(Arc::new(store))
            }
        }
    }

    /// Connection string wins over an explicit account name/key pair
    pub fn resolve_account(config: &StorageConfig) -> Result<StorageAccount, DomainError> {
        if let Some(ref connection_string) = config.connection_string {
            return StorageAccount::from_connection_string(connection_string);
        }

        match (&config.account_name, &config.account_key) {
            (Some(name), Some(key)) => {
                StorageAccount::new(name.as_str(), key, config.endpoint.as_deref())
            }
            _ => Err(DomainError::configuration(
                "Azure backend requires storage.connection_string or storage.account_name and storage.account_key",
            )),
        }
    }
}
