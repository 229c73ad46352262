//! Table infrastructure - Table store implementations

mod auth;
mod azure;
mod connection;
mod factory;
mod in_memory;

pub use azure::AzureTableStore;
pub use connection::StorageAccount;
pub use factory::{StorageBackend, TableStoreFactory};
pub use in_memory::InMemoryTableStore;
