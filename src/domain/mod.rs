//! Domain layer - Core business logic and entities

pub mod error;
pub mod subscriber;
pub mod table;

pub use error::DomainError;
pub use subscriber::{Subscriber, SubscriberFilter};
pub use table::{TableEntity, TableFilter, TableStore};
