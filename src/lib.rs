//! Subscriber Tables
//!
//! Console front-end and data-access layer for subscriber records kept in a
//! partition-key/row-key table store:
//! - Azure Table Storage (or the Azurite emulator) over its REST API
//! - An in-memory store with the same semantics for development and tests
//! - Filtered, paged queries with a hard result cap
//! - Optimistic-concurrency updates through per-record ETags

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
