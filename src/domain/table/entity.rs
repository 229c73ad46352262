//! Generic table entity types shared by every table store backend

use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Reserved property names managed by the table service
pub const PARTITION_KEY: &str = "PartitionKey";
pub const ROW_KEY: &str = "RowKey";
pub const TIMESTAMP: &str = "Timestamp";

/// Opaque optimistic concurrency token returned by the store on read/write
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ETag(String);

impl ETag {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A row in a table: identity, store-managed metadata and free-form properties
#[derive(Debug, Clone, PartialEq)]
pub struct TableEntity {
    pub partition_key: String,
    pub row_key: String,
    /// Set by the store on every write
    pub timestamp: Option<DateTime<Utc>>,
    /// Set by the store on read; required for conditional writes
    pub etag: Option<ETag>,
    pub properties: Map<String, Value>,
}

impl TableEntity {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            timestamp: None,
            etag: None,
            properties: Map::new(),
        }
    }

    /// Builder-style property setter; `None` leaves the property absent
    pub fn with_property(mut self, name: &str, value: Option<impl Into<Value>>) -> Self {
        if let Some(value) = value {
            self.properties.insert(name.to_string(), value.into());
        }
        self
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        match name {
            PARTITION_KEY | ROW_KEY => None,
            _ => self.properties.get(name),
        }
    }

    pub fn string_property(&self, name: &str) -> Option<String> {
        self.property(name)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub fn int_property(&self, name: &str) -> Option<i64> {
        self.property(name).and_then(Value::as_i64)
    }

    pub fn bool_property(&self, name: &str) -> Option<bool> {
        self.property(name).and_then(Value::as_bool)
    }

    /// Serializes the entity into the JSON body expected by the table service
    pub fn to_json(&self) -> Value {
        let mut body = Map::with_capacity(self.properties.len() + 2);
        body.insert(
            PARTITION_KEY.to_string(),
            Value::String(self.partition_key.clone()),
        );
        body.insert(ROW_KEY.to_string(), Value::String(self.row_key.clone()));

        for (name, value) in &self.properties {
            body.insert(name.clone(), value.clone());
        }

        Value::Object(body)
    }

    /// Parses an entity from a table service JSON object.
    ///
    /// OData annotations (`odata.*`, `Prop@odata.type`) are dropped; the
    /// `odata.etag` annotation wins over the supplied header value.
    pub fn from_json(mut body: Map<String, Value>, etag_header: Option<ETag>) -> Option<Self> {
        let partition_key = take_string(&mut body, PARTITION_KEY)?;
        let row_key = take_string(&mut body, ROW_KEY)?;

        let timestamp = take_string(&mut body, TIMESTAMP)
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|ts| ts.with_timezone(&Utc));

        let etag = take_string(&mut body, "odata.etag")
            .map(ETag::new)
            .or(etag_header);

        let properties = body
            .into_iter()
            .filter(|(name, _)| !name.starts_with("odata.") && !name.contains("@odata."))
            .collect();

        Some(Self {
            partition_key,
            row_key,
            timestamp,
            etag,
            properties,
        })
    }
}

fn take_string(body: &mut Map<String, Value>, name: &str) -> Option<String> {
    match body.remove(name) {
        Some(Value::String(value)) => Some(value),
        _ => None,
    }
}

/// Outcome of an idempotent create-table request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableCreation {
    Created,
    AlreadyExists,
    /// The table is still being removed by the service and cannot be recreated yet
    BeingDeleted,
}

impl TableCreation {
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Created | Self::AlreadyExists)
    }
}

/// Position to resume a paged query from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationToken {
    pub next_partition_key: String,
    pub next_row_key: Option<String>,
}

/// One page of query results
#[derive(Debug, Clone, Default)]
pub struct EntityPage {
    pub entities: Vec<TableEntity>,
    pub continuation: Option<ContinuationToken>,
}
