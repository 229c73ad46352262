//! Subscriber record and its table entity mapping

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::balance::{format_balance, parse_balance};
use crate::domain::table::{
    validate_partition_key, validate_row_key, ETag, TableEntity, TableValidationError,
};

/// Table property names of a subscriber entity
pub mod property {
    pub const NAME: &str = "Name";
    pub const GENDER: &str = "Gender";
    pub const COMPANY: &str = "Company";
    pub const PHONE: &str = "Phone";
    pub const ADDRESS: &str = "Address";
    pub const ABOUT: &str = "About";
    pub const EMAIL: &str = "Email";
    pub const AGE: &str = "Age";
    pub const BALANCE: &str = "Balance";
    pub const IS_ACTIVE: &str = "IsActive";
}

/// Subscriber record, identified by `(partition_key, row_key)`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub partition_key: String,
    pub row_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    /// Set by the store on write
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Returned by the store on read, presented back on conditional update
    #[serde(skip)]
    pub concurrency_token: Option<ETag>,
}

impl Subscriber {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            ..Self::default()
        }
    }

    /// Validates the identity keys against the table service's rules
    pub fn validate_keys(&self) -> Result<(), TableValidationError> {
        validate_partition_key(&self.partition_key)?;
        validate_row_key(&self.row_key)
    }

    /// `partition/row` label used in logs and messages
    pub fn identity(&self) -> String {
        format!("{}/{}", self.partition_key, self.row_key)
    }

    pub fn has_same_identity(&self, other: &Subscriber) -> bool {
        self.partition_key == other.partition_key && self.row_key == other.row_key
    }

    pub fn to_table_entity(&self) -> TableEntity {
        let mut entity = TableEntity::new(&self.partition_key, &self.row_key)
            .with_property(property::NAME, self.name.clone())
            .with_property(property::GENDER, self.gender.clone())
            .with_property(property::COMPANY, self.company.clone())
            .with_property(property::PHONE, self.phone.clone())
            .with_property(property::ADDRESS, self.address.clone())
            .with_property(property::ABOUT, self.about.clone())
            .with_property(property::EMAIL, self.email.clone())
            .with_property(property::AGE, self.age)
            .with_property(property::BALANCE, self.balance.map(format_balance))
            .with_property(property::IS_ACTIVE, self.is_active);

        entity.timestamp = self.timestamp;
        entity.etag = self.concurrency_token.clone();
        entity
    }

    pub fn from_table_entity(entity: TableEntity) -> Self {
        let balance = entity
            .property(property::BALANCE)
            .and_then(|value| match value {
                Value::String(raw) => Some(parse_balance(raw)),
                Value::Number(n) => n.as_f64(),
                _ => None,
            });

        Self {
            name: entity.string_property(property::NAME),
            gender: entity.string_property(property::GENDER),
            company: entity.string_property(property::COMPANY),
            phone: entity.string_property(property::PHONE),
            address: entity.string_property(property::ADDRESS),
            about: entity.string_property(property::ABOUT),
            email: entity.string_property(property::EMAIL),
            age: entity
                .int_property(property::AGE)
                .and_then(|age| i32::try_from(age).ok()),
            balance,
            is_active: entity.bool_property(property::IS_ACTIVE),
            timestamp: entity.timestamp,
            concurrency_token: entity.etag,
            partition_key: entity.partition_key,
            row_key: entity.row_key,
        }
    }
}
