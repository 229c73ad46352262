//! Import source loader

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::domain::subscriber::{parse_balance, Subscriber};
use crate::domain::DomainError;

/// One record of the import file. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportRecord {
    partition_key: String,
    row_key: String,
    name: Option<String>,
    gender: Option<String>,
    company: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    about: Option<String>,
    email: Option<String>,
    age: Option<i32>,
    balance: Option<ImportBalance>,
    is_active: Option<bool>,
}

/// Balances arrive either currency-formatted ("$1,234.56") or as numbers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImportBalance {
    Number(f64),
    Text(String),
}

impl ImportBalance {
    fn value(&self) -> f64 {
        match self {
            ImportBalance::Number(n) => *n,
            ImportBalance::Text(s) => parse_balance(s),
        }
    }
}

impl From<ImportRecord> for Subscriber {
    fn from(record: ImportRecord) -> Self {
        Subscriber {
            name: record.name,
            gender: record.gender,
            company: record.company,
            phone: record.phone,
            address: record.address,
            about: record.about,
            email: record.email,
            age: record.age,
            balance: record.balance.as_ref().map(ImportBalance::value),
            is_active: record.is_active,
            ..Subscriber::new(record.partition_key, record.row_key)
        }
    }
}

/// Parses a JSON array of subscriber records
pub fn parse_subscribers(content: &str) -> Result<Vec<Subscriber>, DomainError> {
    let records: Vec<ImportRecord> = serde_json::from_str(content)
        .map_err(|e| DomainError::validation(format!("Malformed import file: {}", e)))?;

    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            let subscriber = Subscriber::from(record);
            subscriber.validate_keys().map_err(|e| {
                DomainError::validation(format!("Record {}: {}", index, e))
            })?;
            Ok(subscriber)
        })
        .collect()
}

/// Reads and parses the import file at `path`
pub async fn load_subscribers(path: impl AsRef<Path>) -> Result<Vec<Subscriber>, DomainError> {
    let path = path.as_ref();

    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        DomainError::validation(format!(
            "Failed to read import file '{}': {}",
            path.display(),
            e
        ))
    })?;

    let subscribers = parse_subscribers(&content)?;
    debug!(path = %path.display(), count = subscribers.len(), "Loaded import file");

    Ok(subscribers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"[
        {
            "_id": "5f1a9c",
            "index": 0,
            "partitionKey": "customers",
            "rowKey": "R1",
            "isActive": true,
            "balance": "$1,234.56",
            "age": 34,
            "name": "John Carter",
            "gender": "male",
            "company": "ACME",
            "email": "john@acme.test",
            "phone": "+1 (555) 010-1000",
            "address": "1 Main St",
            "about": "Long time customer",
            "tags": ["a", "b"]
        },
        {
            "partitionKey": "customers",
            "rowKey": "R2",
            "balance": 42.5
        }
    ]"#;

    #[test]
    fn test_parse_sample_records() {
        let subscribers = parse_subscribers(SAMPLE).unwrap();

        assert_eq!(subscribers.len(), 2);

        let john = &subscribers[0];
        assert_eq!(john.identity(), "customers/R1");
        assert_eq!(john.name.as_deref(), Some("John Carter"));
        assert_eq!(john.balance, Some(1234.56));
        assert_eq!(john.age, Some(34));
        assert_eq!(john.is_active, Some(true));

        let sparse = &subscribers[1];
        assert_eq!(sparse.balance, Some(42.5));
        assert_eq!(sparse.name, None);
        assert_eq!(sparse.concurrency_token, None);
    }

    #[test]
    fn test_unparseable_balance_becomes_zero() {
        let subscribers =
            parse_subscribers(r#"[{"partitionKey": "p", "rowKey": "r", "balance": "n/a"}]"#)
                .unwrap();
        assert_eq!(subscribers[0].balance, Some(0.0));
    }

    #[test]
    fn test_malformed_file_is_validation_error() {
        let result = parse_subscribers("{ not json");
        assert!(matches!(result, Err(DomainError::Validation { .. })));

        let missing_key = parse_subscribers(r#"[{"partitionKey": "p"}]"#);
        assert!(matches!(missing_key, Err(DomainError::Validation { .. })));
    }

    #[test]
    fn test_invalid_key_is_rejected() {
        let result = parse_subscribers(r#"[{"partitionKey": "p", "rowKey": "a#b"}]"#);
        match result {
            Err(DomainError::Validation { message }) => assert!(message.starts_with("Record 0")),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let subscribers = load_subscribers(file.path()).await.unwrap();
        assert_eq!(subscribers.len(), 2);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_subscribers(dir.path().join("absent.json")).await;
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }
}
