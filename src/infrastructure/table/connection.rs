//! Storage account credentials and endpoint resolution

use std::collections::HashMap;
use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::domain::DomainError;

const DEVELOPMENT_ACCOUNT_NAME: &str = "devstoreaccount1";
const DEVELOPMENT_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEVELOPMENT_TABLE_ENDPOINT: &str = "http://127.0.0.1:10002/devstoreaccount1";
const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";
const DEFAULT_PROTOCOL: &str = "https";

/// Account name, decoded shared key and table endpoint
#[derive(Clone)]
pub struct StorageAccount {
    name: String,
    key: Vec<u8>,
    table_endpoint: String,
}

impl fmt::Debug for StorageAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageAccount")
            .field("name", &self.name)
            .field("key", &"<redacted>")
            .field("table_endpoint", &self.table_endpoint)
            .finish()
    }
}

impl StorageAccount {
    /// Builds an account from its name and base64 key. Without an explicit
    /// endpoint the public cloud endpoint for the account is used.
    pub fn new(
        name: impl Into<String>,
        key: &str,
        endpoint: Option<&str>,
    ) -> Result<Self, DomainError> {
        let name = name.into();

        if name.is_empty() {
            return Err(DomainError::configuration("Storage account name is empty"));
        }

        let key = STANDARD.decode(key.trim()).map_err(|e| {
            DomainError::configuration(format!("Storage account key is not valid base64: {}", e))
        })?;

        let table_endpoint = match endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!(
                "{}://{}.table.{}",
                DEFAULT_PROTOCOL, name, DEFAULT_ENDPOINT_SUFFIX
            ),
        };

        Ok(Self {
            name,
            key,
            table_endpoint,
        })
    }

    /// Local storage emulator account
    pub fn development() -> Result<Self, DomainError> {
        Self::new(
            DEVELOPMENT_ACCOUNT_NAME,
            DEVELOPMENT_ACCOUNT_KEY,
            Some(DEVELOPMENT_TABLE_ENDPOINT),
        )
    }

    /// Parses a `Key=Value;Key=Value` storage connection string
    pub fn from_connection_string(connection_string: &str) -> Result<Self, DomainError> {
        let settings: HashMap<&str, &str> = connection_string
            .split(';')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .filter_map(|segment| segment.split_once('='))
            .map(|(key, value)| (key.trim(), value.trim()))
            .collect();

        if settings
            .get("UseDevelopmentStorage")
            .is_some_and(|value| value.eq_ignore_ascii_case("true"))
        {
            return Self::development();
        }

        let name = settings.get("AccountName").ok_or_else(|| {
            DomainError::configuration("Connection string is missing AccountName")
        })?;
        let key = settings.get("AccountKey").ok_or_else(|| {
            DomainError::configuration("Connection string is missing AccountKey")
        })?;

        let endpoint = match settings.get("TableEndpoint") {
            Some(endpoint) => endpoint.to_string(),
            None => {
                let protocol = settings
                    .get("DefaultEndpointsProtocol")
                    .copied()
                    .unwrap_or(DEFAULT_PROTOCOL);
                let suffix = settings
                    .get("EndpointSuffix")
                    .copied()
                    .unwrap_or(DEFAULT_ENDPOINT_SUFFIX);
                format!("{}://{}.table.{}", protocol, name, suffix)
            }
        };

        Self::new(*name, key, Some(endpoint.as_str()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn table_endpoint(&self) -> &str {
        &self.table_endpoint
    }
}
