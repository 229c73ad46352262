//! Shared start-up sequence for every command

use std::time::Duration;

use tracing::{error, info};

use crate::config::AppConfig;
use crate::domain::DomainError;
use crate::infrastructure::logging;
use crate::infrastructure::subscriber::{load_subscribers, SubscriberService};
use crate::infrastructure::table::TableStoreFactory;

/// Loads configuration, initializes logging and returns a service whose table
/// is known to exist. `import.import_on_startup` is honored unless the command
/// is itself an import.
pub async fn bootstrap(is_import: bool) -> anyhow::Result<(AppConfig, SubscriberService)> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    logging::init_logging(&config.logging);

    let service = prepare(&config, is_import).await?;
    Ok((config, service))
}

/// Connects and runs the startup import when configured
pub async fn prepare(config: &AppConfig, is_import: bool) -> anyhow::Result<SubscriberService> {
    let service = connect(config).await?;

    if config.import.import_on_startup && !is_import {
        startup_import(config, &service).await?;
    }

    Ok(service)
}

/// An unreadable or malformed source file skips the import for this run;
/// store failures still abort the command.
async fn startup_import(config: &AppConfig, service: &SubscriberService) -> anyhow::Result<()> {
    let path = &config.import.source_path;

    let subscribers = match load_subscribers(path).await {
        Ok(subscribers) => subscribers,
        Err(DomainError::Validation { message }) => {
            error!(path = %path, reason = %message, "Startup import skipped");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let report = service.import(&subscribers).await?;
    info!(
        path = %path,
        imported = report.imported,
        duplicates = report.duplicates,
        "Imported source file on startup"
    );

    Ok(())
}

/// Builds the store from `config` and makes sure the table is usable
pub async fn connect(config: &AppConfig) -> anyhow::Result<SubscriberService> {
    let store = TableStoreFactory::create(&config.storage)?;
    let service = SubscriberService::new(store, config.storage.table_name.as_str())?
        .with_page_size(config.storage.page_size);

    info!(
        backend = %config.storage.backend,
        table = %service.table_name(),
        timeout = ?Duration::from_secs(config.storage.timeout_secs),
        "Connecting to table store"
    );

    if !service.ensure_table_exists().await? {
        anyhow::bail!(
            "Table '{}' is being deleted, try again later",
            service.table_name()
        );
    }

    Ok(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::subscriber::SubscriberFilter;
    use std::io::Write;

    #[tokio::test]
    async fn test_connect_with_memory_backend() {
        let mut config = AppConfig::default();
        config.storage.backend = "memory".to_string();
        config.storage.page_size = 10;

        let service = connect(&config).await.unwrap();
        assert_eq!(service.table_name(), "subscribers");
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_table_name() {
        let mut config = AppConfig::default();
        config.storage.backend = "memory".to_string();
        config.storage.table_name = "1bad".to_string();

        assert!(connect(&config).await.is_err());
    }

    fn memory_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.storage.backend = "memory".to_string();
        config.import.import_on_startup = true;
        config
    }

    #[tokio::test]
    async fn test_malformed_startup_file_does_not_block_command() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        let mut config = memory_config();
        config.import.source_path = file.path().display().to_string();

        let service = prepare(&config, false).await.unwrap();
        let found = service.query(&SubscriberFilter::new()).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_missing_startup_file_does_not_block_command() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = memory_config();
        config.import.source_path = dir.path().join("absent.json").display().to_string();

        assert!(prepare(&config, false).await.is_ok());
    }

    #[tokio::test]
    async fn test_startup_import_loads_records() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"[{"partitionKey": "customers", "rowKey": "R1", "name": "John"}]"#)
            .unwrap();

        let mut config = memory_config();
        config.import.source_path = file.path().display().to_string();

        let service = prepare(&config, false).await.unwrap();
        assert!(service.get("customers", "R1").await.unwrap().is_some());

        let skipped = prepare(&config, true).await.unwrap();
        assert!(skipped.get("customers", "R1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_connect_without_credentials_fails() {
        let config = AppConfig::default();
        assert!(connect(&config).await.is_err());
    }
}
