mod app_config;

pub use app_config::{AppConfig, ImportConfig, LogFormat, LoggingConfig, StorageConfig};
