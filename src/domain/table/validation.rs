//! Table name and key validation

use thiserror::Error;

/// Errors that can occur during table name or key validation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TableValidationError {
    #[error("{0} cannot be empty")]
    EmptyKey(&'static str),

    #[error("{0} cannot exceed {1} characters")]
    KeyTooLong(&'static str, usize),

    #[error("{0} cannot contain '/', '\\', '#', '?' or control characters")]
    InvalidKeyCharacters(&'static str),

    #[error("Table name must be {0} to {1} characters long")]
    InvalidTableNameLength(usize, usize),

    #[error("Table name must start with a letter and contain only alphanumeric characters")]
    InvalidTableNameCharacters,
}

const MAX_KEY_LENGTH: usize = 1024;
const MIN_TABLE_NAME_LENGTH: usize = 3;
const MAX_TABLE_NAME_LENGTH: usize = 63;

/// Validate a partition key
pub fn validate_partition_key(key: &str) -> Result<(), TableValidationError> {
    validate_key("Partition key", key)
}

/// Validate a row key
pub fn validate_row_key(key: &str) -> Result<(), TableValidationError> {
    validate_key("Row key", key)
}

fn validate_key(kind: &'static str, key: &str) -> Result<(), TableValidationError> {
    if key.is_empty() {
        return Err(TableValidationError::EmptyKey(kind));
    }

    if key.chars().count() > MAX_KEY_LENGTH {
        return Err(TableValidationError::KeyTooLong(kind, MAX_KEY_LENGTH));
    }

    if key
        .chars()
        .any(|c| matches!(c, '/' | '\\' | '#' | '?') || c.is_control())
    {
        return Err(TableValidationError::InvalidKeyCharacters(kind));
    }

    Ok(())
}

/// Validate a table name
pub fn validate_table_name(name: &str) -> Result<(), TableValidationError> {
    if name.len() < MIN_TABLE_NAME_LENGTH || name.len() > MAX_TABLE_NAME_LENGTH {
        return Err(TableValidationError::InvalidTableNameLength(
            MIN_TABLE_NAME_LENGTH,
            MAX_TABLE_NAME_LENGTH,
        ));
    }

    let starts_with_letter = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic());

    if !starts_with_letter || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(TableValidationError::InvalidTableNameCharacters);
    }

    Ok(())
}
