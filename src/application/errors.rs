//! Application layer errors

use thiserror::Error;

/// General bot errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Extension error: {0}")]
    Extension(#[from] ExtensionError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Extension lifecycle and contract errors
#[derive(Error, Debug)]
pub enum ExtensionError {
    /// A base-contract method was invoked without being overridden. This
    /// is a developer-facing defect signal, not a runtime condition to
    /// recover from.
    #[error("{0} must be overridden")]
    NotImplemented(&'static str),

    #[error("Unknown extension: {0}")]
    Unknown(String),

    #[error("Registration failed: {0}")]
    Registration(String),

    #[error("Teardown failed: {0}")]
    Teardown(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Command execution errors
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Command not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Permission denied")]
    PermissionDenied,
}

/// Tenant configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Uploaded document's key set does not match the resolved schema.
    #[error("Schema mismatch: missing {missing:?}, unexpected {extra:?}")]
    SchemaMismatch {
        missing: Vec<String>,
        extra: Vec<String>,
    },

    #[error("Extension not loaded: {0}")]
    UnknownExtension(String),

    #[error("Invalid value for {key}: expected {expected}")]
    InvalidValue { key: String, expected: &'static str },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Schema construction and mutation errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Duplicate field key: {0}")]
    DuplicateKey(String),

    #[error("Unknown field key: {0}")]
    UnknownKey(String),

    #[error("Type mismatch for {key}: expected {expected}")]
    TypeMismatch { key: String, expected: &'static str },
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}
