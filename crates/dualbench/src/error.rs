//! Error types for dualbench.

use thiserror::Error;

/// Benchmark error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid scenario definition.
    #[error("Scenario error: {0}")]
    Scenario(String),

    /// Connection error to the relational engine.
    #[error("PostgreSQL connection error: {0}")]
    RelationalConnection(String),

    /// Connection error to the document engine.
    #[error("MongoDB connection error: {0}")]
    DocumentConnection(String),

    /// A query could not be built or submitted.
    #[error("Query error: {0}")]
    Query(String),

    /// An explain response lacked the expected timing field.
    #[error("Missing field: {0}")]
    MissingField(String),

    /// PostgreSQL driver error.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// MongoDB driver error.
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for benchmark operations.
pub type Result<T> = std::result::Result<T, Error>;
