//! Schema loading errors.

use thiserror::Error;

/// An error raised while loading or building a schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid type expression `{0}`")]
    InvalidTypeExpression(String),

    #[error("type `{type_name}` referenced by {referenced_by} is not defined")]
    UnknownType {
        type_name: String,
        referenced_by: String,
    },

    #[error("type `{type_name}` cannot be used as {usage}")]
    InvalidTypeUsage { type_name: String, usage: String },

    #[error("schema does not declare a query type")]
    MissingQueryType,

    #[error("failed to parse schema JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read schema: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;
