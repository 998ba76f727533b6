//! Error types for the mapping library.

use thiserror::Error;

use crate::mapping::{DbType, ProcedureKind};

/// Exit code for configuration errors (invalid YAML, missing fields).
pub const EXIT_CONFIG_ERROR: u8 = 1;

/// Exit code for database and connection pool errors.
pub const EXIT_DATABASE_ERROR: u8 = 2;

/// Exit code for registration, binding and hydration errors.
pub const EXIT_MAPPING_ERROR: u8 = 3;

/// Exit code for IO errors (file not found, permission denied).
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for mapping operations.
#[derive(Error, Debug)]
pub enum MapperError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database query or connection error reported by the driver
    #[error("Database error: {0}")]
    Database(#[from] tiberius::error::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// A database operation was requested but no connection is configured
    #[error("Connection not configured")]
    NotConnected,

    /// Entity has not been registered
    #[error("Entity {0} is not registered")]
    NotRegistered(String),

    /// Entity was registered twice
    #[error("Entity {0} is already registered")]
    AlreadyRegistered(String),

    /// Entity has no table mapping, so select-all and insert are unavailable
    #[error("Entity {0} does not have a mapped table")]
    NoMappedTable(String),

    /// A mapped property cannot hold NULL
    #[error("Property {entity}.{property} has a column mapping and must be nullable")]
    NonNullableProperty { entity: String, property: String },

    /// A column used for binding has no SQL type
    #[error("Column {column} of {entity} needs a SQL type to be bound as a parameter")]
    MissingColumnType { entity: String, column: String },

    /// Entity has no property with the requested name
    #[error("Entity {entity} has no property named {property}")]
    UnknownProperty { entity: String, property: String },

    /// Stored procedure has not been registered
    #[error("Stored procedure {0} is not registered")]
    ProcedureNotRegistered(String),

    /// Stored procedure was registered twice
    #[error("Stored procedure {0} is already registered")]
    ProcedureAlreadyRegistered(String),

    /// Stored procedure was invoked for a result shape it was not registered for
    #[error("Stored procedure {name} is registered as {actual}, not {expected}")]
    ProcedureKind {
        name: String,
        expected: ProcedureKind,
        actual: ProcedureKind,
    },

    /// SQL type cannot be declared for a bound parameter
    #[error("Database type conversion failed for {0}")]
    UnsupportedType(DbType),

    /// Identifier or parameter name rejected
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Value could not be converted to the requested type
    #[error("Cannot convert {found} to {expected}")]
    Conversion {
        expected: &'static str,
        found: String,
    },

    /// NULL was read into a type that cannot hold it
    #[error("NULL cannot be converted to non-nullable {0}")]
    NullValue(&'static str),

    /// Hydration of a single property failed
    #[error("Failed to set {entity}.{property}: {source}")]
    Hydration {
        entity: String,
        property: String,
        #[source]
        source: Box<MapperError>,
    },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MapperError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        MapperError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Conversion error
    pub fn conversion(expected: &'static str, found: impl Into<String>) -> Self {
        MapperError::Conversion {
            expected,
            found: found.into(),
        }
    }

    /// Wrap an error raised while assigning a property during hydration
    pub fn hydration(
        entity: impl Into<String>,
        property: impl Into<String>,
        source: MapperError,
    ) -> Self {
        MapperError::Hydration {
            entity: entity.into(),
            property: property.into(),
            source: Box::new(source),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MapperError::Config(_) | MapperError::Yaml(_) => EXIT_CONFIG_ERROR,
            MapperError::Database(_) | MapperError::Pool { .. } | MapperError::NotConnected => {
                EXIT_DATABASE_ERROR
            }
            MapperError::Io(_) => EXIT_IO_ERROR,
            _ => EXIT_MAPPING_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for mapping operations.
pub type Result<T> = std::result::Result<T, MapperError>;
