//! Error types for tabula.

use thiserror::Error;

use crate::entity::validation::ValidationErrors;

/// The main error type for tabula operations.
#[derive(Debug, Error)]
pub enum OrmError {
    /// Validation rules rejected the supplied attributes. Never touches the database.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// An expected single row was absent.
    #[error("No {entity} found for {key}")]
    NotFound { entity: String, key: String },

    /// A malformed predicate, or a missing table/column discovered at execute time.
    #[error("Query error: {message}")]
    Query {
        message: String,
        #[source]
        source: Option<sqlx::Error>,
    },

    /// An insert, update or delete failed to execute.
    #[error("Persistence error on {entity}: {message}")]
    Persistence {
        entity: String,
        message: String,
        #[source]
        source: Option<sqlx::Error>,
    },

    /// A migration failed inside a managed batch.
    #[error("Migration '{name}' failed: {source}")]
    Migration {
        name: String,
        #[source]
        source: Box<OrmError>,
    },

    /// DDL that the target dialect cannot express.
    #[error("Schema error: {0}")]
    Schema(String),

    /// An operation was attempted on an entity in the wrong life-cycle state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OrmError {
    /// Create a query error without a driver cause.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap a driver error raised while reading.
    pub fn query_failed(sql: &str, source: sqlx::Error) -> Self {
        Self::Query {
            message: format!("{source} (while executing `{sql}`)"),
            source: Some(source),
        }
    }

    /// Wrap a driver error raised while writing an entity's row.
    pub fn persistence(entity: impl Into<String>, sql: &str, source: sqlx::Error) -> Self {
        Self::Persistence {
            entity: entity.into(),
            message: format!("{source} (while executing `{sql}`)"),
            source: Some(source),
        }
    }

    /// Wrap a driver error raised by a builder-level statement.
    ///
    /// References to tables or columns that do not exist are query errors;
    /// everything else (constraints, lost connections) is a persistence error.
    pub fn execute_failed(entity: impl Into<String>, sql: &str, source: sqlx::Error) -> Self {
        if is_missing_reference(&source) {
            Self::query_failed(sql, source)
        } else {
            Self::persistence(entity, sql, source)
        }
    }

    /// Create a not-found error.
    pub fn not_found(entity: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            key: key.into(),
        }
    }

    /// Attach the name of the migration that was running.
    pub fn in_migration(self, name: impl Into<String>) -> Self {
        Self::Migration {
            name: name.into(),
            source: Box::new(self),
        }
    }
}

fn is_missing_reference(error: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db) = error else {
        return false;
    };
    let message = db.message().to_ascii_lowercase();
    ["no such column", "no such table", "unknown column", "does not exist", "doesn't exist"]
        .iter()
        .any(|needle| message.contains(needle))
}

/// Result type alias for tabula operations.
pub type OrmResult<T> = Result<T, OrmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OrmError::not_found("Account", "42");
        assert_eq!(err.to_string(), "No Account found for 42");
    }

    #[test]
    fn test_migration_error_wraps_cause() {
        let err = OrmError::query("bad operator").in_migration("2024_01_01_000000_create_users_table");
        assert_eq!(
            err.to_string(),
            "Migration '2024_01_01_000000_create_users_table' failed: Query error: bad operator"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_execute_failed_without_database_error_is_persistence() {
        let err = OrmError::execute_failed("Account", "UPDATE accounts SET x = ?", sqlx::Error::PoolClosed);
        assert!(matches!(err, OrmError::Persistence { .. }));
    }
}
