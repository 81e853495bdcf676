//! Error types for the mapper.

use std::fmt;

use thiserror::Error;

use crate::hooks::HookStage;
use crate::value::SqlValue;

/// Boxed error returned by lifecycle hooks and type converters.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Mapper errors.
#[derive(Debug, Error)]
pub enum DbMapError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Unknown or unusable dialect.
    #[error("invalid dialect: {0}")]
    InvalidDialect(String),

    /// No table is registered for the record type.
    #[error("no table registered for type {type_name}")]
    TableNotFound {
        /// Name of the record type.
        type_name: &'static str,
    },

    /// A field named during registration does not exist.
    #[error("no field {field} on table {table}")]
    ColumnNotFound {
        /// Table name.
        table: String,
        /// Requested field name.
        field: String,
    },

    /// Result columns without a matching destination field.
    #[error(transparent)]
    NoFieldInType(#[from] NoFieldInTypeError),

    /// A single-row fetch matched nothing.
    #[error("no rows in result set")]
    NoRows,

    /// A single-row fetch matched more than one row.
    #[error("multiple rows returned ({count}) when one was expected for: {query}")]
    MultipleRows {
        /// Number of rows returned.
        count: usize,
        /// The query that produced them.
        query: String,
    },

    /// A versioned UPDATE or DELETE affected no rows.
    #[error(transparent)]
    OptimisticLock(#[from] OptimisticLockError),

    /// A lifecycle hook failed.
    #[error(transparent)]
    Hook(#[from] HookError),

    /// The transaction was already committed or rolled back.
    #[error("transaction has already been committed or rolled back")]
    TransactionClosed,

    /// A value could not be converted to the destination type.
    #[error("conversion error on {field}: {source}")]
    Conversion {
        /// Field being assigned.
        field: String,
        /// Underlying conversion failure.
        source: ConversionError,
    },

    /// A registered `TypeConverter` rejected a value.
    #[error("type converter failed on {field}: {source}")]
    TypeConverter {
        /// Field being converted.
        field: String,
        /// Error returned by the converter.
        source: BoxError,
    },

    /// The destination does not fit the result shape.
    #[error("scan error: {0}")]
    Scan(String),

    /// Wrong number of key values for a table.
    #[error("table {table} has {expected} key column(s), got {got} value(s)")]
    KeyCount {
        /// Table name.
        table: String,
        /// Declared key columns.
        expected: usize,
        /// Supplied key values.
        got: usize,
    },

    /// The operation needs primary keys but the table has none.
    #[error("table {0} has no primary key")]
    NoKeys(String),

    /// Registration produced an unusable schema.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// Configuration could not be read.
    #[error("configuration error: {0}")]
    Config(String),
}

impl DbMapError {
    /// Returns whether the result of the call is still usable.
    ///
    /// Missing destination fields during a select and missing tables during
    /// idempotent operations are non-fatal.
    #[must_use]
    pub const fn is_non_fatal(&self) -> bool {
        matches!(self, Self::NoFieldInType(_) | Self::TableNotFound { .. })
    }

    pub(crate) fn conversion(field: impl Into<String>, source: ConversionError) -> Self {
        Self::Conversion {
            field: field.into(),
            source,
        }
    }
}

/// Result type alias for mapper operations.
pub type Result<T> = std::result::Result<T, DbMapError>;

/// Result columns that had no field in the destination type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no fields {missing_columns:?} in type {type_name}")]
pub struct NoFieldInTypeError {
    /// Destination type.
    pub type_name: &'static str,
    /// Columns that were discarded.
    pub missing_columns: Vec<String>,
}

/// Conflict detected through the version column.
///
/// Raised whenever a versioned UPDATE or DELETE affects zero rows.
/// `row_exists` tells whether a row with the same keys was still present
/// when the conflict was reported.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimisticLockError {
    /// Table name.
    pub table: String,
    /// Key values of the entity.
    pub keys: Vec<SqlValue>,
    /// Whether a row with these keys still exists.
    pub row_exists: bool,
    /// Version held by the caller.
    pub local_version: i64,
}

impl fmt::Display for OptimisticLockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.keys.iter().map(SqlValue::to_sql_inline).collect();
        if self.row_exists {
            write!(
                f,
                "optimistic lock failed on {} keys [{}]: local version {} is stale",
                self.table,
                keys.join(", "),
                self.local_version
            )
        } else {
            write!(
                f,
                "optimistic lock failed on {} keys [{}]: row no longer exists",
                self.table,
                keys.join(", ")
            )
        }
    }
}

impl std::error::Error for OptimisticLockError {}

/// A lifecycle hook aborted the operation.
#[derive(Debug, Error)]
#[error("{stage} hook failed for {entity}: {source}")]
pub struct HookError {
    /// Stage that failed.
    pub stage: HookStage,
    /// Table and key values of the entity.
    pub entity: String,
    /// Error returned by the hook.
    pub source: BoxError,
}

/// A `SqlValue` that does not fit the requested Rust type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot convert {found} value to {expected}")]
pub struct ConversionError {
    /// Target type.
    pub expected: &'static str,
    /// Variant of the offending value.
    pub found: &'static str,
}

impl ConversionError {
    /// Creates an error for `value` not converting to `expected`.
    #[must_use]
    pub const fn new(expected: &'static str, value: &SqlValue) -> Self {
        Self {
            expected,
            found: value.kind(),
        }
    }

    /// Creates an error for a Rust value of type `found` that has no
    /// `expected` SQL representation.
    #[must_use]
    pub const fn unrepresentable(found: &'static str, expected: &'static str) -> Self {
        Self { expected, found }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_fatal_classification() {
        let missing = DbMapError::NoFieldInType(NoFieldInTypeError {
            type_name: "User",
            missing_columns: vec!["extra".into()],
        });
        assert!(missing.is_non_fatal());
        assert!(DbMapError::TableNotFound { type_name: "User" }.is_non_fatal());
        assert!(!DbMapError::NoRows.is_non_fatal());
        assert!(!DbMapError::TransactionClosed.is_non_fatal());
    }

    #[test]
    fn test_optimistic_lock_message() {
        let err = OptimisticLockError {
            table: "users".into(),
            keys: vec![SqlValue::Int(7)],
            row_exists: true,
            local_version: 3,
        };
        assert_eq!(
            err.to_string(),
            "optimistic lock failed on users keys [7]: local version 3 is stale"
        );
    }
}
