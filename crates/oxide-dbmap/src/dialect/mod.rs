//! SQL dialect support.
//!
//! Different databases disagree on placeholders, identifier quoting, column
//! types and how a generated key is handed back after an INSERT. A
//! [`Dialect`] is a stateless strategy value answering those questions from
//! primitive inputs; it never touches a connection.

mod mysql;
mod oracle;
mod postgres;
mod sqlite;
mod sqlserver;

use std::fmt;

pub use mysql::MySqlDialect;
pub use oracle::OracleDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;
pub use sqlserver::SqlServerDialect;

use crate::error::{DbMapError, Result};
use crate::value::ValueType;

/// How a dialect hands back the key generated by an INSERT.
///
/// Resolved once when a `DbMap` is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoIncrStrategy {
    /// Bind `auto_incr_bind_value`, then read the driver's last-insert id.
    LastInsertId,
    /// Append `auto_incr_insert_suffix` and read the key from the INSERT's
    /// own result row.
    Returning,
    /// Execute the INSERT, then run a secondary id query.
    GeneratedIdQuery,
}

/// Index access method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    BTree,
    Hash,
    Gist,
    Gin,
}

impl IndexType {
    /// Returns the SQL keyword of the access method.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::BTree => "btree",
            Self::Hash => "hash",
            Self::Gist => "gist",
            Self::Gin => "gin",
        }
    }
}

/// Storage class a `ValueType` resolves to before a dialect names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    Bool,
    Int { bits: u8, signed: bool },
    Float { bits: u8 },
    Bytes,
    Timestamp,
    Date,
    Text,
}

/// Resolves a value type to its storage class.
///
/// `Optional` layers are stripped first, then the shape decides. Types known
/// only by name fall back to matching that name; anything unrecognised is
/// stored as text.
#[must_use]
pub fn classify(value_type: &ValueType) -> TypeClass {
    match value_type.dereferenced() {
        ValueType::Bool => TypeClass::Bool,
        ValueType::I8 => TypeClass::Int { bits: 8, signed: true },
        ValueType::I16 => TypeClass::Int { bits: 16, signed: true },
        ValueType::I32 => TypeClass::Int { bits: 32, signed: true },
        ValueType::I64 => TypeClass::Int { bits: 64, signed: true },
        ValueType::U8 => TypeClass::Int { bits: 8, signed: false },
        ValueType::U16 => TypeClass::Int { bits: 16, signed: false },
        ValueType::U32 => TypeClass::Int { bits: 32, signed: false },
        ValueType::U64 => TypeClass::Int { bits: 64, signed: false },
        ValueType::F32 => TypeClass::Float { bits: 32 },
        ValueType::F64 => TypeClass::Float { bits: 64 },
        ValueType::Bytes => TypeClass::Bytes,
        ValueType::Text | ValueType::Optional(_) => TypeClass::Text,
        ValueType::Named(name) => classify_name(name),
    }
}

fn classify_name(name: &str) -> TypeClass {
    match name {
        "NullBool" => TypeClass::Bool,
        "NullByte" => TypeClass::Int { bits: 8, signed: false },
        "NullInt16" => TypeClass::Int { bits: 16, signed: true },
        "NullInt32" => TypeClass::Int { bits: 32, signed: true },
        "NullInt64" => TypeClass::Int { bits: 64, signed: true },
        "NullFloat64" => TypeClass::Float { bits: 64 },
        "NullTime" | "Time" | "Timestamp" | "NaiveDateTime" | "DateTime" => TypeClass::Timestamp,
        "NaiveDate" | "Date" => TypeClass::Date,
        _ => TypeClass::Text,
    }
}

/// Trait for SQL dialect-specific behavior.
///
/// All methods are pure: identical inputs always produce identical output.
pub trait Dialect: fmt::Debug + Send + Sync {
    /// Returns the name of the dialect.
    fn name(&self) -> &'static str;

    /// Terminator appended to generated statements.
    fn query_suffix(&self) -> &'static str {
        ";"
    }

    /// Maps a field type to a column type.
    ///
    /// `max_size` chooses between bounded and unbounded text; zero means
    /// unset. Must return a type for every input.
    fn to_sql_type(&self, value_type: &ValueType, max_size: usize, is_auto_incr: bool) -> String;

    /// Column attribute marking an auto-increment key in CREATE TABLE.
    fn auto_incr_str(&self) -> &'static str;

    /// Literal bound in place of the auto-increment column on INSERT.
    ///
    /// An empty string leaves the column out of the INSERT entirely.
    fn auto_incr_bind_value(&self) -> &'static str;

    /// Clause appended to an INSERT that has an auto-increment column.
    fn auto_incr_insert_suffix(&self, _column: &str) -> String {
        String::new()
    }

    /// Clause placed between the column list and `values` of an INSERT
    /// that has an auto-increment column.
    fn auto_incr_output_clause(&self, _column: &str) -> String {
        String::new()
    }

    /// How the generated key is read back.
    fn auto_increment_strategy(&self) -> AutoIncrStrategy;

    /// Id query used by [`AutoIncrStrategy::GeneratedIdQuery`] when the
    /// column does not declare one.
    fn default_generated_id_query(&self, _schema: Option<&str>, _table: &str) -> Option<String> {
        None
    }

    /// Trailing options of CREATE TABLE.
    fn create_table_suffix(&self) -> String {
        String::new()
    }

    /// Returns the positional placeholder for the zero-based `index`.
    fn bind_var(&self, index: usize) -> String;

    /// Returns the identifier quote character.
    fn identifier_quote(&self) -> char {
        '"'
    }

    /// Quotes a column or other identifier.
    fn quote_field(&self, field: &str) -> String {
        quote_with(self.identifier_quote(), self.identifier_quote(), field)
    }

    /// Returns the schema-qualified, quoted table name.
    fn quoted_table_for_query(&self, schema: Option<&str>, table: &str) -> String {
        match schema {
            Some(schema) if !schema.is_empty() => {
                format!("{}.{}", self.quote_field(schema), self.quote_field(table))
            }
            _ => self.quote_field(table),
        }
    }

    /// Wraps `command` (e.g. `create schema`) with a not-exists guard.
    fn if_schema_not_exists(&self, command: &str, _schema: &str) -> String {
        format!("{command} if not exists")
    }

    /// Wraps `command` (e.g. `drop table`) with an exists guard.
    fn if_table_exists(&self, command: &str, _schema: Option<&str>, _table: &str) -> String {
        format!("{command} if exists")
    }

    /// Wraps `command` (e.g. `create table`) with a not-exists guard.
    fn if_table_not_exists(&self, command: &str, _schema: Option<&str>, _table: &str) -> String {
        format!("{command} if not exists")
    }

    /// Statement prefix that empties a table.
    fn truncate_clause(&self) -> &'static str {
        "truncate"
    }

    /// Builds CREATE INDEX. `table` is already qualified and quoted.
    fn create_index_sql(
        &self,
        name: &str,
        unique: bool,
        index_type: Option<IndexType>,
        table: &str,
        columns: &[String],
    ) -> String {
        let mut sql = String::from("create ");
        if unique {
            sql.push_str("unique ");
        }
        sql.push_str("index ");
        sql.push_str(&self.quote_field(name));
        sql.push_str(" on ");
        sql.push_str(table);
        if let Some(index_type) = index_type {
            sql.push_str(" using ");
            sql.push_str(index_type.as_sql());
        }
        sql.push_str(" (");
        let cols: Vec<String> = columns.iter().map(|c| self.quote_field(c)).collect();
        sql.push_str(&cols.join(", "));
        sql.push(')');
        sql.push_str(self.query_suffix());
        sql
    }

    /// Builds DROP INDEX. `table` is already qualified and quoted.
    fn drop_index_sql(&self, name: &str, _table: &str) -> String {
        format!("drop index {}{}", self.quote_field(name), self.query_suffix())
    }

    /// Creates a savepoint inside the current transaction.
    fn savepoint_sql(&self, name: &str) -> String {
        format!("savepoint {}", self.quote_field(name))
    }

    /// Releases a savepoint; `None` when the dialect has no such statement.
    fn release_savepoint_sql(&self, name: &str) -> Option<String> {
        Some(format!("release savepoint {}", self.quote_field(name)))
    }

    /// Rolls back to a savepoint.
    fn rollback_to_savepoint_sql(&self, name: &str) -> String {
        format!("rollback to savepoint {}", self.quote_field(name))
    }

    /// Whether DROP TABLE accepts CASCADE.
    fn supports_cascade(&self) -> bool {
        false
    }

    /// Whether tables can live in named schemas.
    fn supports_multi_schema(&self) -> bool {
        true
    }

    /// Whether the driver reports the last inserted id.
    fn supports_last_insert_id(&self) -> bool {
        self.auto_increment_strategy() == AutoIncrStrategy::LastInsertId
    }
}

/// Quotes `ident`, doubling any embedded closing quote.
pub(crate) fn quote_with(open: char, close: char, ident: &str) -> String {
    let mut quoted = String::with_capacity(ident.len() + 2);
    quoted.push(open);
    for c in ident.chars() {
        if c == close {
            quoted.push(close);
        }
        quoted.push(c);
    }
    quoted.push(close);
    quoted
}

/// Resolves a dialect by name.
///
/// Accepts `sqlite`/`sqlite3`, `postgres`/`postgresql`/`pg`, `mysql`,
/// `sqlserver`/`mssql` and `oracle`, case-insensitively.
pub fn dialect_from_name(name: &str) -> Result<Box<dyn Dialect>> {
    match name.to_ascii_lowercase().as_str() {
        "sqlite" | "sqlite3" => Ok(Box::new(SqliteDialect::new())),
        "postgres" | "postgresql" | "pg" => Ok(Box::new(PostgresDialect::new())),
        "mysql" => Ok(Box::new(MySqlDialect::default())),
        "sqlserver" | "mssql" => Ok(Box::new(SqlServerDialect::new())),
        "oracle" => Ok(Box::new(OracleDialect::new())),
        _ => Err(DbMapError::InvalidDialect(name.to_string())),
    }
}
