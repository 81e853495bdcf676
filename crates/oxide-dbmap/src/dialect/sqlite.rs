//! SQLite dialect implementation.

use super::{classify, AutoIncrStrategy, Dialect, TypeClass};
use crate::value::ValueType;

/// SQLite dialect.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn to_sql_type(&self, value_type: &ValueType, max_size: usize, _is_auto_incr: bool) -> String {
        // SQLite has dynamic typing with type affinity
        match classify(value_type) {
            TypeClass::Bool | TypeClass::Int { .. } => "integer".to_string(),
            TypeClass::Float { .. } => "real".to_string(),
            TypeClass::Bytes => "blob".to_string(),
            TypeClass::Timestamp => "datetime".to_string(),
            TypeClass::Date => "date".to_string(),
            TypeClass::Text => {
                let size = if max_size < 1 { 255 } else { max_size };
                format!("varchar({size})")
            }
        }
    }

    fn auto_incr_str(&self) -> &'static str {
        "autoincrement"
    }

    fn auto_incr_bind_value(&self) -> &'static str {
        "null"
    }

    fn auto_increment_strategy(&self) -> AutoIncrStrategy {
        AutoIncrStrategy::LastInsertId
    }

    fn bind_var(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn quoted_table_for_query(&self, _schema: Option<&str>, table: &str) -> String {
        // Attached databases aside, SQLite has a single schema
        self.quote_field(table)
    }

    fn truncate_clause(&self) -> &'static str {
        "delete from"
    }

    fn supports_multi_schema(&self) -> bool {
        false
    }
}
