//! Oracle dialect implementation.

use super::{classify, quote_with, AutoIncrStrategy, Dialect, TypeClass};
use crate::value::ValueType;

/// Oracle dialect.
///
/// Keys come from sequences, so an auto-increment column must declare its
/// generated-id query (e.g. `select users_seq.currval from dual`).
#[derive(Debug, Default, Clone, Copy)]
pub struct OracleDialect;

impl OracleDialect {
    /// Creates a new Oracle dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for OracleDialect {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn query_suffix(&self) -> &'static str {
        ""
    }

    fn to_sql_type(&self, value_type: &ValueType, max_size: usize, _is_auto_incr: bool) -> String {
        match classify(value_type) {
            TypeClass::Bool => "number(1)".to_string(),
            TypeClass::Int { bits, .. } if bits <= 32 => "number(10)".to_string(),
            TypeClass::Int { .. } => "number(19)".to_string(),
            TypeClass::Float { .. } => "binary_double".to_string(),
            TypeClass::Bytes => "blob".to_string(),
            TypeClass::Timestamp => "timestamp with time zone".to_string(),
            TypeClass::Date => "date".to_string(),
            TypeClass::Text => {
                let size = if max_size < 1 { 255 } else { max_size };
                format!("varchar2({size})")
            }
        }
    }

    fn auto_incr_str(&self) -> &'static str {
        ""
    }

    fn auto_incr_bind_value(&self) -> &'static str {
        "null"
    }

    fn auto_increment_strategy(&self) -> AutoIncrStrategy {
        AutoIncrStrategy::GeneratedIdQuery
    }

    fn bind_var(&self, index: usize) -> String {
        format!(":{}", index + 1)
    }

    fn quote_field(&self, field: &str) -> String {
        quote_with('"', '"', &field.to_uppercase())
    }

    fn if_schema_not_exists(&self, command: &str, _schema: &str) -> String {
        command.to_string()
    }

    fn if_table_exists(&self, command: &str, _schema: Option<&str>, _table: &str) -> String {
        command.to_string()
    }

    fn if_table_not_exists(&self, command: &str, _schema: Option<&str>, _table: &str) -> String {
        command.to_string()
    }

    fn truncate_clause(&self) -> &'static str {
        "truncate table"
    }

    fn supports_cascade(&self) -> bool {
        true
    }
}
