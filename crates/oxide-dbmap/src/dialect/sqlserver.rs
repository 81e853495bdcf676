//! SQL Server dialect implementation.

use super::{classify, quote_with, AutoIncrStrategy, Dialect, TypeClass};
use crate::value::ValueType;

/// SQL Server dialect.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlServerDialect;

impl SqlServerDialect {
    /// Creates a new SQL Server dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn object_name(schema: Option<&str>, table: &str) -> String {
        match schema {
            Some(schema) if !schema.is_empty() => format!("{schema}.{table}"),
            _ => table.to_string(),
        }
    }
}

impl Dialect for SqlServerDialect {
    fn name(&self) -> &'static str {
        "sqlserver"
    }

    fn to_sql_type(&self, value_type: &ValueType, max_size: usize, _is_auto_incr: bool) -> String {
        match classify(value_type) {
            TypeClass::Bool => "bit".to_string(),
            TypeClass::Int { bits: 8, signed: true } => "tinyint".to_string(),
            TypeClass::Int {
                bits: 8,
                signed: false,
            }
            | TypeClass::Int {
                bits: 16,
                signed: true,
            } => "smallint".to_string(),
            TypeClass::Int {
                bits: 16,
                signed: false,
            }
            | TypeClass::Int {
                bits: 32,
                signed: true,
            } => "int".to_string(),
            TypeClass::Int {
                bits: 32,
                signed: false,
            }
            | TypeClass::Int {
                bits: 64,
                signed: true,
            } => "bigint".to_string(),
            TypeClass::Int { .. } => "numeric(20,0)".to_string(),
            TypeClass::Float { bits: 32 } => "float(24)".to_string(),
            TypeClass::Float { .. } => "float(53)".to_string(),
            TypeClass::Bytes => "varbinary(max)".to_string(),
            TypeClass::Timestamp => "datetime2".to_string(),
            TypeClass::Date => "date".to_string(),
            TypeClass::Text => {
                if max_size < 1 {
                    "nvarchar(max)".to_string()
                } else {
                    format!("nvarchar({max_size})")
                }
            }
        }
    }

    fn auto_incr_str(&self) -> &'static str {
        "identity(0,1)"
    }

    fn auto_incr_bind_value(&self) -> &'static str {
        ""
    }

    fn auto_incr_output_clause(&self, column: &str) -> String {
        format!(" output inserted.{}", self.quote_field(column))
    }

    fn auto_increment_strategy(&self) -> AutoIncrStrategy {
        AutoIncrStrategy::Returning
    }

    fn bind_var(&self, index: usize) -> String {
        format!("@p{}", index + 1)
    }

    fn quote_field(&self, field: &str) -> String {
        quote_with('[', ']', field)
    }

    fn if_schema_not_exists(&self, command: &str, schema: &str) -> String {
        format!("if schema_id(N'{schema}') is null {command}")
    }

    fn if_table_exists(&self, command: &str, schema: Option<&str>, table: &str) -> String {
        format!(
            "if object_id('{}') is not null {command}",
            Self::object_name(schema, table)
        )
    }

    fn if_table_not_exists(&self, command: &str, schema: Option<&str>, table: &str) -> String {
        format!(
            "if object_id('{}') is null {command}",
            Self::object_name(schema, table)
        )
    }

    fn truncate_clause(&self) -> &'static str {
        "truncate table"
    }

    fn drop_index_sql(&self, name: &str, table: &str) -> String {
        format!(
            "drop index {} on {}{}",
            self.quote_field(name),
            table,
            self.query_suffix()
        )
    }

    fn savepoint_sql(&self, name: &str) -> String {
        format!("save transaction {}", self.quote_field(name))
    }

    fn release_savepoint_sql(&self, _name: &str) -> Option<String> {
        None
    }

    fn rollback_to_savepoint_sql(&self, name: &str) -> String {
        format!("rollback transaction {}", self.quote_field(name))
    }
}
