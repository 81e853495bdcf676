//! PostgreSQL dialect implementation.

use super::{classify, quote_with, AutoIncrStrategy, Dialect, TypeClass};
use crate::value::ValueType;

/// PostgreSQL dialect.
///
/// With `lowercase_fields` set, identifiers are folded to lower case before
/// quoting, matching how unquoted names are stored by the server.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresDialect {
    lowercase_fields: bool,
}

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lowercase_fields: false,
        }
    }

    /// Folds quoted identifiers to lower case.
    #[must_use]
    pub const fn lowercase_fields(mut self, enabled: bool) -> Self {
        self.lowercase_fields = enabled;
        self
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn to_sql_type(&self, value_type: &ValueType, max_size: usize, is_auto_incr: bool) -> String {
        match classify(value_type) {
            TypeClass::Bool => "boolean".to_string(),
            TypeClass::Int { bits, signed } if bits < 32 || (bits == 32 && signed) => {
                let name = if is_auto_incr { "serial" } else { "integer" };
                name.to_string()
            }
            TypeClass::Int { .. } => {
                let name = if is_auto_incr { "bigserial" } else { "bigint" };
                name.to_string()
            }
            TypeClass::Float { .. } => "double precision".to_string(),
            TypeClass::Bytes => "bytea".to_string(),
            TypeClass::Timestamp => "timestamp with time zone".to_string(),
            TypeClass::Date => "date".to_string(),
            TypeClass::Text => {
                if max_size > 0 {
                    format!("varchar({max_size})")
                } else {
                    "text".to_string()
                }
            }
        }
    }

    fn auto_incr_str(&self) -> &'static str {
        // SERIAL/BIGSERIAL carry the sequence
        ""
    }

    fn auto_incr_bind_value(&self) -> &'static str {
        "default"
    }

    fn auto_incr_insert_suffix(&self, column: &str) -> String {
        format!(" returning {}", self.quote_field(column))
    }

    fn auto_increment_strategy(&self) -> AutoIncrStrategy {
        AutoIncrStrategy::Returning
    }

    fn bind_var(&self, index: usize) -> String {
        format!("${}", index + 1)
    }

    fn quote_field(&self, field: &str) -> String {
        if self.lowercase_fields {
            quote_with('"', '"', &field.to_lowercase())
        } else {
            quote_with('"', '"', field)
        }
    }

    fn supports_cascade(&self) -> bool {
        true
    }
}
