//! MySQL dialect implementation.

use super::{classify, AutoIncrStrategy, Dialect, IndexType, TypeClass};
use crate::value::ValueType;

/// MySQL dialect.
///
/// `engine` and `encoding` end up in every CREATE TABLE statement.
#[derive(Debug, Clone)]
pub struct MySqlDialect {
    engine: String,
    encoding: String,
}

impl Default for MySqlDialect {
    fn default() -> Self {
        Self::new("InnoDB", "UTF8")
    }
}

impl MySqlDialect {
    /// Creates a MySQL dialect with the given storage engine and charset.
    #[must_use]
    pub fn new(engine: impl Into<String>, encoding: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            encoding: encoding.into(),
        }
    }
}

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn to_sql_type(&self, value_type: &ValueType, max_size: usize, _is_auto_incr: bool) -> String {
        match classify(value_type) {
            TypeClass::Bool => "boolean".to_string(),
            TypeClass::Int { bits, signed } => {
                let base = match bits {
                    8 => "tinyint",
                    16 => "smallint",
                    32 => "int",
                    _ => "bigint",
                };
                if signed {
                    base.to_string()
                } else {
                    format!("{base} unsigned")
                }
            }
            TypeClass::Float { .. } => "double".to_string(),
            TypeClass::Bytes => "mediumblob".to_string(),
            TypeClass::Timestamp => "datetime".to_string(),
            TypeClass::Date => "date".to_string(),
            TypeClass::Text => {
                let size = if max_size < 1 { 255 } else { max_size };
                if size < 256 {
                    format!("varchar({size})")
                } else {
                    "text".to_string()
                }
            }
        }
    }

    fn auto_incr_str(&self) -> &'static str {
        "auto_increment"
    }

    fn auto_incr_bind_value(&self) -> &'static str {
        "null"
    }

    fn auto_increment_strategy(&self) -> AutoIncrStrategy {
        AutoIncrStrategy::LastInsertId
    }

    fn create_table_suffix(&self) -> String {
        format!(" engine={} charset={}", self.engine, self.encoding)
    }

    fn bind_var(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn identifier_quote(&self) -> char {
        '`'
    }

    fn if_schema_not_exists(&self, command: &str, _schema: &str) -> String {
        format!("{command} if not exists")
    }

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
        sql.push_str(" (");
        let cols: Vec<String> = columns.iter().map(|c| self.quote_field(c)).collect();
        sql.push_str(&cols.join(", "));
        sql.push(')');
        // MySQL puts the access method after the column list
        if let Some(index_type) = index_type {
            sql.push_str(" using ");
            sql.push_str(index_type.as_sql());
        }
        sql.push_str(self.query_suffix());
        sql
    }

    fn drop_index_sql(&self, name: &str, table: &str) -> String {
        format!(
            "drop index {} on {}{}",
            self.quote_field(name),
            table,
            self.query_suffix()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mysql_types() {
        let dialect = MySqlDialect::default();
        assert_eq!(dialect.to_sql_type(&ValueType::I8, 0, false), "tinyint");
        assert_eq!(dialect.to_sql_type(&ValueType::U8, 0, false), "tinyint unsigned");
        assert_eq!(dialect.to_sql_type(&ValueType::U64, 0, false), "bigint unsigned");
        assert_eq!(dialect.to_sql_type(&ValueType::Text, 0, false), "varchar(255)");
        assert_eq!(dialect.to_sql_type(&ValueType::Text, 1024, false), "text");
        assert_eq!(dialect.to_sql_type(&ValueType::Bytes, 0, false), "mediumblob");
    }

    #[test]
    fn test_mysql_quoting_and_suffixes() {
        let dialect = MySqlDialect::new("MyISAM", "latin1");
        assert_eq!(dialect.quote_field("id"), "`id`");
        assert_eq!(
            dialect.quoted_table_for_query(Some("shop"), "orders"),
            "`shop`.`orders`"
        );
        assert_eq!(dialect.create_table_suffix(), " engine=MyISAM charset=latin1");
        assert_eq!(
            dialect.drop_index_sql("idx_name", "`orders`"),
            "drop index `idx_name` on `orders`;"
        );
    }

    #[test]
    fn test_mysql_index_type_after_columns() {
        let dialect = MySqlDialect::default();
        let sql = dialect.create_index_sql(
            "idx_email",
            true,
            Some(IndexType::Hash),
            "`users`",
            &["email".to_string()],
        );
        assert_eq!(
            sql,
            "create unique index `idx_email` on `users` (`email`) using hash;"
        );
    }
}
