//! Schema management for registered tables.

use tracing::{debug, info};

use crate::dbmap::DbMap;
use crate::dialect::Dialect;
use crate::error::{DbMapError, Result};
use crate::executor::SqlExecutor;
use crate::schema::{ColumnMap, TableMap};

fn column_definition(dialect: &dyn Dialect, column: &ColumnMap, single_key: bool) -> String {
    let mut parts = vec![
        dialect.quote_field(column.column_name()),
        column.sql_type(dialect).into_owned(),
    ];

    if column.is_not_null() || column.is_primary_key() {
        parts.push("not null".to_string());
    }
    if column.is_primary_key() && single_key {
        parts.push("primary key".to_string());
    }
    if column.is_auto_increment() && !dialect.auto_incr_str().is_empty() {
        parts.push(dialect.auto_incr_str().to_string());
    }
    if column.is_unique() {
        parts.push("unique".to_string());
    }
    if let Some(default) = column.default_value() {
        parts.push(format!("default {default}"));
    }

    parts.join(" ")
}

/// Builds the CREATE TABLE statement of a table.
///
/// Transient columns are left out. A single key column is declared inline;
/// composite keys get a table-level `primary key (..)` clause.
#[must_use]
pub fn create_table_sql(dialect: &dyn Dialect, table: &TableMap, if_not_exists: bool) -> String {
    let command = if if_not_exists {
        dialect.if_table_not_exists("create table", table.schema_name(), table.name())
    } else {
        "create table".to_string()
    };

    let single_key = table.key_count() == 1;
    let mut defs: Vec<String> = table
        .columns()
        .iter()
        .filter(|c| !c.is_transient())
        .map(|c| column_definition(dialect, c, single_key))
        .collect();

    if table.key_count() > 1 {
        let keys: Vec<String> = table
            .key_columns()
            .map(|c| dialect.quote_field(c.column_name()))
            .collect();
        defs.push(format!("primary key ({})", keys.join(", ")));
    }
    for fields in table.unique_together() {
        defs.push(format!("unique ({})", table.quoted_columns(dialect, fields).join(", ")));
    }

    format!(
        "{command} {} ({}){}{}",
        table.quoted_name(dialect),
        defs.join(", "),
        dialect.create_table_suffix(),
        dialect.query_suffix()
    )
}

fn drop_table_sql(dialect: &dyn Dialect, table: &TableMap, if_exists: bool) -> String {
    let command = if if_exists {
        dialect.if_table_exists("drop table", table.schema_name(), table.name())
    } else {
        "drop table".to_string()
    };
    let cascade = if dialect.supports_cascade() { " cascade" } else { "" };
    format!(
        "{command} {}{cascade}{}",
        table.quoted_name(dialect),
        dialect.query_suffix()
    )
}

impl DbMap {
    /// Creates every registered table.
    ///
    /// Tables in a named schema get a `create schema` first on dialects that
    /// support schemas.
    pub async fn create_tables<E>(&self, exec: &mut E) -> Result<()>
    where
        E: SqlExecutor + ?Sized,
    {
        self.create_all(exec, false).await
    }

    /// Creates every registered table that does not exist yet.
    pub async fn create_tables_if_not_exists<E>(&self, exec: &mut E) -> Result<()>
    where
        E: SqlExecutor + ?Sized,
    {
        self.create_all(exec, true).await
    }

    async fn create_all<E>(&self, exec: &mut E, if_not_exists: bool) -> Result<()>
    where
        E: SqlExecutor + ?Sized,
    {
        let dialect = self.dialect();
        for table in self.tables() {
            if let Some(schema) = table.schema_name() {
                if dialect.supports_multi_schema() {
                    let command = format!("create schema {}", dialect.quote_field(schema));
                    let sql = format!(
                        "{}{}",
                        dialect.if_schema_not_exists(&command, schema),
                        dialect.query_suffix()
                    );
                    self.exec_logged(exec, &sql, &[]).await?;
                }
            }
            let sql = create_table_sql(dialect, table, if_not_exists);
            self.exec_logged(exec, &sql, &[]).await?;
            info!(table = %table.name(), "created table");
        }
        Ok(())
    }

    /// Drops every registered table, newest registration first.
    pub async fn drop_tables<E>(&self, exec: &mut E) -> Result<()>
    where
        E: SqlExecutor + ?Sized,
    {
        for table in self.tables().iter().rev() {
            self.drop_one(exec, table, false).await?;
        }
        Ok(())
    }

    /// Drops every registered table that exists.
    pub async fn drop_tables_if_exists<E>(&self, exec: &mut E) -> Result<()>
    where
        E: SqlExecutor + ?Sized,
    {
        for table in self.tables().iter().rev() {
            self.drop_one(exec, table, true).await?;
        }
        Ok(())
    }

    /// Drops the table registered for `T`.
    pub async fn drop_table<T: 'static, E>(&self, exec: &mut E) -> Result<()>
    where
        E: SqlExecutor + ?Sized,
    {
        let table = self.table::<T>()?;
        self.drop_one(exec, table, false).await
    }

    /// Drops the table registered for `T` if it exists.
    ///
    /// An unregistered type fails with [`DbMapError::TableNotFound`], which
    /// callers may treat as non-fatal.
    pub async fn drop_table_if_exists<T: 'static, E>(&self, exec: &mut E) -> Result<()>
    where
        E: SqlExecutor + ?Sized,
    {
        let table = self.table::<T>()?;
        self.drop_one(exec, table, true).await
    }

    async fn drop_one<E>(&self, exec: &mut E, table: &TableMap, if_exists: bool) -> Result<()>
    where
        E: SqlExecutor + ?Sized,
    {
        let sql = drop_table_sql(self.dialect(), table, if_exists);
        self.exec_logged(exec, &sql, &[]).await?;
        info!(table = %table.name(), "dropped table");
        Ok(())
    }

    /// Removes every row from every registered table.
    pub async fn truncate_tables<E>(&self, exec: &mut E) -> Result<()>
    where
        E: SqlExecutor + ?Sized,
    {
        let dialect = self.dialect();
        for table in self.tables() {
            let sql = format!(
                "{} {}{}",
                dialect.truncate_clause(),
                table.quoted_name(dialect),
                dialect.query_suffix()
            );
            self.exec_logged(exec, &sql, &[]).await?;
            debug!(table = %table.name(), "truncated table");
        }
        Ok(())
    }

    /// Creates the declared indexes of every registered table.
    pub async fn create_indexes<E>(&self, exec: &mut E) -> Result<()>
    where
        E: SqlExecutor + ?Sized,
    {
        let dialect = self.dialect();
        for table in self.tables() {
            let quoted = table.quoted_name(dialect);
            for index in table.indexes() {
                let columns: Vec<String> = index
                    .columns()
                    .iter()
                    .map(|f| {
                        table
                            .column(f)
                            .map_or_else(|| f.clone(), |c| c.column_name().to_string())
                    })
                    .collect();
                let sql = dialect.create_index_sql(
                    index.name(),
                    index.is_unique(),
                    index.index_type(),
                    &quoted,
                    &columns,
                );
                self.exec_logged(exec, &sql, &[]).await?;
                debug!(table = %table.name(), index = %index.name(), "created index");
            }
        }
        Ok(())
    }

    /// Drops the index `name` declared on the table of `T`.
    pub async fn drop_index<T: 'static, E>(&self, exec: &mut E, name: &str) -> Result<()>
    where
        E: SqlExecutor + ?Sized,
    {
        let table = self.table::<T>()?;
        if !table.indexes().iter().any(|i| i.name() == name) {
            return Err(DbMapError::InvalidSchema(format!(
                "table {} has no index {name}",
                table.name()
            )));
        }
        let sql = self
            .dialect()
            .drop_index_sql(name, &table.quoted_name(self.dialect()));
        self.exec_logged(exec, &sql, &[]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySqlDialect, PostgresDialect, SqliteDialect};
    use crate::record::FieldDef;
    use crate::value::ValueType;

    fn account() -> TableMap {
        TableMap::new(
            "accounts",
            None,
            "Account",
            &[
                FieldDef::new("id", ValueType::I64).primary_key().auto_increment(),
                FieldDef::new("email", ValueType::Text).max_size(120).unique(),
                FieldDef::new("active", ValueType::Bool).not_null().default_value("1"),
                FieldDef::new("version", ValueType::I64).version(),
                FieldDef::new("session", ValueType::Text).transient(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_create_table_sqlite() {
        let sql = create_table_sql(&SqliteDialect::new(), &account(), true);
        assert_eq!(
            sql,
            "create table if not exists \"accounts\" \
             (\"id\" integer not null primary key autoincrement, \
             \"email\" varchar(120) unique, \
             \"active\" integer not null default 1, \"version\" integer);"
        );
    }

    #[test]
    fn test_create_table_mysql_suffix() {
        let sql = create_table_sql(&MySqlDialect::default(), &account(), false);
        assert!(sql.starts_with(
            "create table `accounts` (`id` bigint not null primary key auto_increment"
        ));
        assert!(sql.ends_with(") engine=InnoDB charset=UTF8;"));
    }

    #[test]
    fn test_create_table_per_dialect_types() {
        let table = account();
        let sqlite = create_table_sql(&SqliteDialect::new(), &table, false);
        assert!(sqlite.contains("\"active\" integer not null"));
        let postgres = create_table_sql(&PostgresDialect::new(), &table, false);
        assert!(postgres.contains("\"id\" bigserial not null primary key"));
        assert!(postgres.contains("\"active\" boolean not null default 1"));
    }

    #[test]
    fn test_composite_key_and_unique_together() {
        let mut table = TableMap::new(
            "memberships",
            None,
            "Membership",
            &[
                FieldDef::new("group_id", ValueType::I64),
                FieldDef::new("user_id", ValueType::I64),
                FieldDef::new("role", ValueType::Text),
            ],
        )
        .unwrap();
        table.set_keys(false, &["group_id", "user_id"]).unwrap();
        table.set_unique_together(&["user_id", "role"]).unwrap();
        let sql = create_table_sql(&PostgresDialect::new(), &table, false);
        assert!(sql.contains("\"group_id\" bigint not null, \"user_id\" bigint not null"));
        assert!(sql.contains("primary key (\"group_id\", \"user_id\")"));
        assert!(sql.ends_with("unique (\"user_id\", \"role\"));"));
    }

    #[test]
    fn test_drop_table_cascade_where_supported() {
        let table = account();
        assert_eq!(
            drop_table_sql(&PostgresDialect::new(), &table, true),
            "drop table if exists \"accounts\" cascade;"
        );
        assert_eq!(
            drop_table_sql(&SqliteDialect::new(), &table, false),
            "drop table \"accounts\";"
        );
    }
}
