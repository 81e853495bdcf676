//! The mapper: registered tables, dialect and statement execution.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::convert::TypeConverter;
use crate::dialect::{AutoIncrStrategy, Dialect};
use crate::error::{DbMapError, Result};
use crate::executor::{ExecResult, Rows, SqlExecutor};
use crate::named::Params;
use crate::plan::{self, BindPlan, Operation};
use crate::record::Record;
use crate::schema::TableMap;
use crate::value::SqlValue;

/// Maps record types to tables of one database.
///
/// Tables are registered during a setup phase that needs `&mut self`;
/// afterwards the map is shared by reference and every operation takes the
/// executor to run on.
///
/// # Example
///
/// ```ignore
/// use oxide_dbmap::{DbMap, Record, SqliteDialect};
///
/// #[derive(Debug, Default, Record)]
/// #[table(name = "users")]
/// struct User {
///     #[column(primary_key, autoincrement)]
///     id: i64,
///     name: String,
/// }
///
/// let mut map = DbMap::new(SqliteDialect::new());
/// map.add_table::<User>()?;
/// map.create_tables_if_not_exists(&mut pool).await?;
///
/// let mut user = User { name: "alice".into(), ..User::default() };
/// map.insert(&mut pool, &mut user).await?;
/// let found: Option<User> = map.get(&mut pool, &[user.id.into()]).await?;
/// ```
pub struct DbMap {
    dialect: Box<dyn Dialect>,
    auto_incr: AutoIncrStrategy,
    tables: Vec<TableMap>,
    by_type: HashMap<TypeId, usize>,
    converter: Option<Arc<dyn TypeConverter>>,
}

impl fmt::Debug for DbMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbMap")
            .field("dialect", &self.dialect)
            .field("auto_incr", &self.auto_incr)
            .field("tables", &self.tables)
            .field("converter", &self.converter.is_some())
            .finish()
    }
}

impl DbMap {
    /// Creates an empty map for `dialect`.
    pub fn new(dialect: impl Dialect + 'static) -> Self {
        Self::with_dialect(Box::new(dialect))
    }

    /// Creates an empty map for a boxed dialect.
    #[must_use]
    pub fn with_dialect(dialect: Box<dyn Dialect>) -> Self {
        let auto_incr = dialect.auto_increment_strategy();
        debug!(dialect = dialect.name(), strategy = ?auto_incr, "created DbMap");
        Self {
            dialect,
            auto_incr,
            tables: Vec::new(),
            by_type: HashMap::new(),
            converter: None,
        }
    }

    /// Returns the dialect.
    #[must_use]
    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// How generated keys are read back, resolved once from the dialect.
    #[must_use]
    pub const fn auto_increment_strategy(&self) -> AutoIncrStrategy {
        self.auto_incr
    }

    /// Registers a converter for bound and scanned values.
    pub fn set_type_converter(&mut self, converter: impl TypeConverter + 'static) -> &mut Self {
        self.converter = Some(Arc::new(converter));
        self
    }

    /// Returns the registered converter.
    #[must_use]
    pub fn type_converter(&self) -> Option<&dyn TypeConverter> {
        self.converter.as_deref()
    }

    /// Registers `T` under its default table and schema name.
    pub fn add_table<T: Record>(&mut self) -> Result<&mut TableMap> {
        self.add_table_with_name::<T>(T::TABLE_NAME, T::SCHEMA_NAME)
    }

    /// Registers `T` under `name` in `schema`.
    ///
    /// Registering a type again renames its existing table map and returns
    /// it.
    pub fn add_table_with_name<T: Record>(
        &mut self,
        name: &str,
        schema: Option<&str>,
    ) -> Result<&mut TableMap> {
        let type_id = TypeId::of::<T>();
        if let Some(&i) = self.by_type.get(&type_id) {
            let existing = &mut self.tables[i];
            if existing.name() != name || existing.schema_name() != schema {
                trace!(from = %existing.name(), to = %name, "renamed registered table");
                existing.rename(name, schema.map(String::from));
            }
            return Ok(existing);
        }

        let table = TableMap::new(
            name,
            schema.map(String::from),
            T::type_name(),
            &T::field_defs(),
        )?;
        debug!(
            table = %table.name(),
            type_name = T::type_name(),
            columns = table.columns().len(),
            "registered table"
        );
        self.tables.push(table);
        let i = self.tables.len() - 1;
        self.by_type.insert(type_id, i);
        Ok(&mut self.tables[i])
    }

    /// Returns the table registered for `T`.
    pub fn table<T: 'static>(&self) -> Result<&TableMap> {
        self.registered::<T>().ok_or(DbMapError::TableNotFound {
            type_name: std::any::type_name::<T>(),
        })
    }

    /// Returns the table registered for `T` for adjustment.
    pub fn table_mut<T: 'static>(&mut self) -> Result<&mut TableMap> {
        match self.by_type.get(&TypeId::of::<T>()) {
            Some(&i) => Ok(&mut self.tables[i]),
            None => Err(DbMapError::TableNotFound {
                type_name: std::any::type_name::<T>(),
            }),
        }
    }

    /// Looks a table up by name.
    #[must_use]
    pub fn table_by_name(&self, name: &str) -> Option<&TableMap> {
        self.tables.iter().find(|t| t.name() == name)
    }

    /// Registered tables in registration order.
    #[must_use]
    pub fn tables(&self) -> &[TableMap] {
        &self.tables
    }

    pub(crate) fn registered<T: 'static>(&self) -> Option<&TableMap> {
        self.by_type
            .get(&TypeId::of::<T>())
            .map(|&i| &self.tables[i])
    }

    /// Returns the cached bind plan of `op` for `T`.
    pub fn plan<T: 'static>(&self, op: Operation) -> Result<&BindPlan> {
        plan::cached(self.table::<T>()?, self.dialect(), op)
    }

    /// Executes a statement, expanding named parameters.
    pub async fn exec<E>(
        &self,
        exec: &mut E,
        query: &str,
        params: impl Into<Params>,
    ) -> Result<ExecResult>
    where
        E: SqlExecutor + ?Sized,
    {
        let (sql, args) = params.into().expand(self.dialect(), query);
        self.exec_logged(exec, &sql, &args).await
    }

    /// Runs a query, expanding named parameters.
    pub async fn query<E>(
        &self,
        exec: &mut E,
        query: &str,
        params: impl Into<Params>,
    ) -> Result<Rows>
    where
        E: SqlExecutor + ?Sized,
    {
        let (sql, args) = params.into().expand(self.dialect(), query);
        self.query_logged(exec, &sql, &args).await
    }

    pub(crate) async fn exec_logged<E>(
        &self,
        exec: &mut E,
        sql: &str,
        args: &[SqlValue],
    ) -> Result<ExecResult>
    where
        E: SqlExecutor + ?Sized,
    {
        debug!(sql = %sql, args = ?args, "exec");
        exec.exec(sql, args).await
    }

    pub(crate) async fn query_logged<E>(
        &self,
        exec: &mut E,
        sql: &str,
        args: &[SqlValue],
    ) -> Result<Rows>
    where
        E: SqlExecutor + ?Sized,
    {
        debug!(sql = %sql, args = ?args, "query");
        exec.query(sql, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{OracleDialect, PostgresDialect, SqlServerDialect, SqliteDialect};
    use crate::error::ConversionError;
    use crate::hooks::Hooks;
    use crate::record::{FieldAccess, FieldDef};
    use crate::value::{FromSqlValue, ValueType};

    #[derive(Debug, Default)]
    struct Tag {
        id: i64,
        label: String,
    }

    impl FieldAccess for Tag {
        fn field_defs() -> Vec<FieldDef> {
            vec![
                FieldDef::new("id", ValueType::I64).primary_key().auto_increment(),
                FieldDef::new("label", ValueType::Text),
            ]
        }

        fn get_field(&self, name: &str) -> std::result::Result<Option<SqlValue>, ConversionError> {
            Ok(match name {
                "id" => Some(SqlValue::Int(self.id)),
                "label" => Some(SqlValue::Text(self.label.clone())),
                _ => None,
            })
        }

        fn set_field(
            &mut self,
            name: &str,
            value: SqlValue,
        ) -> std::result::Result<bool, ConversionError> {
            match name {
                "id" => self.id = i64::from_sql_value(value)?,
                "label" => self.label = String::from_sql_value(value)?,
                _ => return Ok(false),
            }
            Ok(true)
        }
    }

    impl Hooks for Tag {}

    impl Record for Tag {
        const TABLE_NAME: &'static str = "tags";
    }

    #[test]
    fn test_strategy_resolved_from_dialect() {
        assert_eq!(
            DbMap::new(SqliteDialect::new()).auto_increment_strategy(),
            AutoIncrStrategy::LastInsertId
        );
        assert_eq!(
            DbMap::new(PostgresDialect::new()).auto_increment_strategy(),
            AutoIncrStrategy::Returning
        );
        assert_eq!(
            DbMap::new(SqlServerDialect::new()).auto_increment_strategy(),
            AutoIncrStrategy::Returning
        );
        assert_eq!(
            DbMap::new(OracleDialect::new()).auto_increment_strategy(),
            AutoIncrStrategy::GeneratedIdQuery
        );
    }

    #[test]
    fn test_register_and_lookup() {
        let mut map = DbMap::new(SqliteDialect::new());
        assert!(matches!(
            map.table::<Tag>(),
            Err(DbMapError::TableNotFound { .. })
        ));
        map.add_table::<Tag>().unwrap();
        assert_eq!(map.table::<Tag>().unwrap().name(), "tags");
        assert!(map.table_by_name("tags").is_some());

        map.add_table_with_name::<Tag>("labels", Some("app")).unwrap();
        assert_eq!(map.tables().len(), 1);
        let table = map.table::<Tag>().unwrap();
        assert_eq!(table.name(), "labels");
        assert_eq!(table.schema_name(), Some("app"));
    }

    #[test]
    fn test_reregistration_keeps_adjustments() {
        let mut map = DbMap::new(SqliteDialect::new());
        map.add_table::<Tag>()
            .unwrap()
            .column_mut("label")
            .unwrap()
            .set_max_size(20);
        map.add_table_with_name::<Tag>("labels", None).unwrap();
        let table = map.table::<Tag>().unwrap();
        assert_eq!(table.column("label").unwrap().max_size(), 20);
    }

    #[test]
    fn test_plan_for_registered_type() {
        let mut map = DbMap::new(SqliteDialect::new());
        map.add_table::<Tag>().unwrap();
        let plan = map.plan::<Tag>(Operation::Get).unwrap();
        assert_eq!(
            plan.query,
            "select \"id\",\"label\" from \"tags\" where \"id\" = ?;"
        );
    }
}
