//! Bind plans.
//!
//! A bind plan is the SQL text of one operation on one table plus the order
//! in which record fields are bound to its placeholders. Plans are built on
//! first use and cached on the table; concurrent first callers wait for the
//! single build instead of racing it.

use std::sync::atomic::{AtomicUsize, Ordering};

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::convert::TypeConverter;
use crate::dialect::Dialect;
use crate::error::{DbMapError, Result};
use crate::record::FieldAccess;
use crate::schema::{ColumnMap, TableMap};
use crate::value::SqlValue;

/// Operation a plan is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Insert,
    Update,
    Delete,
    Get,
}

impl Operation {
    const fn slot(self) -> usize {
        match self {
            Self::Insert => 0,
            Self::Update => 1,
            Self::Delete => 2,
            Self::Get => 3,
        }
    }
}

/// Source of one bound argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindArg {
    /// Value of the named field.
    Field(String),
    /// The record's version plus one.
    NextVersion,
    /// The record's current version.
    Version,
}

/// Cached SQL and binding order for one (table, operation) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindPlan {
    /// Statement text with dialect placeholders.
    pub query: String,
    /// Argument sources in placeholder order.
    pub args: Vec<BindArg>,
    /// Key fields in declaration order.
    pub key_fields: Vec<String>,
    /// Version field, when the table is versioned.
    pub version_field: Option<String>,
    /// Auto-increment field, on INSERT plans.
    pub auto_incr_field: Option<String>,
    /// Fields in result-column order, on GET plans.
    pub select_fields: Vec<String>,
}

/// Concrete values of one execution.
#[derive(Debug, Clone, PartialEq)]
pub struct BindInstance {
    /// Arguments in placeholder order.
    pub args: Vec<SqlValue>,
    /// Key values in declaration order.
    pub keys: Vec<SqlValue>,
    /// Version before the operation.
    pub existing_version: Option<i64>,
}

impl BindPlan {
    /// Binds `record` against this plan.
    pub fn bind<T: FieldAccess + ?Sized>(
        &self,
        table: &TableMap,
        record: &T,
        converter: Option<&dyn TypeConverter>,
    ) -> Result<BindInstance> {
        let existing_version = match &self.version_field {
            Some(field) => {
                let current = read_field(table, record, field)?;
                Some(current.as_i64().map_err(|e| DbMapError::conversion(field, e))?)
            }
            None => None,
        };

        let mut args = Vec::with_capacity(self.args.len());
        let mut keys = Vec::with_capacity(self.key_fields.len());
        for arg in &self.args {
            let value = match arg {
                BindArg::Field(field) => {
                    let value = read_field(table, record, field)?;
                    convert_to_db(table, field, value, converter)?
                }
                BindArg::NextVersion => SqlValue::Int(existing_version.unwrap_or(0) + 1),
                BindArg::Version => SqlValue::Int(existing_version.unwrap_or(0)),
            };
            args.push(value);
        }
        for field in &self.key_fields {
            let value = read_field(table, record, field)?;
            keys.push(convert_to_db(table, field, value, converter)?);
        }

        Ok(BindInstance {
            args,
            keys,
            existing_version,
        })
    }
}

fn read_field<T: FieldAccess + ?Sized>(
    table: &TableMap,
    record: &T,
    field: &str,
) -> Result<SqlValue> {
    record
        .get_field(field)
        .map_err(|e| DbMapError::conversion(field, e))?
        .ok_or_else(|| DbMapError::ColumnNotFound {
            table: table.name().to_string(),
            field: field.to_string(),
        })
}

fn convert_to_db(
    table: &TableMap,
    field: &str,
    value: SqlValue,
    converter: Option<&dyn TypeConverter>,
) -> Result<SqlValue> {
    let (Some(converter), Some(column)) = (converter, table.column(field)) else {
        return Ok(value);
    };
    converter
        .to_db(column.value_type(), value)
        .map_err(|source| DbMapError::TypeConverter {
            field: field.to_string(),
            source,
        })
}

/// Per-table plan slots.
#[derive(Debug, Default)]
pub(crate) struct PlanCache {
    slots: [OnceCell<BindPlan>; 4],
    builds: AtomicUsize,
}

impl PlanCache {
    /// Returns the plan for `op`, building it exactly once.
    pub(crate) fn get_or_build(
        &self,
        op: Operation,
        build: impl FnOnce() -> Result<BindPlan>,
    ) -> Result<&BindPlan> {
        self.slots[op.slot()].get_or_try_init(|| {
            let plan = build()?;
            self.builds.fetch_add(1, Ordering::Relaxed);
            Ok(plan)
        })
    }

    /// Number of plans built since the last reset.
    pub(crate) fn build_count(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Returns the cached plan of `op` for `table`.
pub(crate) fn cached<'t>(
    table: &'t TableMap,
    dialect: &dyn Dialect,
    op: Operation,
) -> Result<&'t BindPlan> {
    table
        .plans
        .get_or_build(op, || build(table, dialect, op, &|_: &ColumnMap| true))
}

/// Builds a plan without touching the cache.
pub(crate) fn build(
    table: &TableMap,
    dialect: &dyn Dialect,
    op: Operation,
    filter: &dyn Fn(&ColumnMap) -> bool,
) -> Result<BindPlan> {
    let plan = match op {
        Operation::Insert => insert_plan(table, dialect),
        Operation::Update => update_plan(table, dialect, filter)?,
        Operation::Delete => delete_plan(table, dialect)?,
        Operation::Get => get_plan(table, dialect)?,
    };
    debug!(table = %table.name(), op = ?op, sql = %plan.query, "built bind plan");
    Ok(plan)
}

fn key_fields(table: &TableMap) -> Vec<String> {
    table
        .key_columns()
        .map(|c| c.field_name().to_string())
        .collect()
}

fn version_field(table: &TableMap) -> Option<String> {
    table.version_column().map(|c| c.field_name().to_string())
}

fn require_keys(table: &TableMap) -> Result<()> {
    if table.key_count() == 0 {
        return Err(DbMapError::NoKeys(table.name().to_string()));
    }
    Ok(())
}

/// Appends `where k1 = ? and k2 = ?[ and version = ?]`.
fn push_where(
    sql: &mut String,
    table: &TableMap,
    dialect: &dyn Dialect,
    with_version: bool,
    next_index: &mut usize,
) {
    sql.push_str(" where ");
    let mut conditions = Vec::new();
    for column in table.key_columns() {
        conditions.push(format!(
            "{} = {}",
            dialect.quote_field(column.column_name()),
            dialect.bind_var(*next_index)
        ));
        *next_index += 1;
    }
    if with_version {
        if let Some(version) = table.version_column() {
            conditions.push(format!(
                "{} = {}",
                dialect.quote_field(version.column_name()),
                dialect.bind_var(*next_index)
            ));
            *next_index += 1;
        }
    }
    sql.push_str(&conditions.join(" and "));
}

fn insert_plan(table: &TableMap, dialect: &dyn Dialect) -> BindPlan {
    let mut columns = Vec::new();
    let mut values = Vec::new();
    let mut args = Vec::new();
    let mut auto_incr_field = None;
    let mut output = String::new();
    let mut suffix = String::new();

    for column in table.columns().iter().filter(|c| !c.is_transient()) {
        let quoted = dialect.quote_field(column.column_name());
        if column.is_auto_increment() {
            auto_incr_field = Some(column.field_name().to_string());
            let bind_value = dialect.auto_incr_bind_value();
            if !bind_value.is_empty() {
                columns.push(quoted);
                values.push(bind_value.to_string());
            }
            output = dialect.auto_incr_output_clause(column.column_name());
            suffix = dialect.auto_incr_insert_suffix(column.column_name());
        } else if let Some(literal) = column.default_value() {
            columns.push(quoted);
            values.push(literal.to_string());
        } else if column.is_version() {
            columns.push(quoted);
            values.push(dialect.bind_var(args.len()));
            args.push(BindArg::NextVersion);
        } else {
            columns.push(quoted);
            values.push(dialect.bind_var(args.len()));
            args.push(BindArg::Field(column.field_name().to_string()));
        }
    }

    let query = format!(
        "insert into {} ({}){} values ({}){}{}",
        table.quoted_name(dialect),
        columns.join(","),
        output,
        values.join(","),
        suffix,
        dialect.query_suffix()
    );

    BindPlan {
        query,
        args,
        key_fields: key_fields(table),
        version_field: version_field(table),
        auto_incr_field,
        select_fields: Vec::new(),
    }
}

fn update_plan(
    table: &TableMap,
    dialect: &dyn Dialect,
    filter: &dyn Fn(&ColumnMap) -> bool,
) -> Result<BindPlan> {
    require_keys(table)?;
    let mut sets = Vec::new();
    let mut args = Vec::new();

    for column in table.columns() {
        if column.is_transient() || column.is_auto_increment() {
            continue;
        }
        // the version column always moves, whatever the filter says
        if column.is_version() {
            sets.push(format!(
                "{} = {}",
                dialect.quote_field(column.column_name()),
                dialect.bind_var(args.len())
            ));
            args.push(BindArg::NextVersion);
            continue;
        }
        if !filter(column) {
            continue;
        }
        sets.push(format!(
            "{} = {}",
            dialect.quote_field(column.column_name()),
            dialect.bind_var(args.len())
        ));
        args.push(BindArg::Field(column.field_name().to_string()));
    }
    if sets.is_empty() {
        return Err(DbMapError::InvalidSchema(format!(
            "update of table {} has no columns to set",
            table.name()
        )));
    }

    let mut query = format!("update {} set {}", table.quoted_name(dialect), sets.join(", "));
    let mut next = args.len();
    push_where(&mut query, table, dialect, true, &mut next);
    query.push_str(dialect.query_suffix());

    let keys = key_fields(table);
    args.extend(keys.iter().cloned().map(BindArg::Field));
    if table.version_column().is_some() {
        args.push(BindArg::Version);
    }

    Ok(BindPlan {
        query,
        args,
        key_fields: keys,
        version_field: version_field(table),
        auto_incr_field: None,
        select_fields: Vec::new(),
    })
}

fn delete_plan(table: &TableMap, dialect: &dyn Dialect) -> Result<BindPlan> {
    require_keys(table)?;
    let mut query = format!("delete from {}", table.quoted_name(dialect));
    let mut next = 0;
    push_where(&mut query, table, dialect, true, &mut next);
    query.push_str(dialect.query_suffix());

    let keys = key_fields(table);
    let mut args: Vec<BindArg> = keys.iter().cloned().map(BindArg::Field).collect();
    if table.version_column().is_some() {
        args.push(BindArg::Version);
    }

    Ok(BindPlan {
        query,
        args,
        key_fields: keys,
        version_field: version_field(table),
        auto_incr_field: None,
        select_fields: Vec::new(),
    })
}

fn get_plan(table: &TableMap, dialect: &dyn Dialect) -> Result<BindPlan> {
    require_keys(table)?;
    let selected: Vec<&ColumnMap> = table.columns().iter().filter(|c| !c.is_transient()).collect();
    let columns: Vec<String> = selected
        .iter()
        .map(|c| dialect.quote_field(c.column_name()))
        .collect();

    let mut query = format!("select {} from {}", columns.join(","), table.quoted_name(dialect));
    let mut next = 0;
    push_where(&mut query, table, dialect, false, &mut next);
    query.push_str(dialect.query_suffix());

    let keys = key_fields(table);
    Ok(BindPlan {
        query,
        args: keys.iter().cloned().map(BindArg::Field).collect(),
        key_fields: keys,
        version_field: None,
        auto_incr_field: None,
        select_fields: selected.iter().map(|c| c.field_name().to_string()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{OracleDialect, PostgresDialect, SqlServerDialect, SqliteDialect};
    use crate::record::FieldDef;
    use crate::value::ValueType;

    fn versioned_table() -> TableMap {
        TableMap::new(
            "invoices",
            None,
            "Invoice",
            &[
                FieldDef::new("id", ValueType::I64).primary_key().auto_increment(),
                FieldDef::new("memo", ValueType::Text),
                FieldDef::new("created", ValueType::Text).default_value("current_timestamp"),
                FieldDef::new("version", ValueType::I64).version(),
                FieldDef::new("scratch", ValueType::Text).transient(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_insert_plan_sqlite() {
        let table = versioned_table();
        let plan = build(&table, &SqliteDialect::new(), Operation::Insert, &|_| true).unwrap();
        assert_eq!(
            plan.query,
            "insert into \"invoices\" (\"id\",\"memo\",\"created\",\"version\") \
             values (null,?,current_timestamp,?);"
        );
        assert_eq!(
            plan.args,
            vec![BindArg::Field("memo".into()), BindArg::NextVersion]
        );
        assert_eq!(plan.auto_incr_field.as_deref(), Some("id"));
    }

    #[test]
    fn test_insert_plan_skips_autoincr_without_bind_value() {
        let table = versioned_table();
        let plan = build(&table, &SqlServerDialect::new(), Operation::Insert, &|_| true).unwrap();
        assert_eq!(
            plan.query,
            "insert into [invoices] ([memo],[created],[version]) output inserted.[id] \
             values (@p1,current_timestamp,@p2);"
        );
    }

    #[test]
    fn test_insert_plan_postgres_returning() {
        let table = versioned_table();
        let plan = build(&table, &PostgresDialect::new(), Operation::Insert, &|_| true).unwrap();
        assert_eq!(
            plan.query,
            "insert into \"invoices\" (\"id\",\"memo\",\"created\",\"version\") \
             values (default,$1,current_timestamp,$2) returning \"id\";"
        );
    }

    #[test]
    fn test_update_plan_checks_version() {
        let table = versioned_table();
        let plan = build(&table, &PostgresDialect::new(), Operation::Update, &|_| true).unwrap();
        assert_eq!(
            plan.query,
            "update \"invoices\" set \"memo\" = $1, \"created\" = $2, \"version\" = $3 \
             where \"id\" = $4 and \"version\" = $5;"
        );
        assert_eq!(
            plan.args,
            vec![
                BindArg::Field("memo".into()),
                BindArg::Field("created".into()),
                BindArg::NextVersion,
                BindArg::Field("id".into()),
                BindArg::Version,
            ]
        );
    }

    #[test]
    fn test_update_filter_keeps_version() {
        let table = versioned_table();
        let plan = build(&table, &SqliteDialect::new(), Operation::Update, &|c| {
            c.field_name() == "memo"
        })
        .unwrap();
        assert_eq!(
            plan.query,
            "update \"invoices\" set \"memo\" = ?, \"version\" = ? \
             where \"id\" = ? and \"version\" = ?;"
        );
    }

    #[test]
    fn test_update_sets_natural_key() {
        let table = TableMap::new(
            "currencies",
            None,
            "Currency",
            &[
                FieldDef::new("code", ValueType::Text).primary_key(),
                FieldDef::new("label", ValueType::Text),
            ],
        )
        .unwrap();
        let plan = build(&table, &SqliteDialect::new(), Operation::Update, &|_| true).unwrap();
        assert_eq!(
            plan.query,
            "update \"currencies\" set \"code\" = ?, \"label\" = ? where \"code\" = ?;"
        );
        assert_eq!(
            plan.args,
            vec![
                BindArg::Field("code".into()),
                BindArg::Field("label".into()),
                BindArg::Field("code".into()),
            ]
        );
    }

    #[test]
    fn test_delete_and_get_plans() {
        let table = versioned_table();
        let dialect = OracleDialect::new();
        let delete = build(&table, &dialect, Operation::Delete, &|_| true).unwrap();
        assert_eq!(
            delete.query,
            "delete from \"INVOICES\" where \"ID\" = :1 and \"VERSION\" = :2"
        );
        let get = build(&table, &dialect, Operation::Get, &|_| true).unwrap();
        assert_eq!(
            get.query,
            "select \"ID\",\"MEMO\",\"CREATED\",\"VERSION\" from \"INVOICES\" where \"ID\" = :1"
        );
        assert_eq!(get.select_fields, vec!["id", "memo", "created", "version"]);
    }

    #[test]
    fn test_keyless_table_has_no_update_plan() {
        let table = TableMap::new(
            "events",
            None,
            "Event",
            &[FieldDef::new("payload", ValueType::Text)],
        )
        .unwrap();
        let err = build(&table, &SqliteDialect::new(), Operation::Update, &|_| true).unwrap_err();
        assert!(matches!(err, DbMapError::NoKeys(ref t) if t == "events"));
        assert!(build(&table, &SqliteDialect::new(), Operation::Insert, &|_| true).is_ok());
    }

    #[test]
    fn test_cache_builds_once_and_resets() {
        let mut table = versioned_table();
        let dialect = SqliteDialect::new();
        let first = cached(&table, &dialect, Operation::Insert).unwrap().clone();
        let second = cached(&table, &dialect, Operation::Insert).unwrap();
        assert_eq!(&first, second);
        assert_eq!(table.plans.build_count(), 1);

        table.column_mut("memo").unwrap().set_transient(true);
        assert_eq!(table.plans.build_count(), 0);
        let rebuilt = cached(&table, &dialect, Operation::Insert).unwrap();
        assert!(!rebuilt.query.contains("memo"));
    }

    #[test]
    fn test_cache_single_flight_under_contention() {
        use std::sync::Barrier;

        let table = versioned_table();
        let dialect = SqliteDialect::new();
        let barrier = Barrier::new(16);
        std::thread::scope(|scope| {
            for _ in 0..16 {
                scope.spawn(|| {
                    barrier.wait();
                    let plan = cached(&table, &dialect, Operation::Update).unwrap();
                    assert!(plan.query.starts_with("update"));
                });
            }
        });
        assert_eq!(table.plans.build_count(), 1);
    }
}
