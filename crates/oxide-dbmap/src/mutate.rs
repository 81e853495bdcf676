//! Insert, update, delete and get.

use tracing::{trace, warn};

use crate::dbmap::DbMap;
use crate::dialect::AutoIncrStrategy;
use crate::error::{DbMapError, OptimisticLockError, Result};
use crate::executor::SqlExecutor;
use crate::hooks::{self, HookStage};
use crate::plan::{self, Operation};
use crate::record::Record;
use crate::schema::{ColumnMap, TableMap};
use crate::value::SqlValue;

fn run_hook<T: Record>(table: &TableMap, stage: HookStage, record: &mut T) -> Result<()> {
    hooks::run(stage, record, |r| table.describe(r))?;
    Ok(())
}

fn assign<T: Record>(record: &mut T, field: &str, value: SqlValue) -> Result<()> {
    record
        .set_field(field, value)
        .map_err(|e| DbMapError::conversion(field, e))?;
    Ok(())
}

fn first_cell(row: Option<Vec<SqlValue>>, what: &str) -> Result<SqlValue> {
    row.and_then(|cells| cells.into_iter().next())
        .ok_or_else(|| DbMapError::Scan(format!("{what} returned no value")))
}

impl DbMap {
    /// Inserts a record.
    ///
    /// Writes the generated key and, on versioned tables, the new version
    /// back into `record`.
    pub async fn insert<T, E>(&self, exec: &mut E, record: &mut T) -> Result<()>
    where
        T: Record,
        E: SqlExecutor + ?Sized,
    {
        let table = self.table::<T>()?;
        run_hook(table, HookStage::BeforeInsert, record)?;

        let plan = plan::cached(table, self.dialect(), Operation::Insert)?;
        let bound = plan.bind(table, record, self.type_converter())?;

        let generated = match (&plan.auto_incr_field, self.auto_increment_strategy()) {
            (None, _) => {
                self.exec_logged(exec, &plan.query, &bound.args).await?;
                None
            }
            (Some(_), AutoIncrStrategy::LastInsertId) => {
                let res = self.exec_logged(exec, &plan.query, &bound.args).await?;
                let id = res.last_insert_id.ok_or_else(|| {
                    DbMapError::Scan(format!("no last insert id reported for {}", table.name()))
                })?;
                Some(SqlValue::Int(id))
            }
            (Some(_), AutoIncrStrategy::Returning) => {
                let rows = self.query_logged(exec, &plan.query, &bound.args).await?;
                Some(first_cell(rows.rows.into_iter().next(), "insert returning clause")?)
            }
            (Some(field), AutoIncrStrategy::GeneratedIdQuery) => {
                let id_query = self.generated_id_query(table, field)?;
                self.exec_logged(exec, &plan.query, &bound.args).await?;
                let row = self.query_logged(exec, &id_query, &[]).await?.rows.into_iter().next();
                Some(first_cell(row, "generated id query")?)
            }
        };

        if let (Some(field), Some(id)) = (&plan.auto_incr_field, generated) {
            let id = id.as_i64().map_err(|e| DbMapError::conversion(field, e))?;
            trace!(table = %table.name(), field = %field, id, "generated key");
            assign(record, field, SqlValue::Int(id))?;
        }
        if let (Some(field), Some(version)) = (&plan.version_field, bound.existing_version) {
            assign(record, field, SqlValue::Int(version + 1))?;
        }

        run_hook(table, HookStage::AfterInsert, record)
    }

    /// Inserts records in order, stopping at the first failure.
    pub async fn insert_all<T, E>(&self, exec: &mut E, records: &mut [T]) -> Result<()>
    where
        T: Record,
        E: SqlExecutor + ?Sized,
    {
        for record in records.iter_mut() {
            self.insert(exec, record).await?;
        }
        Ok(())
    }

    /// Updates every stored column of a record except an auto-increment key.
    ///
    /// Returns the number of rows updated. On a versioned table the record's
    /// version must match the stored one; a mismatch, or a row that no longer
    /// exists, fails with [`DbMapError::OptimisticLock`].
    pub async fn update<T, E>(&self, exec: &mut E, record: &mut T) -> Result<u64>
    where
        T: Record,
        E: SqlExecutor + ?Sized,
    {
        self.update_with(exec, record, None).await
    }

    /// Updates the columns accepted by `filter`.
    ///
    /// The version column is always updated on versioned tables.
    pub async fn update_columns<T, E, F>(
        &self,
        exec: &mut E,
        record: &mut T,
        filter: F,
    ) -> Result<u64>
    where
        T: Record,
        E: SqlExecutor + ?Sized,
        F: Fn(&ColumnMap) -> bool,
    {
        let filter: &dyn Fn(&ColumnMap) -> bool = &filter;
        self.update_with(exec, record, Some(filter)).await
    }

    /// Updates records in order, stopping at the first failure.
    pub async fn update_all<T, E>(&self, exec: &mut E, records: &mut [T]) -> Result<u64>
    where
        T: Record,
        E: SqlExecutor + ?Sized,
    {
        let mut total = 0;
        for record in records.iter_mut() {
            total += self.update(exec, record).await?;
        }
        Ok(total)
    }

    async fn update_with<T, E>(
        &self,
        exec: &mut E,
        record: &mut T,
        filter: Option<&dyn Fn(&ColumnMap) -> bool>,
    ) -> Result<u64>
    where
        T: Record,
        E: SqlExecutor + ?Sized,
    {
        let table = self.table::<T>()?;
        run_hook(table, HookStage::BeforeUpdate, record)?;

        let filtered;
        let plan = match filter {
            Some(filter) => {
                filtered = plan::build(table, self.dialect(), Operation::Update, filter)?;
                &filtered
            }
            None => plan::cached(table, self.dialect(), Operation::Update)?,
        };
        let bound = plan.bind(table, record, self.type_converter())?;
        let res = self.exec_logged(exec, &plan.query, &bound.args).await?;

        if let Some(version) = bound.existing_version {
            if res.rows_affected == 0 {
                return Err(self.lock_conflict(exec, table, bound.keys, version).await);
            }
            if let Some(field) = &plan.version_field {
                assign(record, field, SqlValue::Int(version + 1))?;
            }
        }

        run_hook(table, HookStage::AfterUpdate, record)?;
        Ok(res.rows_affected)
    }

    /// Deletes a record by its keys.
    ///
    /// Returns the number of rows deleted. Versioned tables apply the same
    /// optimistic-lock check as [`update`](Self::update).
    pub async fn delete<T, E>(&self, exec: &mut E, record: &mut T) -> Result<u64>
    where
        T: Record,
        E: SqlExecutor + ?Sized,
    {
        let table = self.table::<T>()?;
        run_hook(table, HookStage::BeforeDelete, record)?;

        let plan = plan::cached(table, self.dialect(), Operation::Delete)?;
        let bound = plan.bind(table, record, self.type_converter())?;
        let res = self.exec_logged(exec, &plan.query, &bound.args).await?;

        if let Some(version) = bound.existing_version {
            if res.rows_affected == 0 {
                return Err(self.lock_conflict(exec, table, bound.keys, version).await);
            }
        }

        run_hook(table, HookStage::AfterDelete, record)?;
        Ok(res.rows_affected)
    }

    /// Deletes records in order, stopping at the first failure.
    pub async fn delete_all<T, E>(&self, exec: &mut E, records: &mut [T]) -> Result<u64>
    where
        T: Record,
        E: SqlExecutor + ?Sized,
    {
        let mut total = 0;
        for record in records.iter_mut() {
            total += self.delete(exec, record).await?;
        }
        Ok(total)
    }

    /// Fetches a record by key values, `None` when no row matches.
    ///
    /// Keys are given in declaration order. The version is not checked.
    pub async fn get<T, E>(&self, exec: &mut E, keys: &[SqlValue]) -> Result<Option<T>>
    where
        T: Record,
        E: SqlExecutor + ?Sized,
    {
        let table = self.table::<T>()?;
        let plan = plan::cached(table, self.dialect(), Operation::Get)?;
        if keys.len() != table.key_count() {
            return Err(DbMapError::KeyCount {
                table: table.name().to_string(),
                expected: table.key_count(),
                got: keys.len(),
            });
        }

        let args = match self.type_converter() {
            Some(converter) => table
                .key_columns()
                .zip(keys)
                .map(|(column, value)| {
                    converter
                        .to_db(column.value_type(), value.clone())
                        .map_err(|source| DbMapError::TypeConverter {
                            field: column.field_name().to_string(),
                            source,
                        })
                })
                .collect::<Result<Vec<_>>>()?,
            None => keys.to_vec(),
        };

        let rows = self.query_logged(exec, &plan.query, &args).await?;
        let Some(row) = rows.rows.into_iter().next() else {
            return Ok(None);
        };

        let mut record = T::default();
        for (field, value) in plan.select_fields.iter().zip(row) {
            let value = match table.column(field) {
                Some(column) => self.scan_converted(column.value_type(), field, value)?,
                None => value,
            };
            assign(&mut record, field, value)?;
        }
        run_hook(table, HookStage::AfterSelect, &mut record)?;
        Ok(Some(record))
    }

    fn generated_id_query(&self, table: &TableMap, field: &str) -> Result<String> {
        table
            .column(field)
            .and_then(ColumnMap::generated_id_query)
            .map(String::from)
            .or_else(|| {
                self.dialect()
                    .default_generated_id_query(table.schema_name(), table.name())
            })
            .ok_or_else(|| {
                DbMapError::InvalidSchema(format!(
                    "auto-increment field {field} of table {} needs a generated id query",
                    table.name()
                ))
            })
    }

    async fn lock_conflict<E>(
        &self,
        exec: &mut E,
        table: &TableMap,
        keys: Vec<SqlValue>,
        local_version: i64,
    ) -> DbMapError
    where
        E: SqlExecutor + ?Sized,
    {
        let row_exists = match plan::cached(table, self.dialect(), Operation::Get) {
            Ok(get) => self
                .query_logged(exec, &get.query, &keys)
                .await
                .is_ok_and(|rows| !rows.is_empty()),
            Err(_) => false,
        };
        warn!(
            table = %table.name(),
            keys = ?keys,
            local_version,
            row_exists,
            "optimistic lock conflict"
        );
        OptimisticLockError {
            table: table.name().to_string(),
            keys,
            row_exists,
            local_version,
        }
        .into()
    }
}
