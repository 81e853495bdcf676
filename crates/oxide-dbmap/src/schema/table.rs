//! Table descriptors.

use crate::dialect::{Dialect, IndexType};
use crate::error::{DbMapError, Result};
use crate::plan::PlanCache;
use crate::record::{FieldAccess, FieldDef};

use super::column::ColumnMap;
use super::index::IndexMap;

/// Mapping between a record type and a table.
///
/// Built by `DbMap::add_table` and adjusted during setup. Every mutating
/// method discards the bind plans already built for the table.
#[derive(Debug)]
pub struct TableMap {
    name: String,
    schema: Option<String>,
    type_name: &'static str,
    columns: Vec<ColumnMap>,
    keys: Vec<usize>,
    version: Option<usize>,
    indexes: Vec<IndexMap>,
    unique_together: Vec<Vec<String>>,
    pub(crate) plans: PlanCache,
}

impl TableMap {
    pub(crate) fn new(
        name: impl Into<String>,
        schema: Option<String>,
        type_name: &'static str,
        defs: &[FieldDef],
    ) -> Result<Self> {
        let mut table = Self {
            name: name.into(),
            schema: schema.filter(|s| !s.trim().is_empty()),
            type_name,
            columns: defs.iter().map(ColumnMap::from_def).collect(),
            keys: Vec::new(),
            version: None,
            indexes: Vec::new(),
            unique_together: Vec::new(),
            plans: PlanCache::default(),
        };

        let versions: Vec<usize> = table
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.version)
            .map(|(i, _)| i)
            .collect();
        if versions.len() > 1 {
            return Err(DbMapError::InvalidSchema(format!(
                "table {} declares {} version columns",
                table.name,
                versions.len()
            )));
        }
        table.version = versions.first().copied();

        if let Some(column) = table
            .columns
            .iter()
            .find(|c| c.auto_increment && !c.primary_key)
        {
            return Err(DbMapError::InvalidSchema(format!(
                "auto-increment field {} of table {} is not a primary key",
                column.field_name(),
                table.name
            )));
        }
        table.refresh_keys()?;
        Ok(table)
    }

    fn refresh_keys(&mut self) -> Result<()> {
        self.keys = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.primary_key)
            .map(|(i, _)| i)
            .collect();
        let auto = self.columns.iter().filter(|c| c.auto_increment).count();
        if auto > 1 {
            return Err(DbMapError::InvalidSchema(format!(
                "table {} declares {auto} auto-increment columns",
                self.name
            )));
        }
        Ok(())
    }

    fn position(&self, field: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.field_name() == field)
            .or_else(|| self.columns.iter().position(|c| c.matches(field)))
            .ok_or_else(|| DbMapError::ColumnNotFound {
                table: self.name.clone(),
                field: field.to_string(),
            })
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schema name, `None` for the default schema.
    #[must_use]
    pub fn schema_name(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Name of the record type mapped to this table.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Columns in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnMap] {
        &self.columns
    }

    /// Looks a column up by field or column name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnMap> {
        self.position(name).ok().map(|i| &self.columns[i])
    }

    /// Key columns in declaration order.
    pub fn key_columns(&self) -> impl Iterator<Item = &ColumnMap> {
        self.keys.iter().map(|&i| &self.columns[i])
    }

    #[must_use]
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn version_column(&self) -> Option<&ColumnMap> {
        self.version.map(|i| &self.columns[i])
    }

    #[must_use]
    pub fn auto_increment_column(&self) -> Option<&ColumnMap> {
        self.columns.iter().find(|c| c.is_auto_increment())
    }

    #[must_use]
    pub fn indexes(&self) -> &[IndexMap] {
        &self.indexes
    }

    /// Field sets that must be unique together.
    #[must_use]
    pub fn unique_together(&self) -> &[Vec<String>] {
        &self.unique_together
    }

    /// Number of bind plans built since the table was last adjusted.
    #[must_use]
    pub fn plan_builds(&self) -> usize {
        self.plans.build_count()
    }

    /// Returns the qualified, quoted table name.
    #[must_use]
    pub fn quoted_name(&self, dialect: &dyn Dialect) -> String {
        dialect.quoted_table_for_query(self.schema_name(), &self.name)
    }

    /// Declares the primary key, replacing any key from the field attributes.
    ///
    /// `auto_incr` applies to a single-field key only.
    pub fn set_keys(&mut self, auto_incr: bool, fields: &[&str]) -> Result<&mut Self> {
        if auto_incr && fields.len() != 1 {
            return Err(DbMapError::InvalidSchema(format!(
                "auto-increment key of table {} must have exactly one field",
                self.name
            )));
        }
        let positions = fields
            .iter()
            .map(|f| self.position(f))
            .collect::<Result<Vec<_>>>()?;
        for column in &mut self.columns {
            column.set_key(false, false);
        }
        for i in positions {
            self.columns[i].set_key(true, auto_incr);
        }
        self.refresh_keys()?;
        self.plans.reset();
        Ok(self)
    }

    /// Marks the version column used for optimistic locking.
    pub fn set_version_col(&mut self, field: &str) -> Result<&mut Self> {
        let i = self.position(field)?;
        for column in &mut self.columns {
            column.version = false;
        }
        self.columns[i].version = true;
        self.version = Some(i);
        self.plans.reset();
        Ok(self)
    }

    /// Adds a multi-column UNIQUE constraint.
    pub fn set_unique_together(&mut self, fields: &[&str]) -> Result<&mut Self> {
        if fields.len() < 2 {
            return Err(DbMapError::InvalidSchema(format!(
                "unique-together on table {} needs at least two fields",
                self.name
            )));
        }
        let names = fields
            .iter()
            .map(|f| self.position(f).map(|i| self.columns[i].field_name().to_string()))
            .collect::<Result<Vec<_>>>()?;
        if !self.unique_together.contains(&names) {
            self.unique_together.push(names);
        }
        self.plans.reset();
        Ok(self)
    }

    /// Declares an index over `fields`.
    pub fn add_index(
        &mut self,
        name: &str,
        index_type: Option<IndexType>,
        fields: &[&str],
    ) -> Result<&mut IndexMap> {
        let names = fields
            .iter()
            .map(|f| self.position(f).map(|i| self.columns[i].field_name().to_string()))
            .collect::<Result<Vec<_>>>()?;
        self.indexes.retain(|idx| idx.name() != name);
        self.indexes.push(IndexMap::new(name, index_type, names));
        self.plans.reset();
        let last = self.indexes.len() - 1;
        Ok(&mut self.indexes[last])
    }

    pub(crate) fn rename(&mut self, name: &str, schema: Option<String>) {
        name.clone_into(&mut self.name);
        self.schema = schema.filter(|s| !s.trim().is_empty());
        self.plans.reset();
    }

    /// Returns a column for adjustment.
    pub fn column_mut(&mut self, field: &str) -> Result<&mut ColumnMap> {
        let i = self.position(field)?;
        self.plans.reset();
        Ok(&mut self.columns[i])
    }

    /// Column names for a list of field names, quoted for `dialect`.
    pub(crate) fn quoted_columns(&self, dialect: &dyn Dialect, fields: &[String]) -> Vec<String> {
        fields
            .iter()
            .map(|f| {
                let column = self.column(f).map_or(f.as_str(), ColumnMap::column_name);
                dialect.quote_field(column)
            })
            .collect()
    }

    /// Labels a record by table and key values, e.g. `users(id=1)`.
    pub(crate) fn describe<T: FieldAccess + ?Sized>(&self, record: &T) -> String {
        let keys: Vec<String> = self
            .key_columns()
            .map(|c| {
                let value = record
                    .get_field(c.field_name())
                    .ok()
                    .flatten()
                    .map_or_else(|| "?".to_string(), |v| v.to_sql_inline());
                format!("{}={value}", c.column_name())
            })
            .collect();
        if keys.is_empty() {
            self.name.clone()
        } else {
            format!("{}({})", self.name, keys.join(", "))
        }
    }
}
