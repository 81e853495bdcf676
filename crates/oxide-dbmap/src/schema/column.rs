//! Column descriptors.

use std::borrow::Cow;

use once_cell::sync::OnceCell;

use crate::dialect::Dialect;
use crate::record::FieldDef;
use crate::value::ValueType;

/// Mapping between one struct field and one table column.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    field_name: String,
    value_type: ValueType,
    column_name: String,
    pub(crate) primary_key: bool,
    pub(crate) auto_increment: bool,
    pub(crate) version: bool,
    transient: bool,
    unique: bool,
    not_null: bool,
    max_size: usize,
    default_value: Option<String>,
    generated_id_query: Option<String>,
    sql_type: OnceCell<(&'static str, String)>,
}

impl ColumnMap {
    pub(crate) fn from_def(def: &FieldDef) -> Self {
        Self {
            field_name: def.name.to_string(),
            value_type: def.value_type.clone(),
            column_name: def.column_name().to_string(),
            primary_key: def.primary_key,
            auto_increment: def.auto_increment,
            version: def.version,
            transient: def.transient,
            unique: def.unique,
            not_null: def.not_null,
            max_size: def.max_size,
            default_value: def.default_value.map(String::from),
            generated_id_query: def.generated_id_query.map(String::from),
            sql_type: OnceCell::new(),
        }
    }

    /// Rust field name.
    #[must_use]
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Column name in the table.
    #[must_use]
    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    #[must_use]
    pub const fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    #[must_use]
    pub const fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    #[must_use]
    pub const fn is_auto_increment(&self) -> bool {
        self.auto_increment
    }

    #[must_use]
    pub const fn is_version(&self) -> bool {
        self.version
    }

    #[must_use]
    pub const fn is_transient(&self) -> bool {
        self.transient
    }

    #[must_use]
    pub const fn is_unique(&self) -> bool {
        self.unique
    }

    #[must_use]
    pub const fn is_not_null(&self) -> bool {
        self.not_null
    }

    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    #[must_use]
    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    #[must_use]
    pub fn generated_id_query(&self) -> Option<&str> {
        self.generated_id_query.as_deref()
    }

    /// Returns the column type, computing it on first use.
    ///
    /// The type is cached for the first dialect asked; concurrent first
    /// callers block until that single computation is done. Other dialects
    /// get a freshly computed type.
    pub fn sql_type(&self, dialect: &dyn Dialect) -> Cow<'_, str> {
        let (cached_for, sql_type) = self
            .sql_type
            .get_or_init(|| (dialect.name(), self.compute_sql_type(dialect)));
        if *cached_for == dialect.name() {
            Cow::Borrowed(sql_type)
        } else {
            Cow::Owned(self.compute_sql_type(dialect))
        }
    }

    fn compute_sql_type(&self, dialect: &dyn Dialect) -> String {
        dialect.to_sql_type(&self.value_type, self.max_size, self.auto_increment)
    }

    /// Renames the column.
    pub fn rename(&mut self, column_name: impl Into<String>) -> &mut Self {
        self.column_name = column_name.into();
        self
    }

    /// Excludes the field from generated SQL.
    pub fn set_transient(&mut self, transient: bool) -> &mut Self {
        self.transient = transient;
        self
    }

    pub fn set_unique(&mut self, unique: bool) -> &mut Self {
        self.unique = unique;
        self
    }

    pub fn set_not_null(&mut self, not_null: bool) -> &mut Self {
        self.not_null = not_null;
        self
    }

    /// Sets the maximum text length; zero means unbounded.
    pub fn set_max_size(&mut self, max_size: usize) -> &mut Self {
        self.max_size = max_size;
        self.sql_type = OnceCell::new();
        self
    }

    /// Inserts `literal` instead of binding the field value.
    pub fn set_default(&mut self, literal: impl Into<String>) -> &mut Self {
        self.default_value = Some(literal.into());
        self
    }

    /// Sets the query that fetches the generated key after an INSERT.
    pub fn set_generated_id_query(&mut self, query: impl Into<String>) -> &mut Self {
        self.generated_id_query = Some(query.into());
        self
    }

    pub(crate) fn set_key(&mut self, primary_key: bool, auto_increment: bool) {
        self.primary_key = primary_key;
        if self.auto_increment != auto_increment {
            self.auto_increment = auto_increment;
            self.sql_type = OnceCell::new();
        }
    }

    pub(crate) fn matches(&self, name: &str) -> bool {
        self.field_name == name || self.column_name == name
    }
}
