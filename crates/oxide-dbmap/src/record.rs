//! Field descriptors and the record traits.
//!
//! A mapped struct describes its fields once through [`FieldAccess`] and
//! reads or writes them by name at run time. Both traits are normally
//! generated by `#[derive(Record)]`; `#[derive(Fields)]` generates only
//! `FieldAccess` for structs that are embedded into other records.

use crate::error::ConversionError;
use crate::hooks::Hooks;
use crate::value::{SqlValue, ValueType};

/// Static description of one mapped field.
///
/// Flags set here become the initial state of the table's column map and
/// can still be changed during registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Rust field name.
    pub name: &'static str,
    /// Type descriptor of the field.
    pub value_type: ValueType,
    /// Column name override.
    pub column: Option<&'static str>,
    /// Part of the primary key.
    pub primary_key: bool,
    /// Key generated by the database.
    pub auto_increment: bool,
    /// Version column for optimistic locking.
    pub version: bool,
    /// Never written to or read from SQL generated by the mapper.
    pub transient: bool,
    /// UNIQUE constraint.
    pub unique: bool,
    /// NOT NULL constraint.
    pub not_null: bool,
    /// Maximum length of text columns; zero means unset.
    pub max_size: usize,
    /// SQL literal inserted instead of the field value.
    pub default_value: Option<&'static str>,
    /// Query returning the generated key after an INSERT.
    pub generated_id_query: Option<&'static str>,
}

impl FieldDef {
    /// Creates a plain field mapped to a column of the same name.
    #[must_use]
    pub const fn new(name: &'static str, value_type: ValueType) -> Self {
        Self {
            name,
            value_type,
            column: None,
            primary_key: false,
            auto_increment: false,
            version: false,
            transient: false,
            unique: false,
            not_null: false,
            max_size: 0,
            default_value: None,
            generated_id_query: None,
        }
    }

    /// Returns the column name.
    #[must_use]
    pub fn column_name(&self) -> &'static str {
        self.column.unwrap_or(self.name)
    }

    #[must_use]
    pub const fn column(mut self, column: &'static str) -> Self {
        self.column = Some(column);
        self
    }

    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    #[must_use]
    pub const fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    #[must_use]
    pub const fn version(mut self) -> Self {
        self.version = true;
        self
    }

    #[must_use]
    pub const fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    #[must_use]
    pub const fn max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    #[must_use]
    pub const fn default_value(mut self, literal: &'static str) -> Self {
        self.default_value = Some(literal);
        self
    }

    #[must_use]
    pub const fn generated_id_query(mut self, query: &'static str) -> Self {
        self.generated_id_query = Some(query);
        self
    }
}

/// Name-based access to the fields of a struct.
///
/// Fields of embedded structs are flattened: they appear in
/// [`field_defs`](Self::field_defs) and are reachable through
/// `get_field`/`set_field` as if declared on the outer struct.
pub trait FieldAccess {
    /// Returns the flattened field descriptors in declaration order.
    fn field_defs() -> Vec<FieldDef>;

    /// Returns whether a field with this name exists.
    fn has_field(name: &str) -> bool {
        Self::field_defs().iter().any(|def| def.name == name)
    }

    /// Reads a field, `Ok(None)` when there is no such field.
    ///
    /// Fails when the field's value has no SQL representation.
    fn get_field(&self, name: &str) -> Result<Option<SqlValue>, ConversionError>;

    /// Assigns a field.
    ///
    /// Returns `Ok(false)` when there is no such field and an error when the
    /// value does not convert to the field's type.
    fn set_field(&mut self, name: &str, value: SqlValue) -> Result<bool, ConversionError>;
}

/// A struct mapped to a table.
pub trait Record: FieldAccess + Hooks + Default + Send + Sync + 'static {
    /// Default table name.
    const TABLE_NAME: &'static str;

    /// Default schema, if any.
    const SCHEMA_NAME: Option<&'static str> = None;

    /// Returns the Rust type name used in diagnostics.
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }
}
