//! SQL values, value-type descriptors and conversions.
//!
//! Record fields never reach the SQL text: they are bound as `SqlValue`
//! parameters behind dialect placeholders. `ValueType` describes the Rust
//! type of a field so dialects can derive a column type from it.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ConversionError;

/// A SQL value that can be used as a parameter or read from a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Binary blob value.
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Returns the SQL representation for inline use (escaped).
    ///
    /// **Warning**: Prefer using parameterized queries instead.
    #[must_use]
    pub fn to_sql_inline(&self) -> String {
        match self {
            Self::Null => String::from("NULL"),
            Self::Bool(b) => {
                if *b {
                    String::from("TRUE")
                } else {
                    String::from("FALSE")
                }
            }
            Self::Int(n) => format!("{n}"),
            Self::Float(f) => format!("{f}"),
            Self::Text(s) => {
                // Escape single quotes by doubling them
                let escaped = s.replace('\'', "''");
                format!("'{escaped}'")
            }
            Self::Blob(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02X}")).collect();
                format!("X'{hex}'")
            }
        }
    }

    /// Returns `true` for `SqlValue::Null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name of the variant, used in conversion errors.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
        }
    }

    /// Reads the value as an integer, accepting booleans and numeric text.
    pub fn as_i64(&self) -> Result<i64, ConversionError> {
        match self {
            Self::Int(n) => Ok(*n),
            Self::Bool(b) => Ok(i64::from(*b)),
            #[allow(clippy::cast_possible_truncation)]
            Self::Float(f) if f.fract() == 0.0 => Ok(*f as i64),
            Self::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| ConversionError::new("integer", self)),
            _ => Err(ConversionError::new("integer", self)),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql_inline())
    }
}

macro_rules! impl_from_for_sql_value {
    ($($ty:ty => |$v:ident| $conv:expr),* $(,)?) => {
        $(
            impl From<$ty> for SqlValue {
                fn from($v: $ty) -> Self {
                    $conv
                }
            }
        )*
    };
}

impl_from_for_sql_value!(
    bool => |v| Self::Bool(v),
    i32 => |v| Self::Int(i64::from(v)),
    i64 => |v| Self::Int(v),
    u32 => |v| Self::Int(i64::from(v)),
    f64 => |v| Self::Float(v),
    String => |v| Self::Text(v),
    &str => |v| Self::Text(v.to_string()),
    Vec<u8> => |v| Self::Blob(v),
);

/// Describes the Rust type behind a mapped field.
///
/// `Optional` wraps a nullable inner type and is unwrapped recursively when a
/// column type is derived. `Named` carries a type name for wrapper and
/// temporal types that are recognised by name rather than by shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Bytes,
    Text,
    Optional(Box<ValueType>),
    Named(&'static str),
}

impl ValueType {
    /// Strips every `Optional` layer.
    #[must_use]
    pub fn dereferenced(&self) -> &Self {
        match self {
            Self::Optional(inner) => inner.dereferenced(),
            other => other,
        }
    }

    /// Returns whether the outermost layer is `Optional`.
    #[must_use]
    pub const fn is_optional(&self) -> bool {
        matches!(self, Self::Optional(_))
    }

    /// Type name used for name-based matching and diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self.dereferenced() {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Bytes => "Vec<u8>",
            Self::Text => "String",
            Self::Named(name) => *name,
            Self::Optional(_) => unreachable!("dereferenced strips Optional"),
        }
    }
}

/// Types that know their `ValueType`.
pub trait SqlType {
    /// Returns the descriptor of this type.
    fn value_type() -> ValueType;
}

/// Trait for types that can be converted to SQL values.
pub trait ToSqlValue {
    /// Converts the value to a `SqlValue`.
    ///
    /// Fails when the value has no lossless SQL representation, such as a
    /// `u64` above `i64::MAX`.
    fn to_sql_value(&self) -> Result<SqlValue, ConversionError>;
}

/// Trait for types that can be read back from SQL values.
pub trait FromSqlValue: Sized {
    /// Converts a `SqlValue` into this type.
    fn from_sql_value(value: SqlValue) -> Result<Self, ConversionError>;
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(&self) -> Result<SqlValue, ConversionError> {
        Ok(self.clone())
    }
}

impl FromSqlValue for SqlValue {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConversionError> {
        Ok(value)
    }
}

impl<T: ToSqlValue + ?Sized> ToSqlValue for &T {
    fn to_sql_value(&self) -> Result<SqlValue, ConversionError> {
        (**self).to_sql_value()
    }
}

impl SqlType for bool {
    fn value_type() -> ValueType {
        ValueType::Bool
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(&self) -> Result<SqlValue, ConversionError> {
        Ok(SqlValue::Bool(*self))
    }
}

impl FromSqlValue for bool {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConversionError> {
        match value {
            SqlValue::Bool(b) => Ok(b),
            SqlValue::Int(n) => Ok(n != 0),
            SqlValue::Text(ref s) => match s.as_str() {
                "1" | "t" | "true" | "TRUE" => Ok(true),
                "0" | "f" | "false" | "FALSE" => Ok(false),
                _ => Err(ConversionError::new("bool", &value)),
            },
            other => Err(ConversionError::new("bool", &other)),
        }
    }
}

macro_rules! impl_integer {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl SqlType for $ty {
                fn value_type() -> ValueType {
                    ValueType::$variant
                }
            }

            impl ToSqlValue for $ty {
                fn to_sql_value(&self) -> Result<SqlValue, ConversionError> {
                    Ok(SqlValue::Int(i64::from(*self)))
                }
            }

            impl FromSqlValue for $ty {
                fn from_sql_value(value: SqlValue) -> Result<Self, ConversionError> {
                    let n = value.as_i64()?;
                    <$ty>::try_from(n).map_err(|_| ConversionError::new(stringify!($ty), &value))
                }
            }
        )*
    };
}

impl_integer!(
    i8 => I8,
    i16 => I16,
    i32 => I32,
    u8 => U8,
    u16 => U16,
    u32 => U32,
);

impl SqlType for i64 {
    fn value_type() -> ValueType {
        ValueType::I64
    }
}

impl ToSqlValue for i64 {
    fn to_sql_value(&self) -> Result<SqlValue, ConversionError> {
        Ok(SqlValue::Int(*self))
    }
}

impl FromSqlValue for i64 {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConversionError> {
        value.as_i64()
    }
}

impl SqlType for u64 {
    fn value_type() -> ValueType {
        ValueType::U64
    }
}

impl ToSqlValue for u64 {
    fn to_sql_value(&self) -> Result<SqlValue, ConversionError> {
        i64::try_from(*self)
            .map(SqlValue::Int)
            .map_err(|_| ConversionError::unrepresentable("u64", "integer"))
    }
}

impl FromSqlValue for u64 {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConversionError> {
        let n = value.as_i64()?;
        Self::try_from(n).map_err(|_| ConversionError::new("u64", &value))
    }
}

impl SqlType for f64 {
    fn value_type() -> ValueType {
        ValueType::F64
    }
}

impl ToSqlValue for f64 {
    fn to_sql_value(&self) -> Result<SqlValue, ConversionError> {
        Ok(SqlValue::Float(*self))
    }
}

impl FromSqlValue for f64 {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConversionError> {
        match value {
            SqlValue::Float(f) => Ok(f),
            #[allow(clippy::cast_precision_loss)]
            SqlValue::Int(n) => Ok(n as f64),
            SqlValue::Text(ref s) => s
                .trim()
                .parse()
                .map_err(|_| ConversionError::new("f64", &value)),
            other => Err(ConversionError::new("f64", &other)),
        }
    }
}

impl SqlType for f32 {
    fn value_type() -> ValueType {
        ValueType::F32
    }
}

impl ToSqlValue for f32 {
    fn to_sql_value(&self) -> Result<SqlValue, ConversionError> {
        Ok(SqlValue::Float(f64::from(*self)))
    }
}

impl FromSqlValue for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_sql_value(value: SqlValue) -> Result<Self, ConversionError> {
        f64::from_sql_value(value).map(|f| f as f32)
    }
}

impl SqlType for String {
    fn value_type() -> ValueType {
        ValueType::Text
    }
}

impl ToSqlValue for String {
    fn to_sql_value(&self) -> Result<SqlValue, ConversionError> {
        Ok(SqlValue::Text(self.clone()))
    }
}

impl ToSqlValue for str {
    fn to_sql_value(&self) -> Result<SqlValue, ConversionError> {
        Ok(SqlValue::Text(String::from(self)))
    }
}

impl FromSqlValue for String {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConversionError> {
        match value {
            SqlValue::Text(s) => Ok(s),
            SqlValue::Int(n) => Ok(n.to_string()),
            SqlValue::Float(f) => Ok(f.to_string()),
            SqlValue::Blob(ref b) => {
                String::from_utf8(b.clone()).map_err(|_| ConversionError::new("String", &value))
            }
            other => Err(ConversionError::new("String", &other)),
        }
    }
}

impl SqlType for Vec<u8> {
    fn value_type() -> ValueType {
        ValueType::Bytes
    }
}

impl ToSqlValue for Vec<u8> {
    fn to_sql_value(&self) -> Result<SqlValue, ConversionError> {
        Ok(SqlValue::Blob(self.clone()))
    }
}

impl ToSqlValue for [u8] {
    fn to_sql_value(&self) -> Result<SqlValue, ConversionError> {
        Ok(SqlValue::Blob(self.to_vec()))
    }
}

impl FromSqlValue for Vec<u8> {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConversionError> {
        match value {
            SqlValue::Blob(b) => Ok(b),
            SqlValue::Text(s) => Ok(s.into_bytes()),
            other => Err(ConversionError::new("Vec<u8>", &other)),
        }
    }
}

impl<T: SqlType> SqlType for Option<T> {
    fn value_type() -> ValueType {
        ValueType::Optional(Box::new(T::value_type()))
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(&self) -> Result<SqlValue, ConversionError> {
        match self {
            Some(v) => v.to_sql_value(),
            None => Ok(SqlValue::Null),
        }
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConversionError> {
        match value {
            SqlValue::Null => Ok(None),
            other => T::from_sql_value(other).map(Some),
        }
    }
}

impl<T: SqlType> SqlType for Box<T> {
    fn value_type() -> ValueType {
        T::value_type()
    }
}

impl<T: ToSqlValue> ToSqlValue for Box<T> {
    fn to_sql_value(&self) -> Result<SqlValue, ConversionError> {
        (**self).to_sql_value()
    }
}

impl<T: FromSqlValue> FromSqlValue for Box<T> {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConversionError> {
        T::from_sql_value(value).map(Box::new)
    }
}

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

impl SqlType for NaiveDateTime {
    fn value_type() -> ValueType {
        ValueType::Named("NaiveDateTime")
    }
}

impl ToSqlValue for NaiveDateTime {
    fn to_sql_value(&self) -> Result<SqlValue, ConversionError> {
        Ok(SqlValue::Text(self.format(DATETIME_FORMAT).to_string()))
    }
}

impl FromSqlValue for NaiveDateTime {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConversionError> {
        match value {
            SqlValue::Text(ref s) => Self::parse_from_str(s, DATETIME_FORMAT)
                .or_else(|_| Self::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
                .map_err(|_| ConversionError::new("NaiveDateTime", &value)),
            SqlValue::Int(secs) => DateTime::from_timestamp(secs, 0)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| ConversionError::new("NaiveDateTime", &value)),
            other => Err(ConversionError::new("NaiveDateTime", &other)),
        }
    }
}

impl SqlType for DateTime<Utc> {
    fn value_type() -> ValueType {
        ValueType::Named("DateTime")
    }
}

impl ToSqlValue for DateTime<Utc> {
    fn to_sql_value(&self) -> Result<SqlValue, ConversionError> {
        Ok(SqlValue::Text(self.to_rfc3339()))
    }
}

impl FromSqlValue for DateTime<Utc> {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConversionError> {
        if let SqlValue::Text(ref s) = value {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Ok(dt.with_timezone(&Utc));
            }
        }
        NaiveDateTime::from_sql_value(value).map(|naive| naive.and_utc())
    }
}

impl SqlType for NaiveDate {
    fn value_type() -> ValueType {
        ValueType::Named("NaiveDate")
    }
}

impl ToSqlValue for NaiveDate {
    fn to_sql_value(&self) -> Result<SqlValue, ConversionError> {
        Ok(SqlValue::Text(self.format("%Y-%m-%d").to_string()))
    }
}

impl FromSqlValue for NaiveDate {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConversionError> {
        match value {
            SqlValue::Text(ref s) => Self::parse_from_str(s, "%Y-%m-%d")
                .map_err(|_| ConversionError::new("NaiveDate", &value)),
            other => Err(ConversionError::new("NaiveDate", &other)),
        }
    }
}

/// Stores any serde type as a JSON text column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T> SqlType for Json<T> {
    fn value_type() -> ValueType {
        ValueType::Named("Json")
    }
}

impl<T: Serialize> ToSqlValue for Json<T> {
    fn to_sql_value(&self) -> Result<SqlValue, ConversionError> {
        serde_json::to_string(&self.0)
            .map(SqlValue::Text)
            .map_err(|_| ConversionError::unrepresentable("Json", "text"))
    }
}

impl<T: DeserializeOwned> FromSqlValue for Json<T> {
    fn from_sql_value(value: SqlValue) -> Result<Self, ConversionError> {
        match value {
            SqlValue::Text(ref s) => serde_json::from_str(s)
                .map(Json)
                .map_err(|_| ConversionError::new("Json", &value)),
            SqlValue::Blob(ref b) => serde_json::from_slice(b)
                .map(Json)
                .map_err(|_| ConversionError::new("Json", &value)),
            other => Err(ConversionError::new("Json", &other)),
        }
    }
}
