//! Value model - the loosely-typed cell that flows between mapped fields and SQLite
//!
//! Every persisted field converts to and from a [`Value`] through the
//! [`FieldValue`] trait. The trait also carries the field's semantic type,
//! which the schema builder translates into a column type:
//! - text → `TEXT`
//! - integer → `INTEGER`
//! - boolean → `INTEGER` (stored as 0/1)
//! - floating point → `REAL`
//! - anything else → `BLOB`

use crate::{Error, Result};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;
use std::fmt;

/// A single SQL value, as bound to a statement or read back from a row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// Name of the storage class, used in coercion errors
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Integer(_) => "INTEGER",
            Value::Real(_) => "REAL",
            Value::Text(_) => "TEXT",
            Value::Blob(_) => "BLOB",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Decode into a field type, applying the coercions of [`FieldValue`]
    pub fn decode<T: FieldValue>(self) -> Result<T> {
        T::from_value(self)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => write!(f, "{}", s),
            Value::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let borrowed = match self {
            Value::Null => ValueRef::Null,
            Value::Integer(i) => ValueRef::Integer(*i),
            Value::Real(r) => ValueRef::Real(*r),
            Value::Text(s) => ValueRef::Text(s.as_bytes()),
            Value::Blob(b) => ValueRef::Blob(b),
        };
        Ok(ToSqlOutput::Borrowed(borrowed))
    }
}

impl FromSql for Value {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(r) => Value::Real(r),
            ValueRef::Text(t) => Value::Text(
                String::from_utf8(t.to_vec()).map_err(|e| FromSqlError::Other(Box::new(e)))?,
            ),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        })
    }
}

/// Semantic type of a mapped field, independent of the storage class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticType {
    Text,
    Integer,
    Boolean,
    Float,
    Other,
}

/// Conversion between a Rust field type and a [`Value`].
///
/// `from_value` is where storage classes are coerced back into field types:
/// an INTEGER 0/1 becomes a `bool`, an INTEGER becomes an `f64`, TEXT becomes
/// bytes, and NULL becomes `None` for optional fields. Anything else is a
/// [`Error::Materialization`].
pub trait FieldValue: Sized {
    const SEMANTIC: SemanticType;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch<T>(expected: &str, value: &Value) -> Result<T> {
    Err(Error::Materialization(format!(
        "cannot convert {} into {}",
        value.type_name(),
        expected
    )))
}

impl FieldValue for String {
    const SEMANTIC: SemanticType = SemanticType::Text;

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s),
            other => mismatch("text", &other),
        }
    }
}

impl FieldValue for i64 {
    const SEMANTIC: SemanticType = SemanticType::Integer;

    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Integer(i) => Ok(i),
            other => mismatch("i64", &other),
        }
    }
}

macro_rules! narrow_integer {
    ($($ty:ty),*) => {
        $(
            impl FieldValue for $ty {
                const SEMANTIC: SemanticType = SemanticType::Integer;

                fn to_value(&self) -> Value {
                    Value::Integer(i64::from(*self))
                }

                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::Integer(i) => <$ty>::try_from(i).map_err(|_| {
                            Error::Materialization(format!(
                                "integer {} out of range for {}",
                                i,
                                stringify!($ty)
                            ))
                        }),
                        other => mismatch(stringify!($ty), &other),
                    }
                }
            }
        )*
    };
}

narrow_integer!(i32, u32, i16, u16, i8, u8);

impl FieldValue for bool {
    const SEMANTIC: SemanticType = SemanticType::Boolean;

    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Integer(i) => Ok(i != 0),
            other => mismatch("bool", &other),
        }
    }
}

impl FieldValue for f64 {
    const SEMANTIC: SemanticType = SemanticType::Float;

    fn to_value(&self) -> Value {
        Value::Real(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Real(r) => Ok(r),
            Value::Integer(i) => Ok(i as f64),
            other => mismatch("f64", &other),
        }
    }
}

impl FieldValue for f32 {
    const SEMANTIC: SemanticType = SemanticType::Float;

    fn to_value(&self) -> Value {
        Value::Real(f64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        f64::from_value(value).map(|r| r as f32)
    }
}

impl FieldValue for Vec<u8> {
    const SEMANTIC: SemanticType = SemanticType::Other;

    fn to_value(&self) -> Value {
        Value::Blob(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Blob(b) => Ok(b),
            Value::Text(s) => Ok(s.into_bytes()),
            other => mismatch("bytes", &other),
        }
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    const SEMANTIC: SemanticType = T::SEMANTIC;

    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    v.to_value()
                }
            }
        )*
    };
}

value_from!(String, i64, i32, u32, i16, u16, i8, u8, bool, f64, f32, Vec<u8>);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
