//! Entity metadata - the persisted-field table of a mapped type
//!
//! A mapped type describes itself once, statically, through [`Entity`]:
//! its table name, an ordered chain of [`Shape`]s (the type's own fields
//! first, then each embedded ancestor's), and field accessors by name.
//! [`TableMeta::of`] flattens that chain into the ordered
//! [`FieldDescriptor`] list every other component works from.
//!
//! Descriptor order is significant: it is the DDL column order and the
//! positional parameter order of every generated statement.

use crate::value::{FieldValue, SemanticType, Value};
use crate::{Error, Result};
use std::collections::HashSet;

/// Column type emitted in DDL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Text,
    Integer,
    Real,
    Blob,
}

impl SqlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Blob => "BLOB",
        }
    }
}

impl From<SemanticType> for SqlType {
    fn from(semantic: SemanticType) -> Self {
        match semantic {
            SemanticType::Text => SqlType::Text,
            SemanticType::Integer | SemanticType::Boolean => SqlType::Integer,
            SemanticType::Float => SqlType::Real,
            SemanticType::Other => SqlType::Blob,
        }
    }
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mapping rule for one persisted column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Name passed to [`Entity::get_field`] / [`Entity::set_field`]
    pub source_field_name: &'static str,
    /// Column name, defaults to the source field name
    pub column_name: String,
    pub sql_type: SqlType,
    pub is_primary_key: bool,
    pub is_nullable: bool,
    pub is_unique: bool,
    pub is_auto_increment: bool,
    /// Literal emitted verbatim after `DEFAULT`
    pub default_value: Option<String>,
}

impl FieldDescriptor {
    /// Describe a field of type `V`; the column type follows `V`'s semantic type.
    pub fn of<V: FieldValue>(source_field_name: &'static str) -> Self {
        Self::with_type(source_field_name, SqlType::from(V::SEMANTIC))
    }

    pub fn with_type(source_field_name: &'static str, sql_type: SqlType) -> Self {
        Self {
            source_field_name,
            column_name: source_field_name.to_string(),
            sql_type,
            is_primary_key: false,
            is_nullable: true,
            is_unique: false,
            is_auto_increment: false,
            default_value: None,
        }
    }

    /// Store the field under a different column name
    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.column_name = name.into();
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.is_nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.is_auto_increment = true;
        self
    }

    /// Set the DEFAULT literal, e.g. `"0"`, `"'guest'"` or `"CURRENT_TIMESTAMP"`
    pub fn default_value(mut self, literal: impl Into<String>) -> Self {
        self.default_value = Some(literal.into());
        self
    }
}

/// One field declaration inside a [`Shape`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declared {
    Persisted(FieldDescriptor),
    Transient(&'static str),
}

/// The declared fields of one level of a type's ancestry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    pub name: &'static str,
    pub fields: Vec<Declared>,
}

impl Shape {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: Vec::new(),
        }
    }

    /// Declare a persisted field
    pub fn field(mut self, descriptor: FieldDescriptor) -> Self {
        self.fields.push(Declared::Persisted(descriptor));
        self
    }

    /// Declare a field that is never stored
    pub fn transient(mut self, source_field_name: &'static str) -> Self {
        self.fields.push(Declared::Transient(source_field_name));
        self
    }

    fn persisted(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter_map(|declared| match declared {
            Declared::Persisted(descriptor) => Some(descriptor),
            Declared::Transient(_) => None,
        })
    }
}

/// A type that can be stored as a table row.
///
/// `Default` is the zero-argument constructor used when materializing rows.
/// Embedded "ancestor" types implement `Entity` themselves; the derived type
/// appends their shapes after its own and delegates unknown field names to
/// them:
///
/// ```
/// use rowbound::{Entity, FieldDescriptor, Result, Shape, Value};
///
/// #[derive(Default)]
/// struct Note {
///     id: Option<i64>,
///     body: String,
/// }
///
/// impl Entity for Note {
///     const TABLE: Option<&'static str> = Some("notes");
///
///     fn shapes() -> Vec<Shape> {
///         vec![Shape::new("Note")
///             .field(FieldDescriptor::of::<Option<i64>>("id").primary_key().auto_increment())
///             .field(FieldDescriptor::of::<String>("body").not_null())]
///     }
///
///     fn get_field(&self, field: &str) -> Option<Value> {
///         match field {
///             "id" => Some(self.id.into()),
///             "body" => Some(self.body.as_str().into()),
///             _ => None,
///         }
///     }
///
///     fn set_field(&mut self, field: &str, value: Value) -> Result<()> {
///         match field {
///             "id" => self.id = value.decode()?,
///             "body" => self.body = value.decode()?,
///             other => return Err(rowbound::Error::unknown_field::<Self>(other)),
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Entity: Default {
    /// Explicit table name; `None` uses the type's simple name
    const TABLE: Option<&'static str> = None;

    /// Declared shapes, most-derived first, then each ancestor in turn
    fn shapes() -> Vec<Shape>;

    /// Read a field by its source name; `None` for names the type does not have
    fn get_field(&self, field: &str) -> Option<Value>;

    /// Assign a field by its source name
    fn set_field(&mut self, field: &str, value: Value) -> Result<()>;

    /// Table name the type is stored in
    fn table_name() -> String {
        Self::TABLE
            .map(str::to_string)
            .unwrap_or_else(simple_type_name::<Self>)
    }
}

/// Last path segment of a type name, without generic arguments
pub fn simple_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// Flattened metadata of a mapped type: table name plus ordered descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMeta {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

impl TableMeta {
    /// Extract the metadata of `T`.
    ///
    /// Walks `T::shapes()` in order and keeps persisted fields only. Two
    /// fields mapped to the same column, or a type with nothing persisted,
    /// is a [`Error::Schema`].
    pub fn of<T: Entity>() -> Result<Self> {
        Self::from_shapes(T::table_name(), T::shapes())
    }

    pub fn from_shapes(name: impl Into<String>, shapes: Vec<Shape>) -> Result<Self> {
        let name = name.into();
        let mut seen = HashSet::new();
        let mut fields = Vec::new();

        for shape in &shapes {
            for descriptor in shape.persisted() {
                if !seen.insert(descriptor.column_name.clone()) {
                    return Err(Error::Schema(format!(
                        "duplicate column '{}' in {} (declared again by {})",
                        descriptor.column_name, name, shape.name
                    )));
                }
                fields.push(descriptor.clone());
            }
        }

        if fields.is_empty() {
            return Err(Error::Schema(format!("{} has no persisted fields", name)));
        }

        Ok(Self { name, fields })
    }

    /// All primary-key descriptors, in declaration order
    pub fn primary_keys(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_primary_key)
    }

    /// The single primary key required by key-addressed operations
    pub fn primary_key(&self) -> Result<&FieldDescriptor> {
        let mut keys = self.primary_keys();
        match (keys.next(), keys.next()) {
            (Some(key), None) => Ok(key),
            (None, _) => Err(Error::Validation(format!(
                "{} declares no primary key",
                self.name
            ))),
            (Some(_), Some(_)) => Err(Error::Validation(format!(
                "{} declares more than one primary key",
                self.name
            ))),
        }
    }

    /// Look up a descriptor by column name
    pub fn column(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.column_name == name)
    }

    /// Column names in descriptor order
    pub fn columns(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.column_name.as_str()).collect()
    }
}
