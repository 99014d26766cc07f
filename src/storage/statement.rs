//! Statement builder - entity metadata + operation → parameterized SQL
//!
//! Every statement is assembled from ordered `(column, value)` pairs. The SQL
//! text and the parameter list are rendered from the same pairs, so the n-th
//! `?` placeholder is always bound to the n-th parameter.

use crate::entity::{Entity, FieldDescriptor, TableMeta};
use crate::value::Value;
use crate::{Error, Result};

/// SQL text plus its positional parameters, owned by a single call
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedOperation {
    pub sql: String,
    pub params: Vec<Value>,
}

impl PreparedOperation {
    fn new(sql: String, params: Vec<Value>) -> Self {
        Self { sql, params }
    }
}

/// Ordered column/value pairs that render to placeholders and parameters
#[derive(Debug, Default)]
struct Bindings {
    pairs: Vec<(String, Value)>,
}

impl Bindings {
    fn push(&mut self, column: impl Into<String>, value: Value) {
        self.pairs.push((column.into(), value));
    }

    fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    fn column_list(&self) -> String {
        self.pairs.iter().map(|(c, _)| c.as_str()).collect::<Vec<_>>().join(", ")
    }

    fn placeholders(&self) -> String {
        vec!["?"; self.pairs.len()].join(", ")
    }

    /// `a = ?, b = ?`
    fn assignments(&self) -> String {
        self.joined(", ")
    }

    /// `a = ? AND b = ?`
    fn predicate(&self) -> String {
        self.joined(" AND ")
    }

    fn joined(&self, separator: &str) -> String {
        self.pairs
            .iter()
            .map(|(c, _)| format!("{} = ?", c))
            .collect::<Vec<_>>()
            .join(separator)
    }

    fn into_values(self) -> Vec<Value> {
        self.pairs.into_iter().map(|(_, v)| v).collect()
    }
}

fn read_field<T: Entity>(instance: &T, field: &FieldDescriptor) -> Result<Value> {
    instance.get_field(field.source_field_name).ok_or_else(|| {
        Error::Schema(format!(
            "field '{}' is declared but not readable",
            field.source_field_name
        ))
    })
}

fn all_fields<T: Entity>(meta: &TableMeta, instance: &T) -> Result<Bindings> {
    let mut bindings = Bindings::default();
    for field in &meta.fields {
        bindings.push(&field.column_name, read_field(instance, field)?);
    }
    Ok(bindings)
}

fn require_id(meta: &TableMeta, id: &Value) -> Result<()> {
    if id.is_null() {
        return Err(Error::Validation(format!("null id for {}", meta.name)));
    }
    Ok(())
}

fn require_column<'a>(meta: &'a TableMeta, column: &str) -> Result<&'a FieldDescriptor> {
    meta.column(column).ok_or_else(|| {
        Error::Validation(format!("{} has no column '{}'", meta.name, column))
    })
}

fn select_list(meta: &TableMeta) -> String {
    format!("SELECT {} FROM {}", meta.columns().join(", "), meta.name)
}

// ========== Writes ==========

/// `INSERT INTO t (every column) VALUES (?, ...)`
pub fn insert<T: Entity>(meta: &TableMeta, instance: &T) -> Result<PreparedOperation> {
    let bindings = all_fields(meta, instance)?;
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        meta.name,
        bindings.column_list(),
        bindings.placeholders()
    );
    Ok(PreparedOperation::new(sql, bindings.into_values()))
}

/// `INSERT INTO t (every column) VALUES (?, ...) ON CONFLICT(<key>) DO UPDATE SET ...`
///
/// The instance must carry a non-null value for the type's single primary key.
/// Only a key clash turns into an update; any other constraint violation is
/// reported, so rows sharing a UNIQUE value with the instance are never touched.
pub fn upsert<T: Entity>(meta: &TableMeta, instance: &T) -> Result<PreparedOperation> {
    let key = meta.primary_key()?;
    if read_field(instance, key)?.is_null() {
        return Err(Error::Validation(format!(
            "cannot upsert {} without a value for primary key '{}'",
            meta.name, key.column_name
        )));
    }

    let bindings = all_fields(meta, instance)?;
    let updates = meta
        .fields
        .iter()
        .filter(|f| !f.is_primary_key)
        .map(|f| format!("{0} = excluded.{0}", f.column_name))
        .collect::<Vec<_>>();
    let on_conflict = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) {}",
        meta.name,
        bindings.column_list(),
        bindings.placeholders(),
        key.column_name,
        on_conflict
    );
    Ok(PreparedOperation::new(sql, bindings.into_values()))
}

/// `UPDATE t SET <non-key columns> WHERE <key> = ?`, id bound last
pub fn update_by_id<T: Entity>(meta: &TableMeta, id: Value, instance: &T) -> Result<PreparedOperation> {
    require_id(meta, &id)?;
    let key = meta.primary_key()?;

    let mut set = Bindings::default();
    for field in meta.fields.iter().filter(|f| !f.is_primary_key) {
        set.push(&field.column_name, read_field(instance, field)?);
    }
    if set.is_empty() {
        return Err(Error::Validation(format!(
            "{} has no non-key columns to update",
            meta.name
        )));
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        meta.name,
        set.assignments(),
        key.column_name
    );
    let mut params = set.into_values();
    params.push(id);
    Ok(PreparedOperation::new(sql, params))
}

// ========== Deletes ==========

pub fn delete_by_id(meta: &TableMeta, id: Value) -> Result<PreparedOperation> {
    require_id(meta, &id)?;
    let key = meta.primary_key()?;
    Ok(PreparedOperation::new(
        format!("DELETE FROM {} WHERE {} = ?", meta.name, key.column_name),
        vec![id],
    ))
}

/// Delete the row matching every primary-key column of `instance`
pub fn delete_by_instance<T: Entity>(meta: &TableMeta, instance: &T) -> Result<PreparedOperation> {
    let mut keys = Bindings::default();
    for field in meta.primary_keys() {
        let value = read_field(instance, field)?;
        if value.is_null() {
            return Err(Error::Validation(format!(
                "primary key '{}' of {} is null",
                field.column_name, meta.name
            )));
        }
        keys.push(&field.column_name, value);
    }
    if keys.is_empty() {
        return Err(Error::Validation(format!(
            "{} declares no primary key",
            meta.name
        )));
    }

    let sql = format!("DELETE FROM {} WHERE {}", meta.name, keys.predicate());
    Ok(PreparedOperation::new(sql, keys.into_values()))
}

pub fn delete_by_column(meta: &TableMeta, column: &str, value: Value) -> Result<PreparedOperation> {
    let field = require_column(meta, column)?;
    Ok(PreparedOperation::new(
        format!("DELETE FROM {} WHERE {} = ?", meta.name, field.column_name),
        vec![value],
    ))
}

pub fn delete_all(meta: &TableMeta) -> PreparedOperation {
    PreparedOperation::new(format!("DELETE FROM {}", meta.name), Vec::new())
}

// ========== Reads ==========

/// Select at most one row by the primary-key column
pub fn select_by_id(meta: &TableMeta, id: Value) -> Result<PreparedOperation> {
    require_id(meta, &id)?;
    let key = meta.primary_key()?;
    Ok(PreparedOperation::new(
        format!("{} WHERE {} = ?", select_list(meta), key.column_name),
        vec![id],
    ))
}

/// Select rows where every listed column equals its value
pub fn select_by_columns(meta: &TableMeta, columns: &[&str], values: &[Value]) -> Result<PreparedOperation> {
    if columns.is_empty() || values.is_empty() {
        return Err(Error::Validation("empty column predicate".to_string()));
    }
    if columns.len() != values.len() {
        return Err(Error::Validation(format!(
            "{} columns but {} values",
            columns.len(),
            values.len()
        )));
    }

    let mut predicate = Bindings::default();
    for (column, value) in columns.iter().zip(values) {
        let field = require_column(meta, column)?;
        predicate.push(&field.column_name, value.clone());
    }

    let sql = format!("{} WHERE {}", select_list(meta), predicate.predicate());
    Ok(PreparedOperation::new(sql, predicate.into_values()))
}

pub fn select_all(meta: &TableMeta) -> PreparedOperation {
    PreparedOperation::new(select_list(meta), Vec::new())
}

/// Pass-through statement: no predicate, no parameters, caller-supplied SQL
pub fn raw(sql: &str) -> PreparedOperation {
    PreparedOperation::new(sql.to_string(), Vec::new())
}
