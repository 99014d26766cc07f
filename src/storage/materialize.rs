//! Row materialization - result rows back into typed instances

use crate::entity::{Entity, TableMeta};
use crate::value::Value;
use crate::{Error, Result};
use indexmap::IndexMap;

/// One result row keyed by the column names the backend reports, in column order
pub type RawRow = IndexMap<String, Value>;

/// Build a fresh `T` and populate every persisted field from `row` by column name.
pub fn materialize<T: Entity>(row: &RawRow, meta: &TableMeta) -> Result<T> {
    let mut instance = T::default();
    for field in &meta.fields {
        let value = row.get(&field.column_name).ok_or_else(|| {
            Error::Materialization(format!(
                "column '{}' missing from {} row",
                field.column_name, meta.name
            ))
        })?;
        instance
            .set_field(field.source_field_name, value.clone())
            .map_err(|e| match e {
                Error::Materialization(msg) => {
                    Error::Materialization(format!("column '{}': {}", field.column_name, msg))
                }
                other => other,
            })?;
    }
    Ok(instance)
}

/// Materialize every row, preserving result-set order
pub fn materialize_all<T: Entity>(rows: &[RawRow], meta: &TableMeta) -> Result<Vec<T>> {
    rows.iter().map(|row| materialize(row, meta)).collect()
}

/// Drain a rusqlite result cursor into raw rows
pub(crate) fn collect_rows(stmt: &mut rusqlite::Statement<'_>, params: &[Value]) -> Result<Vec<RawRow>> {
    let names: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
    let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;

    let mut collected = Vec::new();
    while let Some(row) = rows.next()? {
        let mut raw = RawRow::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            raw.insert(name.clone(), row.get::<_, Value>(index)?);
        }
        collected.push(raw);
    }
    Ok(collected)
}
