//! Database schema generation from entity metadata

use crate::entity::{FieldDescriptor, SqlType, TableMeta};
use crate::{Error, Result};

/// Build the `CREATE TABLE IF NOT EXISTS` statement for a mapped type.
///
/// Constraints are always emitted in the same order (PRIMARY KEY, NOT NULL,
/// UNIQUE, AUTOINCREMENT, DEFAULT), so the output is byte-identical across
/// calls for the same metadata.
pub fn create_table_sql(meta: &TableMeta) -> Result<String> {
    if meta.primary_keys().count() > 1 {
        return Err(Error::Schema(format!(
            "{} declares more than one primary key column",
            meta.name
        )));
    }

    let columns = meta
        .fields
        .iter()
        .map(column_definition)
        .collect::<Result<Vec<_>>>()?;

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({});",
        meta.name,
        columns.join(", ")
    ))
}

fn column_definition(field: &FieldDescriptor) -> Result<String> {
    if field.is_auto_increment && !(field.is_primary_key && field.sql_type == SqlType::Integer) {
        return Err(Error::Schema(format!(
            "AUTOINCREMENT is only allowed on an INTEGER PRIMARY KEY (column '{}')",
            field.column_name
        )));
    }

    let mut parts = vec![field.column_name.clone(), field.sql_type.as_str().to_string()];
    if field.is_primary_key {
        parts.push("PRIMARY KEY".to_string());
    }
    if !field.is_nullable {
        parts.push("NOT NULL".to_string());
    }
    if field.is_unique {
        parts.push("UNIQUE".to_string());
    }
    if field.is_auto_increment {
        parts.push("AUTOINCREMENT".to_string());
    }
    if let Some(literal) = &field.default_value {
        parts.push(format!("DEFAULT {}", literal));
    }
    Ok(parts.join(" "))
}
