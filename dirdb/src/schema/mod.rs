// Schema synthesis - column types inferred from CSV content

use crate::error::{DirDbError, Result};
use std::collections::HashSet;
use std::path::Path;

/// Column type for inferred schemas. Closed set; everything that is not a
/// number is text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    /// SQL type name used in generated DDL.
    pub fn sql(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }

    /// Map a declared SQL column type back to the closed set, following
    /// SQLite affinity rules: INT anywhere means integer, REAL/FLOA/DOUB
    /// mean real, everything else is text.
    pub fn from_decl(decl: &str) -> ColumnType {
        let decl = decl.to_ascii_uppercase();
        if decl.contains("INT") {
            ColumnType::Integer
        } else if decl.contains("REAL") || decl.contains("FLOA") || decl.contains("DOUB") {
            ColumnType::Real
        } else {
            ColumnType::Text
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

/// Inferred schema for one data table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<Column>,
}

impl TableSchema {
    /// CREATE TABLE statement for this schema.
    pub fn create_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| format!("\"{}\" {}", c.name, c.ty.sql()))
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE IF NOT EXISTS \"{}\" ({})", self.name, columns)
    }
}

/// Fixed DDL for a file-table: auto-increment id, original file name,
/// file content.
pub fn file_table_create_sql(name: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS \"{name}\" (
            ID INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL,
            file_blob BLOB NOT NULL
        )"
    )
}

/// Infer the type of one column from its values.
/// Pure over the sampled values: every non-empty value parses as i64 →
/// Integer; else every non-empty value parses as f64 → Real; else Text.
/// Empty values never block inference; a column with no non-empty values
/// is Text.
pub fn infer_column_type<'a, I>(values: I) -> ColumnType
where
    I: IntoIterator<Item = &'a str>,
{
    let mut saw_value = false;
    let mut all_int = true;
    let mut all_real = true;

    for value in values {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        saw_value = true;
        if all_int && value.parse::<i64>().is_err() {
            all_int = false;
        }
        if all_real && value.parse::<f64>().is_err() {
            all_real = false;
        }
        if !all_int && !all_real {
            return ColumnType::Text;
        }
    }

    if !saw_value {
        ColumnType::Text
    } else if all_int {
        ColumnType::Integer
    } else if all_real {
        ColumnType::Real
    } else {
        ColumnType::Text
    }
}

/// Infer a table schema from a CSV file: column names from the header row,
/// types from the data rows. Returns `Ok(None)` for a headerless (empty)
/// file, which the builder reports and skips. Duplicate header names are
/// ambiguous and rejected.
pub fn synthesize_from_csv(table_name: &str, csv_path: &Path) -> Result<Option<TableSchema>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(csv_path)?;

    let headers = reader.headers()?.clone();
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        log::warn!("table '{table_name}': CSV has no header row, skipped");
        return Ok(None);
    }

    let mut seen = HashSet::new();
    for header in headers.iter() {
        // SQLite column names are case-insensitive
        if !seen.insert(header.trim().to_ascii_lowercase()) {
            return Err(DirDbError::AmbiguousSchema {
                table: table_name.to_string(),
                column: header.trim().to_string(),
            });
        }
    }

    let mut column_values: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record?;
        for (i, values) in column_values.iter_mut().enumerate() {
            values.push(record.get(i).unwrap_or("").to_string());
        }
    }

    let columns = headers
        .iter()
        .zip(&column_values)
        .map(|(name, values)| Column {
            name: name.trim().to_string(),
            ty: infer_column_type(values.iter().map(String::as_str)),
        })
        .collect();

    Ok(Some(TableSchema {
        name: table_name.to_string(),
        columns,
    }))
}
