// Database exporter - the inverse mapping, database file back to directory

use crate::build::DB_EXTENSION;
use crate::error::{DirDbError, Result};
use crate::report::BatchSummary;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Which formats a data table is written in. CSV-only is the default;
/// the toggles are independent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportOptions {
    pub csv: bool,
    pub json: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            csv: true,
            json: false,
        }
    }
}

/// What one database export produced.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub database: String,
    pub output_dir: PathBuf,
    /// (table, rows written)
    pub data_tables: Vec<(String, usize)>,
    /// (table, files written)
    pub file_tables: Vec<(String, usize)>,
    pub warnings: Vec<String>,
}

impl ExportReport {
    fn warn(&mut self, message: String) {
        log::warn!("{}: {message}", self.database);
        self.warnings.push(message);
    }
}

/// Classify a table by its column set: exactly the fixed three-column
/// file-table signature (identifier, code, blob), case-insensitive.
/// Everything else is a data table, regardless of table name.
pub fn is_file_table(columns: &[String]) -> bool {
    if columns.len() != 3 {
        return false;
    }
    let mut lower: Vec<String> = columns.iter().map(|c| c.to_ascii_lowercase()).collect();
    lower.sort();
    lower == ["code", "file_blob", "id"]
}

/// Export a database file back into the directory layout: data tables to
/// `tables/{name}.csv` (and optionally `.json`), file-tables to
/// `files/{name}/{code}`. With no output directory, the layout is created
/// next to the database file.
pub fn export_database(
    db_path: &Path,
    output_dir: Option<&Path>,
    opts: &ExportOptions,
) -> Result<ExportReport> {
    if !db_path.is_file() {
        return Err(DirDbError::DatabaseNotFound(db_path.display().to_string()));
    }
    let db_name = db_path
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    let output_dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => db_path.parent().unwrap_or(Path::new(".")).to_path_buf(),
    };

    let conn = Connection::open(db_path)?;
    let mut report = ExportReport {
        database: db_name,
        output_dir: output_dir.clone(),
        data_tables: Vec::new(),
        file_tables: Vec::new(),
        warnings: Vec::new(),
    };

    for table in list_tables(&conn)? {
        let columns = table_columns(&conn, &table)?;
        if is_file_table(&columns) {
            match export_file_table(&conn, &table, &output_dir.join("files"), &mut report) {
                Ok(count) => report.file_tables.push((table, count)),
                Err(e) => report.warn(format!("file-table '{table}': {e}")),
            }
        } else {
            match export_data_table(&conn, &table, &output_dir.join("tables"), opts) {
                Ok(rows) => report.data_tables.push((table, rows)),
                Err(e) => report.warn(format!("table '{table}': {e}")),
            }
        }
    }

    Ok(report)
}

/// Export every `*.db3` under the build directory into
/// `{export_root}/{name}/`, isolating per-database failures.
pub fn export_all(
    build_dir: &Path,
    export_root: &Path,
    opts: &ExportOptions,
) -> Result<(Vec<ExportReport>, BatchSummary)> {
    let mut reports = Vec::new();
    let mut summary = BatchSummary::default();
    for db_path in discover_databases(build_dir)? {
        let name = db_path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let out = export_root.join(&name);
        if let Some(report) = summary.record(&name, export_database(&db_path, Some(&out), opts)) {
            reports.push(report);
        }
    }
    Ok((reports, summary))
}

/// All `*.db3` files in a directory, sorted.
pub fn discover_databases(build_dir: &Path) -> Result<Vec<PathBuf>> {
    if !build_dir.is_dir() {
        return Err(DirDbError::Other(format!(
            "Build directory does not exist: {}",
            build_dir.display()
        )));
    }
    let pattern = format!("{}/*.{DB_EXTENSION}", build_dir.display());
    let mut paths: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| DirDbError::Other(format!("Glob error: {e}")))?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file())
        .collect();
    paths.sort();
    Ok(paths)
}

/// User tables in the database, sorted by name. Backend-internal tables
/// (sqlite_sequence and friends) are not part of the mapping.
pub fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )?;
    let rows = stmt.query_map([], |row| row.get(0))?;

    let mut tables = Vec::new();
    for row in rows {
        tables.push(row?);
    }
    Ok(tables)
}

/// Column names of a table in declaration order.
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{table}\")"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;

    let mut columns = Vec::new();
    for row in rows {
        columns.push(row?);
    }
    Ok(columns)
}

/// Per-table detail for inspection output.
#[derive(Debug, Clone, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub rows: i64,
    /// (column, declared type, primary key)
    pub columns: Vec<(String, String, bool)>,
}

/// Inspect every table of a database file.
pub fn database_info(db_path: &Path) -> Result<Vec<TableInfo>> {
    if !db_path.is_file() {
        return Err(DirDbError::DatabaseNotFound(db_path.display().to_string()));
    }
    let conn = Connection::open(db_path)?;
    list_tables(&conn)?
        .iter()
        .map(|table| table_info(&conn, table))
        .collect()
}

pub fn table_info(conn: &Connection, table: &str) -> Result<TableInfo> {
    let rows: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| {
        row.get(0)
    })?;

    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{table}\")"))?;
    let column_rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i64>(5)? != 0,
        ))
    })?;

    let mut columns = Vec::new();
    for row in column_rows {
        columns.push(row?);
    }
    Ok(TableInfo {
        name: table.to_string(),
        rows,
        columns,
    })
}

// ── Data tables ──────────────────────────────────────────────────

/// Write one data table as CSV (and optionally JSON) in table column
/// order. Returns the number of rows written.
fn export_data_table(
    conn: &Connection,
    table: &str,
    tables_dir: &Path,
    opts: &ExportOptions,
) -> Result<usize> {
    std::fs::create_dir_all(tables_dir)?;

    let mut stmt = conn.prepare(&format!("SELECT * FROM \"{table}\""))?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

    let mut csv_writer = if opts.csv {
        let mut writer = csv::Writer::from_path(tables_dir.join(format!("{table}.csv")))?;
        writer.write_record(&columns)?;
        Some(writer)
    } else {
        None
    };
    let mut json_rows: Vec<serde_json::Value> = Vec::new();

    let mut count = 0;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        if let Some(writer) = csv_writer.as_mut() {
            let record: Vec<String> = (0..columns.len())
                .map(|i| value_to_csv(row.get_ref(i)))
                .collect::<rusqlite::Result<_>>()?;
            writer.write_record(&record)?;
        }
        if opts.json {
            let mut object = serde_json::Map::new();
            for (i, column) in columns.iter().enumerate() {
                object.insert(column.clone(), value_to_json(row.get_ref(i)?));
            }
            json_rows.push(serde_json::Value::Object(object));
        }
        count += 1;
    }

    if let Some(mut writer) = csv_writer {
        writer.flush()?;
    }
    if opts.json {
        let json_path = tables_dir.join(format!("{table}.json"));
        let text = serde_json::to_string_pretty(&json_rows)?;
        std::fs::write(json_path, text)?;
    }
    Ok(count)
}

fn value_to_csv(value: rusqlite::Result<ValueRef<'_>>) -> rusqlite::Result<String> {
    Ok(match value? {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).to_string(),
        ValueRef::Blob(b) => String::from_utf8_lossy(b).to_string(),
    })
}

fn value_to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::Number(i.into()),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(t) => serde_json::Value::String(String::from_utf8_lossy(t).into()),
        ValueRef::Blob(b) => serde_json::Value::String(String::from_utf8_lossy(b).into()),
    }
}

// ── File-tables ──────────────────────────────────────────────────

/// Write one file per row at `files/{table}/{code}`. Rows whose code is
/// empty or would escape the table directory are skipped and reported.
fn export_file_table(
    conn: &Connection,
    table: &str,
    files_dir: &Path,
    report: &mut ExportReport,
) -> Result<usize> {
    // Resolve the stored casing of the signature columns
    let columns = table_columns(conn, table)?;
    let find = |wanted: &str| {
        columns
            .iter()
            .find(|c| c.eq_ignore_ascii_case(wanted))
            .cloned()
            .unwrap_or_else(|| wanted.to_string())
    };
    let code_col = find("code");
    let blob_col = find("file_blob");

    let table_dir = files_dir.join(table);
    std::fs::create_dir_all(&table_dir)?;

    let mut stmt =
        conn.prepare(&format!("SELECT \"{code_col}\", \"{blob_col}\" FROM \"{table}\""))?;
    let mut rows = stmt.query([])?;

    let mut count = 0;
    while let Some(row) = rows.next()? {
        let code: String = row.get(0)?;
        let blob: Option<Vec<u8>> = row.get(1)?;
        if code.is_empty() || code.contains('/') || code.contains('\\') || code.contains("..") {
            report.warn(format!("file-table '{table}': unusable file name '{code}'"));
            continue;
        }
        let Some(bytes) = blob else {
            report.warn(format!("file-table '{table}': '{code}' has no content"));
            continue;
        };
        std::fs::write(table_dir.join(&code), bytes)?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::build_target;
    use crate::target::Target;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn strings(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_is_file_table_signature() {
        assert!(is_file_table(&strings(&["ID", "code", "file_blob"])));
        assert!(is_file_table(&strings(&["file_blob", "id", "CODE"])));
        assert!(!is_file_table(&strings(&["ID", "code"])));
        assert!(!is_file_table(&strings(&["ID", "code", "file_blob", "extra"])));
        assert!(!is_file_table(&strings(&["ID", "name", "file_blob"])));
    }

    fn build_demo(tmp: &TempDir) -> PathBuf {
        let target = Target::new(tmp.path(), "demo");
        std::fs::create_dir_all(target.tables_dir()).unwrap();
        std::fs::write(
            target.tables_dir().join("users.csv"),
            "id,score,name\n1,2.5,Alice\n2,,Bob\n",
        )
        .unwrap();
        let icons = target.files_dir().join("icons");
        std::fs::create_dir_all(&icons).unwrap();
        std::fs::write(target.files_dir().join("tables.config"), "icons\n").unwrap();
        std::fs::write(icons.join("logo.bin"), [0u8, 159, 146, 150]).unwrap();

        let report = build_target(&target, &tmp.path().join("build")).unwrap();
        report.db_path
    }

    #[test]
    fn test_csv_round_trip() {
        let tmp = TempDir::new().unwrap();
        let db_path = build_demo(&tmp);
        let out = tmp.path().join("out");

        let report =
            export_database(&db_path, Some(&out), &ExportOptions::default()).unwrap();
        assert_eq!(report.data_tables, vec![("users".to_string(), 2)]);

        let csv = std::fs::read_to_string(out.join("tables/users.csv")).unwrap();
        assert_eq!(csv, "id,score,name\n1,2.5,Alice\n2,,Bob\n");
        // CSV-only default: no JSON written
        assert!(!out.join("tables/users.json").exists());
    }

    #[test]
    fn test_file_round_trip_byte_identical() {
        let tmp = TempDir::new().unwrap();
        let db_path = build_demo(&tmp);
        let out = tmp.path().join("out");

        let report =
            export_database(&db_path, Some(&out), &ExportOptions::default()).unwrap();
        assert_eq!(report.file_tables, vec![("icons".to_string(), 1)]);

        let bytes = std::fs::read(out.join("files/icons/logo.bin")).unwrap();
        assert_eq!(bytes, vec![0u8, 159, 146, 150]);
    }

    #[test]
    fn test_json_export() {
        let tmp = TempDir::new().unwrap();
        let db_path = build_demo(&tmp);
        let out = tmp.path().join("out");

        let opts = ExportOptions {
            csv: false,
            json: true,
        };
        export_database(&db_path, Some(&out), &opts).unwrap();

        assert!(!out.join("tables/users.csv").exists());
        let text = std::fs::read_to_string(out.join("tables/users.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed[0]["id"], 1);
        assert_eq!(parsed[0]["score"], 2.5);
        assert_eq!(parsed[1]["score"], serde_json::Value::Null);
        assert_eq!(parsed[1]["name"], "Bob");
    }

    #[test]
    fn test_classification_ignores_table_name() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("odd.db3");
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE looks_like_data (ID INTEGER, code TEXT, file_blob BLOB);
             INSERT INTO looks_like_data VALUES (1, 'x.bin', x'0102');
             CREATE TABLE files (a TEXT, b TEXT);
             INSERT INTO files VALUES ('1', '2');",
        )
        .unwrap();
        drop(conn);

        let out = tmp.path().join("out");
        let report =
            export_database(&db_path, Some(&out), &ExportOptions::default()).unwrap();

        assert_eq!(report.file_tables, vec![("looks_like_data".to_string(), 1)]);
        assert_eq!(report.data_tables, vec![("files".to_string(), 1)]);
        assert!(out.join("files/looks_like_data/x.bin").exists());
        assert!(out.join("tables/files.csv").exists());
    }

    #[test]
    fn test_internal_tables_not_exported() {
        let tmp = TempDir::new().unwrap();
        // AUTOINCREMENT creates sqlite_sequence
        let db_path = build_demo(&tmp);
        let out = tmp.path().join("out");

        let report =
            export_database(&db_path, Some(&out), &ExportOptions::default()).unwrap();
        assert!(report
            .data_tables
            .iter()
            .all(|(name, _)| !name.starts_with("sqlite_")));
        assert!(!out.join("tables/sqlite_sequence.csv").exists());
    }

    #[test]
    fn test_export_defaults_next_to_database() {
        let tmp = TempDir::new().unwrap();
        let db_path = build_demo(&tmp);

        let report = export_database(&db_path, None, &ExportOptions::default()).unwrap();
        assert_eq!(report.output_dir, tmp.path().join("build"));
        assert!(tmp.path().join("build/tables/users.csv").exists());
    }

    #[test]
    fn test_missing_database() {
        let tmp = TempDir::new().unwrap();
        let err = export_database(
            &tmp.path().join("nope.db3"),
            None,
            &ExportOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DirDbError::DatabaseNotFound(_)));
    }

    #[test]
    fn test_export_all() {
        let tmp = TempDir::new().unwrap();
        build_demo(&tmp);
        let build_dir = tmp.path().join("build");
        // A corrupt database file must not stop the batch
        std::fs::write(build_dir.join("broken.db3"), b"not a database").unwrap();

        let export_root = tmp.path().join("export");
        let (reports, summary) =
            export_all(&build_dir, &export_root, &ExportOptions::default()).unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(summary.succeeded, vec!["demo".to_string()]);
        assert_eq!(summary.failed.len(), 1);
        assert!(export_root.join("demo/tables/users.csv").exists());
    }

    #[test]
    fn test_table_info() {
        let tmp = TempDir::new().unwrap();
        let db_path = build_demo(&tmp);
        let conn = Connection::open(&db_path).unwrap();

        let info = table_info(&conn, "users").unwrap();
        assert_eq!(info.rows, 2);
        assert_eq!(info.columns.len(), 3);
        assert_eq!(info.columns[0].0, "id");
        assert_eq!(info.columns[0].1, "INTEGER");
    }
}
