// Database builder - one target directory in, one database file out

use crate::error::{DirDbError, Result};
use crate::manifest::{self, MANIFEST_FILE};
use crate::report::BatchSummary;
use crate::schema::{self, ColumnType};
use crate::target::{self, Target, SCHEMA_SCRIPT};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Extension of generated database files.
pub const DB_EXTENSION: &str = "db3";

/// Name of the reserved configuration table.
pub const CONFIG_TABLE: &str = "config";

/// What one target build produced, including every recoverable error that
/// was worked around along the way.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub target: String,
    pub db_path: PathBuf,
    pub data_tables: Vec<String>,
    pub file_tables: Vec<String>,
    pub config_keys: usize,
    pub scripts_run: usize,
    pub warnings: Vec<String>,
}

impl BuildReport {
    fn new(target: &Target, db_path: PathBuf) -> Self {
        BuildReport {
            target: target.name.clone(),
            db_path,
            data_tables: Vec::new(),
            file_tables: Vec::new(),
            config_keys: 0,
            scripts_run: 0,
            warnings: Vec::new(),
        }
    }

    fn warn(&mut self, message: String) {
        log::warn!("{}: {message}", self.target);
        self.warnings.push(message);
    }
}

/// Build one target into `{build_dir}/{target}.db3`, overwriting any prior
/// file at that path. Fixed step order: schema script, data tables,
/// file-tables, config files, ad-hoc scripts. A schema script failure
/// aborts the target; everything later degrades to warnings on the report.
pub fn build_target(target: &Target, build_dir: &Path) -> Result<BuildReport> {
    std::fs::create_dir_all(build_dir)?;
    let db_path = build_dir.join(format!("{}.{DB_EXTENSION}", target.name));
    if db_path.exists() {
        std::fs::remove_file(&db_path)?;
    }

    let conn = Connection::open(&db_path)?;
    let mut report = BuildReport::new(target, db_path);

    let script = target.schema_script();
    if script.is_file() {
        let sql = std::fs::read_to_string(&script)?;
        conn.execute_batch(&sql).map_err(|e| {
            DirDbError::SchemaScript(format!("{}: {e}", script.display()))
        })?;
    }

    let tables_dir = target.tables_dir();
    if tables_dir.is_dir() {
        load_data_tables(&conn, &tables_dir, &mut report)?;
    }

    let files_dir = target.files_dir();
    if files_dir.is_dir() {
        load_file_tables(&conn, &files_dir, &mut report)?;
    }

    if tables_dir.is_dir() {
        import_config_files(&conn, &tables_dir, &mut report)?;
        run_adhoc_scripts(&conn, &tables_dir, &mut report)?;
    }

    Ok(report)
}

/// Build every discoverable target under the data root. One target's
/// failure is recorded and the rest still run.
pub fn build_all(data_root: &Path, build_dir: &Path) -> Result<(Vec<BuildReport>, BatchSummary)> {
    let targets = target::discover_targets(data_root)?;
    let mut reports = Vec::new();
    let mut summary = BatchSummary::default();
    for target in &targets {
        if let Some(report) = summary.record(&target.name, build_target(target, build_dir)) {
            reports.push(report);
        }
    }
    Ok((reports, summary))
}

// ── Data tables ──────────────────────────────────────────────────

fn load_data_tables(conn: &Connection, tables_dir: &Path, report: &mut BuildReport) -> Result<()> {
    let set = manifest::data_tables(tables_dir)?;
    for name in set.names() {
        let csv_path = tables_dir.join(format!("{name}.csv"));
        if !csv_path.is_file() {
            report.warn(format!(
                "table '{name}': declared in manifest but {} is missing",
                csv_path.display()
            ));
            continue;
        }
        match load_data_table(conn, name, &csv_path, report) {
            Ok(true) => report.data_tables.push(name.clone()),
            Ok(false) => {}
            Err(e) => report.warn(format!("table '{name}': {e}")),
        }
    }
    Ok(())
}

/// Load one CSV file into its table. Returns false when the table was
/// skipped (empty CSV). An [`DirDbError::AmbiguousSchema`] or any storage
/// error surfaces to the caller, which downgrades it to a per-table
/// warning.
fn load_data_table(
    conn: &Connection,
    name: &str,
    csv_path: &Path,
    report: &mut BuildReport,
) -> Result<bool> {
    let table_schema = match schema::synthesize_from_csv(name, csv_path)? {
        Some(s) => s,
        None => {
            report.warn(format!("table '{name}': empty CSV, skipped"));
            return Ok(false);
        }
    };

    if !table_exists(conn, name)? {
        conn.execute(&table_schema.create_sql(), [])?;
    }
    conn.execute(&format!("DELETE FROM \"{name}\""), [])?;

    // Coerce against what the database declares: for tables the schema
    // script pre-defined this is the authored type, otherwise it is the
    // inferred type we just created the table with.
    let declared = declared_types(conn, name)?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(csv_path)?;
    let headers = reader.headers()?.clone();
    let column_types: Vec<ColumnType> = headers
        .iter()
        .map(|h| {
            declared
                .get(&h.trim().to_ascii_lowercase())
                .copied()
                .unwrap_or(ColumnType::Text)
        })
        .collect();

    let column_list = headers
        .iter()
        .map(|h| format!("\"{}\"", h.trim()))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=headers.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let insert_sql = format!("INSERT INTO \"{name}\" ({column_list}) VALUES ({placeholders})");
    let mut stmt = conn.prepare(&insert_sql)?;

    conn.execute_batch("BEGIN TRANSACTION")?;
    for (row_idx, record) in reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                report.warn(format!("table '{name}' row {}: {e}", row_idx + 1));
                continue;
            }
        };
        let values: Vec<rusqlite::types::Value> = column_types
            .iter()
            .enumerate()
            .map(|(i, ty)| {
                coerce_value(record.get(i).unwrap_or(""), *ty).unwrap_or_else(|| {
                    report.warn(format!(
                        "table '{name}' row {}, column '{}': '{}' is not {}, stored as NULL",
                        row_idx + 1,
                        &headers[i],
                        record.get(i).unwrap_or(""),
                        ty.sql(),
                    ));
                    rusqlite::types::Value::Null
                })
            })
            .collect();
        if let Err(e) = stmt.execute(params_from_iter(values)) {
            report.warn(format!("table '{name}' row {}: {e}", row_idx + 1));
        }
    }
    conn.execute_batch("COMMIT")?;

    Ok(true)
}

/// Convert one CSV value to a storage value of the given type.
/// Empty values become NULL; `None` means the value did not parse.
fn coerce_value(raw: &str, ty: ColumnType) -> Option<rusqlite::types::Value> {
    use rusqlite::types::Value;

    if raw.trim().is_empty() {
        return Some(Value::Null);
    }
    match ty {
        ColumnType::Integer => raw.trim().parse::<i64>().ok().map(Value::Integer),
        ColumnType::Real => raw.trim().parse::<f64>().ok().map(Value::Real),
        ColumnType::Text => Some(Value::Text(raw.to_string())),
    }
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Declared column types of an existing table, keyed by lowercase name.
fn declared_types(conn: &Connection, name: &str) -> Result<HashMap<String, ColumnType>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{name}\")"))?;
    let rows = stmt.query_map([], |row| {
        let column: String = row.get(1)?;
        let decl: String = row.get(2)?;
        Ok((column, decl))
    })?;

    let mut types = HashMap::new();
    for row in rows {
        let (column, decl) = row?;
        types.insert(column.to_ascii_lowercase(), ColumnType::from_decl(&decl));
    }
    Ok(types)
}

// ── File-tables ──────────────────────────────────────────────────

fn load_file_tables(conn: &Connection, files_dir: &Path, report: &mut BuildReport) -> Result<()> {
    let set = manifest::file_tables(files_dir)?;
    for name in set.names() {
        let table_dir = files_dir.join(name);
        if !table_dir.is_dir() {
            report.warn(format!(
                "file-table '{name}': no subdirectory at {}",
                table_dir.display()
            ));
            continue;
        }
        match load_file_table(conn, name, &table_dir, report) {
            Ok(count) => {
                if count == 0 {
                    report.warn(format!("file-table '{name}': created but no files found"));
                }
                report.file_tables.push(name.clone());
            }
            Err(e) => report.warn(format!("file-table '{name}': {e}")),
        }
    }
    Ok(())
}

/// Insert one row per file found directly in the table's subdirectory,
/// sorted by name so rebuilds enumerate identically.
fn load_file_table(
    conn: &Connection,
    name: &str,
    table_dir: &Path,
    report: &mut BuildReport,
) -> Result<usize> {
    conn.execute_batch(&schema::file_table_create_sql(name))?;
    conn.execute(&format!("DELETE FROM \"{name}\""), [])?;

    let mut paths: Vec<PathBuf> = std::fs::read_dir(table_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    let mut stmt =
        conn.prepare(&format!("INSERT INTO \"{name}\" (code, file_blob) VALUES (?1, ?2)"))?;

    let mut count = 0;
    for path in paths {
        let code = path.file_name().unwrap_or_default().to_string_lossy().to_string();
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) => {
                report.warn(format!("file-table '{name}': could not read '{code}': {e}"));
                continue;
            }
        };
        stmt.execute(params![code, bytes])?;
        count += 1;
    }
    Ok(count)
}

// ── Config files ─────────────────────────────────────────────────

fn import_config_files(
    conn: &Connection,
    tables_dir: &Path,
    report: &mut BuildReport,
) -> Result<()> {
    let config_paths = glob_sorted(tables_dir, "config", MANIFEST_FILE)?;
    if config_paths.is_empty() {
        return Ok(());
    }

    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS \"{CONFIG_TABLE}\" (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )"
    ))?;

    // Sorted file order; a key defined in several files takes the value
    // from the last one.
    let mut stmt = conn.prepare(&format!(
        "INSERT OR REPLACE INTO \"{CONFIG_TABLE}\" (key, value) VALUES (?1, ?2)"
    ))?;
    for path in config_paths {
        match crate::config::parse_config_file(&path) {
            Ok(map) => {
                for (key, value) in map.pairs() {
                    stmt.execute(params![key, value])?;
                    report.config_keys += 1;
                }
            }
            Err(e) => report.warn(format!("config '{}': {e}", path.display())),
        }
    }
    Ok(())
}

// ── Ad-hoc SQL scripts ───────────────────────────────────────────

fn run_adhoc_scripts(conn: &Connection, tables_dir: &Path, report: &mut BuildReport) -> Result<()> {
    for path in glob_sorted(tables_dir, "sql", SCHEMA_SCRIPT)? {
        let sql = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) => {
                report.warn(format!("script '{}': {e}", path.display()));
                continue;
            }
        };
        match conn.execute_batch(&sql) {
            Ok(()) => report.scripts_run += 1,
            Err(e) => report.warn(format!("script '{}': {e}", path.display())),
        }
    }
    Ok(())
}

/// All `*.{ext}` files in a directory except the named one, sorted.
fn glob_sorted(dir: &Path, ext: &str, exclude: &str) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/*.{ext}", dir.display());
    let mut paths: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| DirDbError::Other(format!("Glob error: {e}")))?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file())
        .filter(|p| p.file_name().map(|n| n != exclude).unwrap_or(false))
        .collect();
    paths.sort();
    Ok(paths)
}
