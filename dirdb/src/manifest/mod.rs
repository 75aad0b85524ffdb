// Table manifests - which tables a target declares, with fallback discovery

use crate::error::{DirDbError, Result};
use std::collections::HashSet;
use std::path::Path;

/// File name of the manifest inside `tables/` and `files/`.
pub const MANIFEST_FILE: &str = "tables.config";

/// How the table list for a directory was determined.
/// Resolved once per target; the builder never re-checks the manifest.
#[derive(Debug, Clone, PartialEq)]
pub enum TableSet {
    /// Names declared in a manifest file, in declaration order.
    Explicit(Vec<String>),
    /// Names discovered by scanning the directory (or empty where
    /// scanning is not safe).
    Inferred(Vec<String>),
}

impl TableSet {
    pub fn names(&self) -> &[String] {
        match self {
            TableSet::Explicit(names) | TableSet::Inferred(names) => names,
        }
    }

    pub fn is_explicit(&self) -> bool {
        matches!(self, TableSet::Explicit(_))
    }

    pub fn is_empty(&self) -> bool {
        self.names().is_empty()
    }
}

/// Parse manifest text into an ordered list of unique table names.
/// Grammar: `#` comments and blank lines are skipped; a line is either a
/// single bare name or `tables=a,b,c`; both forms may coexist. Duplicate
/// names are dropped with a warning.
pub fn parse_manifest_str(text: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut seen = HashSet::new();
    let mut push = |name: &str| {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        if seen.insert(name.to_string()) {
            names.push(name.to_string());
        } else {
            log::warn!("duplicate table name '{name}' in manifest, ignored");
        }
    };

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(list) = line.strip_prefix("tables=") {
            for name in list.split(',') {
                push(name);
            }
        } else {
            push(line);
        }
    }
    names
}

/// Load a manifest file. A missing file yields an empty list, which
/// callers treat the same as an empty manifest.
pub fn load_manifest(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = std::fs::read_to_string(path)?;
    Ok(parse_manifest_str(&text))
}

/// Resolve the data-table set for a `tables/` directory.
/// Falls back to all CSV base names present when the manifest is missing
/// or empty.
pub fn data_tables(tables_dir: &Path) -> Result<TableSet> {
    let declared = load_manifest(&tables_dir.join(MANIFEST_FILE))?;
    if !declared.is_empty() {
        return Ok(TableSet::Explicit(declared));
    }
    Ok(TableSet::Inferred(csv_base_names(tables_dir)?))
}

/// Resolve the file-table set for a `files/` directory.
/// File-tables require explicit declaration; with no manifest there is no
/// safe inference, so the fallback is empty.
pub fn file_tables(files_dir: &Path) -> Result<TableSet> {
    let declared = load_manifest(&files_dir.join(MANIFEST_FILE))?;
    if !declared.is_empty() {
        return Ok(TableSet::Explicit(declared));
    }
    Ok(TableSet::Inferred(Vec::new()))
}

/// Base names of all `*.csv` files in a directory, sorted.
fn csv_base_names(dir: &Path) -> Result<Vec<String>> {
    let pattern = format!("{}/*.csv", dir.display());
    let mut names: Vec<String> = glob::glob(&pattern)
        .map_err(|e| DirDbError::Other(format!("Glob error: {e}")))?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file())
        .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().to_string()))
        .collect();
    names.sort();
    Ok(names)
}

/// Counts of names written by [`generate_manifests`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct GeneratedManifests {
    pub data_tables: Option<usize>,
    pub file_tables: Option<usize>,
}

/// Write `tables/tables.config` and `files/tables.config` for a target
/// directory from the CSV files and blob subdirectories present.
/// A directory with nothing to declare keeps its current state.
pub fn generate_manifests(target_dir: &Path) -> Result<GeneratedManifests> {
    let mut generated = GeneratedManifests::default();

    let tables_dir = target_dir.join("tables");
    if tables_dir.is_dir() {
        let names = csv_base_names(&tables_dir)?;
        if !names.is_empty() {
            let mut text = String::from(
                "# Tables configuration\n\
                 # One table name per line; CSV file names must match table names.\n\
                 # Generated from the CSV files present in this directory.\n\n",
            );
            for name in &names {
                text.push_str(name);
                text.push('\n');
            }
            std::fs::write(tables_dir.join(MANIFEST_FILE), text)?;
            generated.data_tables = Some(names.len());
        }
    }

    let files_dir = target_dir.join("files");
    if files_dir.is_dir() {
        let mut names: Vec<String> = std::fs::read_dir(&files_dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|n| !n.starts_with('.'))
            .collect();
        names.sort();
        if !names.is_empty() {
            let mut text = String::from(
                "# File-table configuration\n\
                 # One table name per line; each name must match a subdirectory of files/.\n\
                 # Generated from the subdirectories present.\n\n",
            );
            for name in &names {
                text.push_str(name);
                text.push('\n');
            }
            std::fs::write(files_dir.join(MANIFEST_FILE), text)?;
            generated.file_tables = Some(names.len());
        }
    }

    Ok(generated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_parse_bare_names() {
        assert_eq!(
            parse_manifest_str("users\nlogs\n"),
            vec!["users".to_string(), "logs".to_string()]
        );
    }

    #[test]
    fn test_parse_tables_line() {
        assert_eq!(
            parse_manifest_str("tables=users, logs ,audit\n"),
            vec!["users".to_string(), "logs".to_string(), "audit".to_string()]
        );
    }

    #[test]
    fn test_parse_mixed_forms_and_comments() {
        let text = "# declared tables\nusers\ntables=logs,audit\n\nextra\n";
        assert_eq!(
            parse_manifest_str(text),
            vec!["users", "logs", "audit", "extra"]
        );
    }

    #[test]
    fn test_duplicates_dropped() {
        assert_eq!(
            parse_manifest_str("users\ntables=users,logs\nlogs\n"),
            vec!["users".to_string(), "logs".to_string()]
        );
    }

    #[test]
    fn test_data_tables_explicit() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.csv"), "x\n1\n").unwrap();
        std::fs::write(tmp.path().join("b.csv"), "x\n1\n").unwrap();
        std::fs::write(tmp.path().join(MANIFEST_FILE), "a\n").unwrap();

        let set = data_tables(tmp.path()).unwrap();
        assert!(set.is_explicit());
        assert_eq!(set.names(), &["a".to_string()]);
    }

    #[test]
    fn test_data_tables_fallback_to_all_csv() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("b.csv"), "x\n1\n").unwrap();
        std::fs::write(tmp.path().join("a.csv"), "x\n1\n").unwrap();

        let set = data_tables(tmp.path()).unwrap();
        assert!(!set.is_explicit());
        assert_eq!(set.names(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_data_tables_empty_manifest_falls_back() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.csv"), "x\n1\n").unwrap();
        std::fs::write(tmp.path().join(MANIFEST_FILE), "# nothing declared\n").unwrap();

        let set = data_tables(tmp.path()).unwrap();
        assert!(!set.is_explicit());
        assert_eq!(set.names(), &["a".to_string()]);
    }

    #[test]
    fn test_file_tables_require_manifest() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("icons")).unwrap();

        let set = file_tables(tmp.path()).unwrap();
        assert!(set.is_empty());

        std::fs::write(tmp.path().join(MANIFEST_FILE), "icons\n").unwrap();
        let set = file_tables(tmp.path()).unwrap();
        assert_eq!(set.names(), &["icons".to_string()]);
    }

    #[test]
    fn test_generate_manifests() {
        let tmp = TempDir::new().unwrap();
        let tables = tmp.path().join("tables");
        let files = tmp.path().join("files");
        std::fs::create_dir(&tables).unwrap();
        std::fs::create_dir(&files).unwrap();
        std::fs::write(tables.join("users.csv"), "id\n1\n").unwrap();
        std::fs::write(tables.join("logs.csv"), "id\n1\n").unwrap();
        std::fs::create_dir(files.join("icons")).unwrap();
        std::fs::create_dir(files.join(".hidden")).unwrap();

        let generated = generate_manifests(tmp.path()).unwrap();
        assert_eq!(generated.data_tables, Some(2));
        assert_eq!(generated.file_tables, Some(1));

        assert_eq!(
            load_manifest(&tables.join(MANIFEST_FILE)).unwrap(),
            vec!["logs".to_string(), "users".to_string()]
        );
        assert_eq!(
            load_manifest(&files.join(MANIFEST_FILE)).unwrap(),
            vec!["icons".to_string()]
        );
    }

    #[test]
    fn test_generate_manifests_nothing_to_declare() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("tables")).unwrap();

        let generated = generate_manifests(tmp.path()).unwrap();
        assert_eq!(generated, GeneratedManifests::default());
        assert!(!tmp.path().join("tables").join(MANIFEST_FILE).exists());
    }
}
