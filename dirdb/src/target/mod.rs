// Target discovery - one source directory per generated database

use crate::error::{DirDbError, Result};
use std::path::{Path, PathBuf};

/// File name of an optional pre-authored schema script at the target root.
pub const SCHEMA_SCRIPT: &str = "schema.sql";

/// One source/output pairing: a named directory under the data root that
/// becomes a single database file. Discovered at invocation time, never
/// persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub name: String,
    pub dir: PathBuf,
}

impl Target {
    pub fn new(data_root: &Path, name: &str) -> Self {
        Target {
            name: name.to_string(),
            dir: data_root.join(name),
        }
    }

    pub fn schema_script(&self) -> PathBuf {
        self.dir.join(SCHEMA_SCRIPT)
    }

    pub fn tables_dir(&self) -> PathBuf {
        self.dir.join("tables")
    }

    pub fn files_dir(&self) -> PathBuf {
        self.dir.join("files")
    }
}

/// A directory is a target when it carries any of the inputs the builder
/// consumes.
fn is_target_dir(dir: &Path) -> bool {
    dir.join("tables").is_dir() || dir.join("files").is_dir() || dir.join(SCHEMA_SCRIPT).is_file()
}

/// Enumerate all target directories under the data root, sorted by name.
/// Hidden directories are skipped.
pub fn discover_targets(data_root: &Path) -> Result<Vec<Target>> {
    if !data_root.is_dir() {
        return Err(DirDbError::Other(format!(
            "Data root does not exist: {}",
            data_root.display()
        )));
    }

    let mut targets = Vec::new();
    for entry in std::fs::read_dir(data_root)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if !path.is_dir() || name.starts_with('.') {
            continue;
        }
        if is_target_dir(&path) {
            targets.push(Target { name, dir: path });
        }
    }
    targets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(targets)
}

/// Look up a single named target under the data root.
pub fn find_target(data_root: &Path, name: &str) -> Result<Target> {
    let target = Target::new(data_root, name);
    if !target.dir.is_dir() || !is_target_dir(&target.dir) {
        return Err(DirDbError::TargetNotFound(name.to_string()));
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_discover_targets() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("beta/tables")).unwrap();
        std::fs::create_dir_all(tmp.path().join("alpha/files")).unwrap();
        std::fs::create_dir_all(tmp.path().join(".hidden/tables")).unwrap();
        std::fs::create_dir(tmp.path().join("not-a-target")).unwrap();
        std::fs::create_dir(tmp.path().join("schema-only")).unwrap();
        std::fs::write(tmp.path().join("schema-only").join(SCHEMA_SCRIPT), "").unwrap();

        let targets = discover_targets(tmp.path()).unwrap();
        let names: Vec<&str> = targets.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "schema-only"]);
    }

    #[test]
    fn test_discover_missing_root() {
        let tmp = TempDir::new().unwrap();
        assert!(discover_targets(&tmp.path().join("nope")).is_err());
    }

    #[test]
    fn test_find_target() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("alpha/tables")).unwrap();

        let target = find_target(tmp.path(), "alpha").unwrap();
        assert_eq!(target.name, "alpha");
        assert_eq!(target.tables_dir(), tmp.path().join("alpha").join("tables"));

        let err = find_target(tmp.path(), "missing").unwrap_err();
        assert!(matches!(err, DirDbError::TargetNotFound(_)));
    }
}
