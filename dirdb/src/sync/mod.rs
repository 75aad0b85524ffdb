// Sync - push built databases back into the data tree

use crate::error::Result;
use crate::export::{self, ExportOptions, ExportReport};
use crate::report::BatchSummary;
use std::path::Path;

/// Export every database in the build directory into the matching target
/// directory under the data root, creating it when missing.
///
/// Only generated content is written (`tables/*.csv`, `files/**`);
/// hand-authored inputs in the target directory — the schema script,
/// manifests, and `*.config` files — are left untouched, so repeated sync
/// runs are safe. Per-database failures are recorded and the rest of the
/// batch still runs.
pub fn sync_build_dir(
    build_dir: &Path,
    data_root: &Path,
) -> Result<(Vec<ExportReport>, BatchSummary)> {
    let opts = ExportOptions {
        csv: true,
        json: false,
    };

    let mut reports = Vec::new();
    let mut summary = BatchSummary::default();
    for db_path in export::discover_databases(build_dir)? {
        let name = db_path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let target_dir = data_root.join(&name);
        let result = std::fs::create_dir_all(&target_dir)
            .map_err(Into::into)
            .and_then(|_| export::export_database(&db_path, Some(&target_dir), &opts));
        if let Some(report) = summary.record(&name, result) {
            reports.push(report);
        }
    }
    Ok((reports, summary))
}
