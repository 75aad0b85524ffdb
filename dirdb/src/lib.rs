pub mod config;
pub mod manifest;
pub mod schema;
pub mod target;
pub mod report;
pub mod build;
pub mod export;
pub mod sync;
pub mod error;

pub use error::{DirDbError, Result};
pub use build::{build_all, build_target, BuildReport};
pub use export::{export_all, export_database, ExportOptions, ExportReport};
pub use report::BatchSummary;
pub use sync::sync_build_dir;
pub use target::Target;
