use thiserror::Error;

#[derive(Error, Debug)]
pub enum DirDbError {
    #[error("Schema script error: {0}")]
    SchemaScript(String),

    #[error("Ambiguous schema for table '{table}': duplicate column '{column}'")]
    AmbiguousSchema { table: String, column: String },

    #[error("Target not found: {0}")]
    TargetNotFound(String),

    #[error("Database file not found: {0}")]
    DatabaseNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, DirDbError>;
