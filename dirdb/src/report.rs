// Batch outcome tracking - one failure never hides the rest

use serde::Serialize;

/// Outcome of one batch run (build-all, export-all, sync).
/// Per-item failures are recorded here instead of aborting the batch.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BatchSummary {
    /// Record one item's result, keeping the value on success.
    pub fn record<T>(&mut self, name: &str, result: crate::Result<T>) -> Option<T> {
        match result {
            Ok(value) => {
                self.succeeded.push(name.to_string());
                Some(value)
            }
            Err(e) => {
                log::warn!("{name}: {e}");
                self.failed.push((name.to_string(), e.to_string()));
                None
            }
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn all_ok(&self) -> bool {
        self.failed.is_empty()
    }
}
