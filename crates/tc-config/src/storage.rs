use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// `[storage]` — where pulled records are persisted and how writes are batched.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// SQLite database file. Relative paths are resolved against the config
    /// file's parent directory.
    pub path: PathBuf,
    #[serde(default = "default_table")]
    pub table: String,
    /// Pending records that force a commit even while the queue is busy.
    #[serde(default = "default_batch_threshold")]
    pub batch_threshold: usize,
    /// Bound of the source → writer queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_table() -> String {
    "time_series".to_string()
}

fn default_batch_threshold() -> usize {
    200
}

fn default_queue_capacity() -> usize {
    1024
}
