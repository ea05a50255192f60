use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{HumanDuration, SourceMode};

/// `[capture]` — which source feeds the pipeline and how it is bounded.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptureConfig {
    pub mode: SourceMode,
    /// Record file for `mode = "file"`. Relative paths are resolved against
    /// the config file's parent directory.
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// How long a live capture runs before the first late status stops it.
    #[serde(default = "default_duration")]
    pub duration: HumanDuration,
    /// Live feed endpoint, e.g. `"tcp://127.0.0.1:9900"`.
    #[serde(default)]
    pub feed: Option<String>,
    /// Track keywords sent to the feed; also stripped from text by the filter.
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub keep_reply: bool,
    #[serde(default)]
    pub keep_retweet: bool,
    /// Capacity of the feed → `advance()` bridge channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_duration() -> HumanDuration {
    HumanDuration::from(Duration::from_secs(60))
}

fn default_language() -> String {
    "it".to_string()
}

fn default_channel_capacity() -> usize {
    1024
}

impl CaptureConfig {
    /// Feed address without the `tcp://` scheme.
    pub fn feed_addr(&self) -> Option<&str> {
        self.feed
            .as_deref()
            .map(|f| f.strip_prefix("tcp://").unwrap_or(f))
    }
}
