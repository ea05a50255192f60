use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::HumanDuration;

/// `[assessment]` — window width and per-window ranking thresholds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssessmentConfig {
    /// Width of every time window.
    #[serde(default = "default_window")]
    pub window: HumanDuration,
    /// Words must be strictly longer than this to be ranked.
    #[serde(default = "default_min_word_length")]
    pub min_word_length: usize,
    /// Words must occur strictly more often than this to be ranked.
    #[serde(default = "default_frequency_threshold")]
    pub frequency_threshold: u64,
    /// How many top words each window keeps.
    #[serde(default = "default_word_number")]
    pub word_number: usize,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_window() -> HumanDuration {
    HumanDuration::from(Duration::from_secs(60))
}

fn default_min_word_length() -> usize {
    4
}

fn default_frequency_threshold() -> u64 {
    15
}

fn default_word_number() -> usize {
    20
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("frequencies")
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            min_word_length: default_min_word_length(),
            frequency_threshold: default_frequency_threshold(),
            word_number: default_word_number(),
            output_dir: default_output_dir(),
        }
    }
}
