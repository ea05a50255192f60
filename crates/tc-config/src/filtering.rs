use serde::{Deserialize, Serialize};

/// `[filtering]` — word lists applied to record text before windowing.
///
/// The whole section may be omitted; every list defaults to empty.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FilteringConfig {
    /// Removed wherever they occur, even inside words.
    pub punctuation: Vec<String>,
    pub stop_words: Vec<String>,
    /// A record containing any of these words is discarded.
    pub baseline: Vec<String>,
    pub bad_words: Vec<String>,
}
