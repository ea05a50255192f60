mod output;

use std::collections::HashMap;

use serde::Serialize;
use tc_config::AssessmentConfig;

pub use output::{FanOutAssessor, JsonListing, TextListing};

pub type WordFrequencies = HashMap<String, u64>;

/// Count whitespace-separated tokens across all texts.
pub fn word_frequencies<'a>(texts: impl IntoIterator<Item = &'a str>) -> WordFrequencies {
    let mut freqs = WordFrequencies::new();
    for word in texts.into_iter().flat_map(str::split_whitespace) {
        *freqs.entry(word.to_string()).or_insert(0) += 1;
    }
    freqs
}

/// Consumer of one window's word counts. Called from a blocking worker, once
/// per window.
pub trait WindowAssessor: Send + Sync {
    fn assess(&self, window_id: &str, frequencies: &WordFrequencies) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedWord {
    pub word: String,
    pub count: u64,
}

/// Ranking thresholds taken from `[assessment]`.
#[derive(Debug, Clone, Copy)]
pub struct Assessment {
    min_word_length: usize,
    frequency_threshold: u64,
    word_number: usize,
}

impl Assessment {
    pub fn new(config: &AssessmentConfig) -> Self {
        Self {
            min_word_length: config.min_word_length,
            frequency_threshold: config.frequency_threshold,
            word_number: config.word_number,
        }
    }

    /// Words longer than `min_word_length` seen more than
    /// `frequency_threshold` times, most frequent first, ties broken by word.
    pub fn rank(&self, frequencies: &WordFrequencies) -> Vec<RankedWord> {
        let mut ranked: Vec<RankedWord> = frequencies
            .iter()
            .filter(|(word, count)| {
                **count > self.frequency_threshold && word.chars().count() > self.min_word_length
            })
            .map(|(word, count)| RankedWord {
                word: word.clone(),
                count: *count,
            })
            .collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));
        ranked.truncate(self.word_number);
        ranked
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
