use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use super::{Assessment, RankedWord, WindowAssessor, WordFrequencies};

fn artifact_path(dir: &Path, window_id: &str, ext: &str) -> PathBuf {
    dir.join(format!("word_frequency-{window_id}.{ext}"))
}

/// Writes `word_frequency-<id>.txt` with one `word = count` line per ranked
/// word.
pub struct TextListing {
    dir: PathBuf,
    assessment: Assessment,
}

impl TextListing {
    pub fn new(dir: impl Into<PathBuf>, assessment: Assessment) -> Self {
        Self {
            dir: dir.into(),
            assessment,
        }
    }
}

impl WindowAssessor for TextListing {
    fn assess(&self, window_id: &str, frequencies: &WordFrequencies) -> Result<()> {
        let mut body = String::new();
        for r in self.assessment.rank(frequencies) {
            writeln!(body, "{} = {}", r.word, r.count)?;
        }
        let path = artifact_path(&self.dir, window_id, "txt");
        std::fs::write(&path, body).with_context(|| format!("write {}", path.display()))
    }
}

#[derive(Serialize)]
struct JsonDoc<'a> {
    window: &'a str,
    words: Vec<RankedWord>,
}

/// Writes `word_frequency-<id>.json`: `{"window": id, "words": [{word, count}]}`.
pub struct JsonListing {
    dir: PathBuf,
    assessment: Assessment,
}

impl JsonListing {
    pub fn new(dir: impl Into<PathBuf>, assessment: Assessment) -> Self {
        Self {
            dir: dir.into(),
            assessment,
        }
    }
}

impl WindowAssessor for JsonListing {
    fn assess(&self, window_id: &str, frequencies: &WordFrequencies) -> Result<()> {
        let doc = JsonDoc {
            window: window_id,
            words: self.assessment.rank(frequencies),
        };
        let json = serde_json::to_string_pretty(&doc)?;
        let path = artifact_path(&self.dir, window_id, "json");
        std::fs::write(&path, json).with_context(|| format!("write {}", path.display()))
    }
}

/// Hands each window to several assessors.
///
/// Continues with the remaining assessors even if one fails. Returns the
/// first error encountered, if any.
pub struct FanOutAssessor {
    assessors: Vec<Box<dyn WindowAssessor>>,
}

impl FanOutAssessor {
    pub fn new(assessors: Vec<Box<dyn WindowAssessor>>) -> Self {
        Self { assessors }
    }
}

impl WindowAssessor for FanOutAssessor {
    fn assess(&self, window_id: &str, frequencies: &WordFrequencies) -> Result<()> {
        let mut first_err: Option<anyhow::Error> = None;
        for assessor in &self.assessors {
            if let Err(e) = assessor.assess(window_id, frequencies) {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
