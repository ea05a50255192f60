use orion_error::ErrorOweBase;
use regex::Regex;
use tc_config::FilteringConfig;

use crate::error::{CoreReason, CoreResult};
use crate::record::Record;

const LINK_PATTERN: &str =
    r"\b(https?|ftp|file)://[-a-zA-Z0-9+&@#/%?=~_|!:,.;]*[-a-zA-Z0-9+&@#/%=~_|]";

/// Text transformation applied to each record between capture and windowing.
pub trait Filter: Send + Sync {
    fn apply(&self, record: Record) -> Record;
}

/// Removes links, punctuation and configured word lists from record text.
/// Punctuation separates words, so `a,b` becomes `a b`.
///
/// A record containing a baseline word is marked discarded.
#[derive(Debug)]
pub struct WordFilter {
    link: Regex,
    punctuation: Option<Regex>,
    baseline: Option<Regex>,
    words: Option<Regex>,
}

impl WordFilter {
    /// `keywords` are the capture track keywords, removed like stop words.
    pub fn new(config: &FilteringConfig, keywords: &[String]) -> CoreResult<Self> {
        let link = Regex::new(LINK_PATTERN).owe(CoreReason::FilterBuild)?;
        let punctuation = alternation(&config.punctuation)
            .map(|alt| Regex::new(&alt))
            .transpose()
            .owe(CoreReason::FilterBuild)?;
        let baseline = whole_words(config.baseline.iter())?;
        let words = whole_words(
            config
                .stop_words
                .iter()
                .chain(&config.bad_words)
                .chain(keywords),
        )?;
        Ok(Self {
            link,
            punctuation,
            baseline,
            words,
        })
    }
}

impl Filter for WordFilter {
    fn apply(&self, mut record: Record) -> Record {
        let mut text = self.link.replace_all(&record.text, " ").into_owned();
        if let Some(re) = &self.punctuation {
            text = re.replace_all(&text, " ").into_owned();
        }
        if let Some(re) = &self.baseline {
            if re.is_match(&text) {
                log::debug!("record {} matches baseline, discarded", record.id);
                record.discarded = true;
                text = re.replace_all(&text, " ").into_owned();
            }
        }
        if let Some(re) = &self.words {
            text = re.replace_all(&text, " ").into_owned();
        }
        record.text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        record
    }
}

/// Escaped `a|b|c` over the non-blank entries, or `None` when there are none.
fn alternation<'a>(items: impl IntoIterator<Item = &'a String>) -> Option<String> {
    let escaped: Vec<String> = items
        .into_iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(regex::escape)
        .collect();
    if escaped.is_empty() {
        None
    } else {
        Some(escaped.join("|"))
    }
}

fn whole_words<'a>(items: impl IntoIterator<Item = &'a String>) -> CoreResult<Option<Regex>> {
    alternation(items)
        .map(|alt| Regex::new(&format!(r"(?i)\b(?:{alt})\b")))
        .transpose()
        .owe(CoreReason::FilterBuild)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(text: &str) -> Record {
        Record::new(1, text, Utc.with_ymd_and_hms(2020, 3, 1, 10, 0, 0).unwrap())
    }

    fn strs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_config_only_collapses_whitespace() {
        let f = WordFilter::new(&FilteringConfig::default(), &[]).unwrap();
        let out = f.apply(record("  hello \n  world\t "));
        assert_eq!(out.text, "hello world");
        assert!(!out.discarded);
    }

    #[test]
    fn punctuation_becomes_word_separator() {
        let cfg = FilteringConfig {
            punctuation: strs(&[".", ",", "'"]),
            ..Default::default()
        };
        let f = WordFilter::new(&cfg, &[]).unwrap();
        assert_eq!(f.apply(record("don't stop, ok.")).text, "don t stop ok");
        assert_eq!(
            f.apply(record("rust,tokio end.start")).text,
            "rust tokio end start"
        );
        assert_eq!(f.apply(record("a,b")).text.split_whitespace().count(), 2);
    }

    #[test]
    fn links_removed() {
        let f = WordFilter::new(&FilteringConfig::default(), &[]).unwrap();
        let out = f.apply(record("see https://example.com/a?b=c now and ftp://x.org"));
        assert_eq!(out.text, "see now and");
    }

    #[test]
    fn stop_words_match_whole_words_only() {
        let cfg = FilteringConfig {
            stop_words: strs(&["the"]),
            ..Default::default()
        };
        let f = WordFilter::new(&cfg, &[]).unwrap();
        assert_eq!(f.apply(record("the theory of THE thing")).text, "theory of thing");
    }

    #[test]
    fn keywords_and_bad_words_removed() {
        let cfg = FilteringConfig {
            bad_words: strs(&["darn"]),
            ..Default::default()
        };
        let f = WordFilter::new(&cfg, &strs(&["rust"])).unwrap();
        assert_eq!(f.apply(record("Rust is darn fast")).text, "is fast");
    }

    #[test]
    fn baseline_discards_record() {
        let cfg = FilteringConfig {
            baseline: strs(&["giveaway"]),
            ..Default::default()
        };
        let f = WordFilter::new(&cfg, &[]).unwrap();
        let out = f.apply(record("huge giveaway today"));
        assert!(out.discarded);
        assert_eq!(out.text, "huge today");

        let kept = f.apply(record("giveaways are different"));
        assert!(!kept.discarded);
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let cfg = FilteringConfig {
            punctuation: strs(&["(", ")", "*", ""]),
            ..Default::default()
        };
        let f = WordFilter::new(&cfg, &[]).unwrap();
        assert_eq!(f.apply(record("(a*b)")).text, "a b");
    }
}
