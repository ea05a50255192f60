use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};

/// Timestamp layout of the record text file (`yyyy-MM-dd HH:mm:ss`, UTC).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One captured post.
///
/// `text` is rewritten by the filter; the writer always receives a clone taken
/// before that happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: i64,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub discarded: bool,
}

impl Record {
    pub fn new(id: i64, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            text: text.into(),
            timestamp,
            discarded: false,
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}",
            self.id,
            self.text,
            self.timestamp.to_rfc3339()
        )?;
        if self.discarded {
            f.write_str(" - discarded")?;
        }
        Ok(())
    }
}

/// Parse a `yyyy-MM-dd HH:mm:ss` timestamp as UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).map(|naive| naive.and_utc())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordParseError {
    #[error("line {line}: invalid id {value:?}")]
    InvalidId { line: usize, value: String },
    #[error("line {line}: invalid timestamp {value:?}")]
    InvalidTimestamp { line: usize, value: String },
    #[error("line {line}: missing text field")]
    MissingText { line: usize },
    #[error("line {line}: too many fields")]
    TooManyFields { line: usize },
    #[error("line {line}: record truncated at end of input")]
    Truncated { line: usize },
}

// ---------------------------------------------------------------------------
// RecordAssembler
// ---------------------------------------------------------------------------

/// Incremental parser for the tab-separated record file.
///
/// Lines are fed one at a time; a record is emitted once the line carrying its
/// timestamp has been seen. Text may continue across physical lines as long
/// as it contains no tab.
#[derive(Debug, Default)]
pub struct RecordAssembler {
    line_no: usize,
    pending: Option<Partial>,
}

#[derive(Debug)]
struct Partial {
    id: i64,
    text: String,
    start_line: usize,
}

impl RecordAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one physical line (with or without its line terminator).
    pub fn push_line(&mut self, raw: &str) -> Option<Result<Record, RecordParseError>> {
        self.line_no += 1;
        let line_no = self.line_no;
        let line = raw.trim_end_matches(['\n', '\r']);

        let Some(mut partial) = self.pending.take() else {
            return self.start_record(line);
        };

        let Some((head, tail)) = line.split_once('\t') else {
            partial.text.push('\n');
            partial.text.push_str(line);
            self.pending = Some(partial);
            return None;
        };

        let rest = split_fields(tail);
        let [ts] = rest.as_slice() else {
            return Some(Err(RecordParseError::TooManyFields { line: line_no }));
        };
        if !head.is_empty() {
            partial.text.push('\n');
            partial.text.push_str(head);
        }
        Some(build(partial.id, &partial.text, ts, line_no))
    }

    /// Signal end of input. A record still waiting for its timestamp is an
    /// error.
    pub fn finish(&mut self) -> Option<RecordParseError> {
        self.pending
            .take()
            .map(|p| RecordParseError::Truncated { line: p.start_line })
    }

    fn start_record(&mut self, line: &str) -> Option<Result<Record, RecordParseError>> {
        let line_no = self.line_no;
        if line.trim().is_empty() {
            return None;
        }
        match split_fields(line).as_slice() {
            [id, text, ts] => {
                let id = match parse_id(id, line_no) {
                    Ok(id) => id,
                    Err(e) => return Some(Err(e)),
                };
                Some(build(id, text, ts, line_no))
            }
            [id, text] => match parse_id(id, line_no) {
                Ok(id) => {
                    self.pending = Some(Partial {
                        id,
                        text: (*text).to_string(),
                        start_line: line_no,
                    });
                    None
                }
                Err(e) => Some(Err(e)),
            },
            [_] => Some(Err(RecordParseError::MissingText { line: line_no })),
            _ => Some(Err(RecordParseError::TooManyFields { line: line_no })),
        }
    }
}

/// Runs of tabs separate fields.
fn split_fields(line: &str) -> Vec<&str> {
    line.split('\t').filter(|f| !f.is_empty()).collect()
}

fn parse_id(s: &str, line: usize) -> Result<i64, RecordParseError> {
    s.trim().parse().map_err(|_| RecordParseError::InvalidId {
        line,
        value: s.to_string(),
    })
}

fn strip_quotes(s: &str) -> &str {
    let s = s.strip_prefix('"').unwrap_or(s);
    s.strip_suffix('"').unwrap_or(s)
}

fn build(id: i64, text: &str, ts: &str, line: usize) -> Result<Record, RecordParseError> {
    let ts_str = strip_quotes(ts.trim());
    let timestamp = parse_timestamp(ts_str).map_err(|_| RecordParseError::InvalidTimestamp {
        line,
        value: ts_str.to_string(),
    })?;
    Ok(Record::new(
        id,
        strip_quotes(text).to_lowercase(),
        timestamp,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
