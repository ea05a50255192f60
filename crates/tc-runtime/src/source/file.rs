use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orion_error::compat_prelude::*;
use orion_error::prelude::*;
use tc_core::Record;
use tc_core::record::RecordAssembler;
use tokio::fs::File;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

use super::Source;
use super::lines::PhysicalLines;
use crate::error::{RuntimeReason, RuntimeResult};
use crate::writer::WriterHandle;

/// Replays a tab-separated record file. Exhausts naturally at end of file.
pub struct FileSource {
    path: PathBuf,
    anchor: DateTime<Utc>,
    lines: PhysicalLines<BufReader<File>>,
    assembler: RecordAssembler,
    writer: WriterHandle,
    stop: CancellationToken,
    done: bool,
}

impl FileSource {
    /// Read the first record's timestamp as the anchor, then reopen the file
    /// for iteration. An empty or unparsable first record is an error.
    pub async fn open(path: impl AsRef<Path>, writer: WriterHandle) -> RuntimeResult<Self> {
        let path = path.as_ref();
        let anchor = read_anchor(path).await?;
        let file = File::open(path)
            .await
            .owe_sys()
            .position(path.display().to_string())?;
        tc_debug!(pipe, file = %path.display(), anchor = %anchor, "file source opened");
        Ok(Self {
            path: path.to_path_buf(),
            anchor,
            lines: PhysicalLines::new(BufReader::new(file)),
            assembler: RecordAssembler::new(),
            writer,
            stop: CancellationToken::new(),
            done: false,
        })
    }

    pub fn anchor(&self) -> DateTime<Utc> {
        self.anchor
    }

    /// Next record, or `None` at end of file. Read and parse errors are
    /// logged and end the sequence.
    async fn next_record(&mut self) -> Option<Record> {
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) => match self.assembler.push_line(&line) {
                    Some(Ok(record)) => return Some(record),
                    Some(Err(e)) => {
                        tc_warn!(pipe, file = %self.path.display(), error = %e, "malformed record, ending file source");
                        return None;
                    }
                    None => {}
                },
                Ok(None) => {
                    if let Some(e) = self.assembler.finish() {
                        tc_warn!(pipe, file = %self.path.display(), error = %e, "malformed record, ending file source");
                    }
                    return None;
                }
                Err(e) => {
                    tc_warn!(pipe, file = %self.path.display(), error = %e, "read error, ending file source");
                    return None;
                }
            }
        }
    }

    async fn terminate(&mut self) -> Option<Record> {
        self.done = true;
        self.writer.finish().await;
        None
    }
}

#[async_trait]
impl Source for FileSource {
    async fn advance(&mut self) -> Option<Record> {
        if self.done {
            return None;
        }
        if self.stop.is_cancelled() {
            tc_info!(pipe, file = %self.path.display(), "file source stopped");
            return self.terminate().await;
        }
        match self.next_record().await {
            Some(record) => {
                self.writer.enqueue(record.clone()).await;
                Some(record)
            }
            None => self.terminate().await,
        }
    }

    fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }
}

async fn read_anchor(path: &Path) -> RuntimeResult<DateTime<Utc>> {
    let file = File::open(path)
        .await
        .owe_sys()
        .position(path.display().to_string())?;
    let mut lines = PhysicalLines::new(BufReader::new(file));
    let mut assembler = RecordAssembler::new();
    let source_err = |detail: String| {
        StructError::from(RuntimeReason::Source)
            .with_detail(format!("{}: {detail}", path.display()))
    };

    while let Some(line) = lines
        .next_line()
        .await
        .owe_sys()
        .position(path.display().to_string())?
    {
        match assembler.push_line(&line) {
            Some(Ok(record)) => return Ok(record.timestamp),
            Some(Err(e)) => return Err(source_err(format!("first record: {e}"))),
            None => {}
        }
    }
    match assembler.finish() {
        Some(e) => Err(source_err(format!("first record: {e}"))),
        None => Err(source_err("record file is empty".to_string())),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
