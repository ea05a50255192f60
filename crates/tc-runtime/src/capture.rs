use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use orion_error::compat_prelude::*;
use orion_error::prelude::*;
use tc_config::{CaptureConfig, SourceMode, StorageConfig};
use tc_core::Record;
use tokio_util::sync::CancellationToken;

use crate::error::{RuntimeReason, RuntimeResult};
use crate::source::{FileSource, LiveSettings, LiveSource, Source, TcpFeed};
use crate::storage::SqliteStore;
use crate::writer::{WriterReport, WriterTask, spawn_writer};

/// Cloneable stop request that forwards to whichever source is active.
///
/// Stopping before any source is attached does nothing, and a source attached
/// afterwards starts unstopped.
#[derive(Clone, Default)]
pub struct StopHandle {
    active: Arc<Mutex<Option<CancellationToken>>>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        match self.slot().as_ref() {
            Some(token) => token.cancel(),
            None => tc_debug!(pipe, "stop requested with no active source"),
        }
    }

    pub(crate) fn attach(&self, token: CancellationToken) {
        *self.slot() = Some(token);
    }

    fn detach(&self) {
        *self.slot() = None;
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One capture run: the selected source, its writer, and the window anchor.
pub struct Capture {
    source: Box<dyn Source>,
    anchor: DateTime<Utc>,
    writer: WriterTask,
    stop: StopHandle,
}

impl Capture {
    /// Open storage, start the writer, and construct the source selected by
    /// `capture.mode`. Relative paths resolve against `base_dir`.
    pub async fn open(
        capture: &CaptureConfig,
        storage: &StorageConfig,
        base_dir: &Path,
        stop: &StopHandle,
    ) -> RuntimeResult<Self> {
        let db_path = resolve(base_dir, &storage.path);
        let store = SqliteStore::open(&db_path, &storage.table)
            .owe(RuntimeReason::Storage)
            .position(db_path.display().to_string())?;
        let (writer, writer_task) =
            spawn_writer(store, storage.queue_capacity, storage.batch_threshold);

        let (source, anchor): (Box<dyn Source>, DateTime<Utc>) = match capture.mode {
            SourceMode::File => {
                let file = capture.file.as_deref().ok_or_else(|| {
                    StructError::from(RuntimeReason::Bootstrap)
                        .with_detail("capture.file is required in file mode")
                })?;
                let src = FileSource::open(resolve(base_dir, file), writer).await?;
                let anchor = src.anchor();
                (Box::new(src), anchor)
            }
            SourceMode::Live => {
                let addr = capture.feed_addr().ok_or_else(|| {
                    StructError::from(RuntimeReason::Bootstrap)
                        .with_detail("capture.feed is required in live mode")
                })?;
                let src = LiveSource::new(TcpFeed::new(addr), LiveSettings::from(capture), writer);
                let anchor = src.started_at();
                (Box::new(src), anchor)
            }
        };

        stop.attach(source.stop_token());
        tc_info!(pipe, mode = %capture.mode, anchor = %anchor, "capture opened");
        Ok(Self {
            source,
            anchor,
            writer: writer_task,
            stop: stop.clone(),
        })
    }

    pub fn anchor(&self) -> DateTime<Utc> {
        self.anchor
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub async fn advance(&mut self) -> Option<Record> {
        self.source.advance().await
    }

    /// Release the source and wait for its writer to drain and close.
    pub async fn finish(self) -> RuntimeResult<WriterReport> {
        self.stop.detach();
        // Ends a live pump that may still be running; no effect once exhausted.
        self.source.stop();
        drop(self.source);
        self.writer.join().await
    }
}

pub(crate) fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        base_dir.join(path)
    } else {
        path.to_path_buf()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tc_config::TwcloudConfig;

    fn config(dir: &Path) -> TwcloudConfig {
        std::fs::write(
            dir.join("tweets.txt"),
            "1\t\"a\"\t\"2020-03-01 10:00:00\"\n2\t\"b\"\t\"2020-03-01 10:00:10\"\n",
        )
        .unwrap();
        r#"
[capture]
mode = "file"
file = "tweets.txt"

[storage]
path = "tweets.db"
"#
        .parse()
        .unwrap()
    }

    #[test]
    fn stop_without_source_is_noop() {
        let stop = StopHandle::new();
        stop.stop();
        stop.stop();
        let token = CancellationToken::new();
        stop.attach(token.clone());
        assert!(!token.is_cancelled());
        stop.stop();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn file_capture_uses_first_timestamp_as_anchor() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let stop = StopHandle::new();
        let mut capture = Capture::open(&cfg.capture, &cfg.storage, dir.path(), &stop)
            .await
            .unwrap();
        assert_eq!(
            capture.anchor(),
            Utc.with_ymd_and_hms(2020, 3, 1, 10, 0, 0).unwrap()
        );
        let mut n = 0;
        while capture.advance().await.is_some() {
            n += 1;
        }
        assert_eq!(n, 2);
        let report = capture.finish().await.unwrap();
        assert_eq!(report.committed, 2);
        assert!(dir.path().join("tweets.db").exists());
    }

    #[tokio::test]
    async fn stop_handle_reaches_open_source() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let stop = StopHandle::new();
        let mut capture = Capture::open(&cfg.capture, &cfg.storage, dir.path(), &stop)
            .await
            .unwrap();
        assert!(capture.advance().await.is_some());
        stop.stop();
        assert!(capture.advance().await.is_none());
        assert_eq!(capture.finish().await.unwrap().committed, 1);
    }

    #[tokio::test]
    async fn stop_after_early_stop_reaches_source() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let stop = StopHandle::new();
        stop.stop();
        let mut capture = Capture::open(&cfg.capture, &cfg.storage, dir.path(), &stop)
            .await
            .unwrap();
        assert!(capture.advance().await.is_some(), "source opened pre-stopped");
        stop.stop();
        assert!(capture.advance().await.is_none());
        assert_eq!(capture.finish().await.unwrap().committed, 1);
    }

    #[tokio::test]
    async fn early_finish_still_joins_writer() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let mut capture = Capture::open(&cfg.capture, &cfg.storage, dir.path(), &StopHandle::new())
            .await
            .unwrap();
        assert!(capture.advance().await.is_some());
        let report = capture.finish().await.unwrap();
        assert_eq!(report.committed, 1);
    }

    #[tokio::test]
    async fn missing_record_file_is_bootstrap_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        std::fs::remove_file(dir.path().join("tweets.txt")).unwrap();
        let res = Capture::open(&cfg.capture, &cfg.storage, dir.path(), &StopHandle::new()).await;
        assert!(res.is_err());
    }
}
