use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use orion_error::prelude::*;
use tc_core::Record;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{RuntimeReason, RuntimeResult};
use crate::storage::{RecordStore, StorageError};

/// Upper bound on the batch buffer reserved up front.
const MAX_PREALLOC: usize = 1024;

/// Entry of the source → writer queue.
#[derive(Debug)]
pub enum WriterMessage {
    Data(Record),
    Finish,
}

/// Totals reported when the writer worker exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterReport {
    /// Records persisted.
    pub committed: u64,
    /// Records lost in failed batches.
    pub failed: u64,
    /// Records refused because of a reserved (negative) id.
    pub skipped: u64,
    /// Successful commits.
    pub batches: u64,
}

/// Producer side of a batched writer. Cheap to clone.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<WriterMessage>,
    finished: Arc<AtomicBool>,
}

impl WriterHandle {
    /// Queue a record for persistence. Waits only while the queue is full.
    pub async fn enqueue(&self, record: Record) {
        if self.tx.send(WriterMessage::Data(record)).await.is_err() {
            tc_warn!(res, "writer is gone, record not persisted");
        }
    }

    /// Ask the worker to drain and exit. Only the first call has an effect.
    pub async fn finish(&self) {
        if self.finished.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.tx.send(WriterMessage::Finish).await.is_err() {
            tc_debug!(res, "writer already exited before finish");
        }
    }
}

/// Join side of a batched writer.
pub struct WriterTask {
    handle: JoinHandle<WriterReport>,
}

impl WriterTask {
    /// Wait for the worker to flush, close the store, and exit.
    pub async fn join(self) -> RuntimeResult<WriterReport> {
        self.handle.await.map_err(|e| {
            StructError::from(RuntimeReason::Shutdown)
                .with_detail(format!("writer join error: {e}"))
        })
    }
}

/// Start a writer worker on the blocking pool. The worker owns `store` for
/// its whole lifetime.
pub fn spawn_writer<S>(
    store: S,
    queue_capacity: usize,
    batch_threshold: usize,
) -> (WriterHandle, WriterTask)
where
    S: RecordStore + 'static,
{
    let (tx, rx) = mpsc::channel(queue_capacity);
    let handle = tokio::task::spawn_blocking(move || run_writer(rx, store, batch_threshold));
    (
        WriterHandle {
            tx,
            finished: Arc::new(AtomicBool::new(false)),
        },
        WriterTask { handle },
    )
}

/// Writer loop. Blocks the calling thread.
///
/// A batch is committed when it reaches `batch_threshold` records or the queue
/// runs empty. The loop ends once `Finish` was seen and the queue is drained,
/// or when every sender is gone; the store is then flushed and closed.
pub fn run_writer<S: RecordStore>(
    mut rx: mpsc::Receiver<WriterMessage>,
    mut store: S,
    batch_threshold: usize,
) -> WriterReport {
    let mut report = WriterReport::default();
    let mut pending: Vec<Record> = Vec::with_capacity(batch_threshold.min(MAX_PREALLOC));
    let mut finishing = false;

    loop {
        let msg = if finishing {
            rx.try_recv().ok()
        } else {
            rx.blocking_recv()
        };
        match msg {
            Some(WriterMessage::Data(record)) if record.id < 0 => {
                tc_warn!(res, id = record.id, "reserved record id, not persisted");
                report.skipped += 1;
            }
            Some(WriterMessage::Data(record)) => pending.push(record),
            Some(WriterMessage::Finish) => finishing = true,
            None => break,
        }
        if pending.len() >= batch_threshold || rx.is_empty() {
            flush(&mut store, &mut pending, &mut report);
        }
    }

    flush(&mut store, &mut pending, &mut report);
    if let Err(e) = store.close() {
        tc_error!(res, error = %e, "closing store failed");
    }
    tc_info!(
        res,
        committed = report.committed,
        failed = report.failed,
        skipped = report.skipped,
        batches = report.batches,
        "writer finished"
    );
    report
}

fn flush<S: RecordStore>(store: &mut S, pending: &mut Vec<Record>, report: &mut WriterReport) {
    if pending.is_empty() {
        return;
    }
    let n = pending.len() as u64;
    match store.insert_batch(pending) {
        Ok(()) => {
            report.committed += n;
            report.batches += 1;
            tc_debug!(res, records = n, "batch committed");
        }
        Err(StorageError::Insert { index, source, .. }) => {
            report.failed += n;
            let record = pending.get(index).map(ToString::to_string).unwrap_or_default();
            tc_error!(res, error = %source, record = %record, batch = n, "batch commit failed");
        }
        Err(e) => {
            report.failed += n;
            tc_error!(res, error = %e, batch = n, "batch commit failed");
        }
    }
    pending.clear();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    #[derive(Clone, Default)]
    struct MemStore {
        batches: Arc<Mutex<Vec<Vec<i64>>>>,
        closes: Arc<AtomicUsize>,
        fail_on: Option<i64>,
    }

    impl MemStore {
        fn batch_sizes(&self) -> Vec<usize> {
            self.batches.lock().unwrap().iter().map(Vec::len).collect()
        }
        fn ids(&self) -> Vec<i64> {
            self.batches.lock().unwrap().concat()
        }
    }

    impl RecordStore for MemStore {
        fn insert_batch(&mut self, batch: &[Record]) -> Result<(), StorageError> {
            if let Some(bad) = self.fail_on {
                if let Some(index) = batch.iter().position(|r| r.id == bad) {
                    return Err(StorageError::Insert {
                        index,
                        id: bad,
                        source: rusqlite::Error::InvalidQuery,
                    });
                }
            }
            self.batches
                .lock()
                .unwrap()
                .push(batch.iter().map(|r| r.id).collect());
            Ok(())
        }

        fn close(self) -> Result<(), StorageError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn record(id: i64) -> Record {
        Record::new(id, "text", Utc.with_ymd_and_hms(2020, 3, 1, 10, 0, 0).unwrap())
    }

    #[test]
    fn queued_backlog_commits_threshold_then_remainder() {
        let store = MemStore::default();
        let (tx, rx) = mpsc::channel(300);
        for id in 0..250 {
            tx.try_send(WriterMessage::Data(record(id))).unwrap();
        }
        tx.try_send(WriterMessage::Finish).unwrap();

        let report = run_writer(rx, store.clone(), 200);

        assert_eq!(store.batch_sizes(), vec![200, 50]);
        assert_eq!(store.ids(), (0..250).collect::<Vec<_>>());
        assert_eq!(report.committed, 250);
        assert_eq!(report.batches, 2);
        assert_eq!(store.closes.load(Ordering::SeqCst), 1);
        drop(tx);
    }

    #[test]
    fn negative_ids_never_persisted() {
        let store = MemStore::default();
        let (tx, rx) = mpsc::channel(8);
        tx.try_send(WriterMessage::Data(record(1))).unwrap();
        tx.try_send(WriterMessage::Data(record(-1))).unwrap();
        tx.try_send(WriterMessage::Data(record(2))).unwrap();
        drop(tx);

        let report = run_writer(rx, store.clone(), 200);
        assert_eq!(store.ids(), vec![1, 2]);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn failed_batch_is_dropped_and_counted() {
        let store = MemStore {
            fail_on: Some(3),
            ..Default::default()
        };
        let (tx, rx) = mpsc::channel(16);
        for id in 1..=4 {
            tx.try_send(WriterMessage::Data(record(id))).unwrap();
        }
        tx.try_send(WriterMessage::Finish).unwrap();
        let report = run_writer(rx, store.clone(), 2);

        // [1,2] commits, [3,4] fails as a whole.
        assert_eq!(store.ids(), vec![1, 2]);
        assert_eq!(report.committed, 2);
        assert_eq!(report.failed, 2);
        drop(tx);
    }

    #[test]
    fn huge_threshold_does_not_preallocate_it() {
        let store = MemStore::default();
        let (tx, rx) = mpsc::channel(4);
        tx.try_send(WriterMessage::Data(record(1))).unwrap();
        tx.try_send(WriterMessage::Finish).unwrap();
        let report = run_writer(rx, store.clone(), usize::MAX);
        assert_eq!(report.committed, 1);
        assert_eq!(store.ids(), vec![1]);
        drop(tx);
    }

    #[test]
    fn exits_when_senders_drop_without_finish() {
        let store = MemStore::default();
        let (tx, rx) = mpsc::channel::<WriterMessage>(4);
        drop(tx);
        let report = run_writer(rx, store.clone(), 10);
        assert_eq!(report, WriterReport::default());
        assert_eq!(store.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn idle_queue_flushes_pending_records() {
        let store = MemStore::default();
        let (writer, task) = spawn_writer(store.clone(), 16, 200);
        for id in 0..3 {
            writer.enqueue(record(id)).await;
        }

        let mut waited = Duration::ZERO;
        while store.ids().len() < 3 && waited < Duration::from_secs(5) {
            tokio::time::sleep(Duration::from_millis(10)).await;
            waited += Duration::from_millis(10);
        }
        assert_eq!(store.ids(), vec![0, 1, 2], "flushed before finish");

        writer.enqueue(record(3)).await;
        writer.finish().await;
        writer.finish().await;
        let report = task.join().await.unwrap();
        assert_eq!(report.committed, 4);
        assert_eq!(store.ids(), vec![0, 1, 2, 3]);
        assert_eq!(store.closes.load(Ordering::SeqCst), 1);
    }
}
