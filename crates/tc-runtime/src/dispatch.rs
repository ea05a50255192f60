use std::sync::Arc;

use tc_core::assess::{WindowAssessor, word_frequencies};
use tc_core::window::Window;

/// Outcome of one dispatch round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub windows: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Assess every window on its own blocking worker and wait for all of them.
///
/// A worker that fails or panics is logged and counted; it never aborts its
/// siblings or the join.
#[tracing::instrument(name = "dispatch", skip_all, fields(windows = windows.len()))]
pub async fn dispatch(windows: Vec<Window>, assessor: Arc<dyn WindowAssessor>) -> DispatchReport {
    let mut workers = Vec::with_capacity(windows.len());
    for window in windows {
        let id = window.id();
        tc_debug!(pipe, window = %id, records = window.records.len(), "window dispatched");
        let assessor = Arc::clone(&assessor);
        let worker_id = id.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let freqs = word_frequencies(window.records.iter().map(|r| r.text.as_str()));
            assessor.assess(&worker_id, &freqs)
        });
        workers.push((id, handle));
    }

    let mut report = DispatchReport {
        windows: workers.len(),
        ..DispatchReport::default()
    };
    for (id, handle) in workers {
        match handle.await {
            Ok(Ok(())) => report.succeeded += 1,
            Ok(Err(e)) => {
                tc_warn!(pipe, window = %id, error = %e, "window assessment failed");
                report.failed += 1;
            }
            Err(e) => {
                tc_error!(pipe, window = %id, error = %e, "window worker panicked");
                report.failed += 1;
            }
        }
    }
    tc_info!(
        pipe,
        windows = report.windows,
        succeeded = report.succeeded,
        failed = report.failed,
        "dispatch complete"
    );
    report
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
