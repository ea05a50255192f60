mod signal;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use orion_error::op_context;
use orion_error::compat_prelude::*;
use orion_error::prelude::*;
use tc_config::TwcloudConfig;
use tc_core::assess::{Assessment, FanOutAssessor, JsonListing, TextListing, WindowAssessor};
use tc_core::filter::{Filter, WordFilter};
use tc_core::window::WindowSpec;

use crate::capture::{Capture, StopHandle, resolve};
use crate::dispatch::{DispatchReport, dispatch};
use crate::error::RuntimeResult;
use crate::writer::WriterReport;

pub use signal::wait_for_signal;

/// Summary of one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Records pulled from the source (all of them reach the writer).
    pub pulled: u64,
    /// Records dropped by the baseline filter.
    pub discarded: u64,
    pub windows: usize,
    pub dispatch: DispatchReport,
    pub writer: WriterReport,
}

/// Capture → filter → window → dispatch, for one configuration.
///
/// Obtain a [`StopHandle`] before calling [`run`](Self::run) to stop a live
/// capture from another task.
pub struct Pipeline {
    config: TwcloudConfig,
    base_dir: PathBuf,
    stop: StopHandle,
}

impl Pipeline {
    /// `base_dir` resolves relative paths in `config` (usually the config
    /// file's directory).
    pub fn new(config: TwcloudConfig, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            base_dir: base_dir.into(),
            stop: StopHandle::new(),
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Run to completion: exhaust the source, assess every window, and join
    /// the writer.
    #[tracing::instrument(name = "pipeline.run", skip_all, fields(mode = %self.config.capture.mode))]
    pub async fn run(self) -> RuntimeResult<RunReport> {
        let config = &self.config;
        let started = Instant::now();

        let mut op = op_context!("pipeline-bootstrap").with_auto_log();
        op.record("mode", config.capture.mode.to_string().as_str());
        op.record("base_dir", self.base_dir.display().to_string().as_str());

        let filter = WordFilter::new(&config.filtering, &config.capture.keywords).err_conv()?;
        let output_dir = resolve(&self.base_dir, &config.assessment.output_dir);
        std::fs::create_dir_all(&output_dir)
            .owe_sys()
            .position(output_dir.display().to_string())?;
        let assessor = build_assessor(&self.config, output_dir);

        let mut capture =
            Capture::open(&config.capture, &config.storage, &self.base_dir, &self.stop).await?;
        let spec = WindowSpec::new(capture.anchor(), config.assessment.window.as_duration())
            .err_conv()?;
        op.mark_suc();

        let mut report = RunReport::default();
        let mut kept = Vec::new();
        while let Some(record) = capture.advance().await {
            report.pulled += 1;
            let record = filter.apply(record);
            if record.discarded {
                report.discarded += 1;
                continue;
            }
            kept.push(record);
        }
        tc_info!(
            pipe,
            pulled = report.pulled,
            discarded = report.discarded,
            "capture finished"
        );

        let windows = spec.group(kept).err_conv()?;
        report.windows = windows.len();
        report.dispatch = dispatch(windows, assessor).await;
        report.writer = capture.finish().await?;

        tc_info!(
            sys,
            elapsed_ms = started.elapsed().as_millis() as u64,
            windows = report.windows,
            committed = report.writer.committed,
            "pipeline finished"
        );
        Ok(report)
    }
}

fn build_assessor(config: &TwcloudConfig, output_dir: PathBuf) -> Arc<dyn WindowAssessor> {
    let assessment = Assessment::new(&config.assessment);
    Arc::new(FanOutAssessor::new(vec![
        Box::new(TextListing::new(output_dir.clone(), assessment)),
        Box::new(JsonListing::new(output_dir, assessment)),
    ]))
}
