use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tc_config::CaptureConfig;
use tc_core::Record;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::feed::{FeedQuery, LiveFeed, Status};
use super::{Source, SourceItem};
use crate::writer::WriterHandle;

/// Live capture parameters, usually taken from `[capture]`.
#[derive(Debug, Clone)]
pub struct LiveSettings {
    pub query: FeedQuery,
    pub duration: Duration,
    pub keep_reply: bool,
    pub keep_retweet: bool,
    pub channel_capacity: usize,
}

impl From<&CaptureConfig> for LiveSettings {
    fn from(c: &CaptureConfig) -> Self {
        Self {
            query: FeedQuery {
                track: c.keywords.clone(),
                language: c.language.clone(),
            },
            duration: c.duration.as_duration(),
            keep_reply: c.keep_reply,
            keep_retweet: c.keep_retweet,
            channel_capacity: c.channel_capacity,
        }
    }
}

/// Bridges a push-style [`LiveFeed`] into the pull [`Source`] contract.
///
/// The subscription starts on the first `advance()`. A pump task forwards
/// accepted statuses through a bounded channel until stop is requested, the
/// deadline passes, or the feed ends; it then shuts the feed down and sends
/// [`SourceItem::Stop`].
pub struct LiveSource<F: LiveFeed> {
    feed: Option<F>,
    settings: LiveSettings,
    started_at: DateTime<Utc>,
    rx: Option<mpsc::Receiver<SourceItem>>,
    writer: WriterHandle,
    stop: CancellationToken,
    done: bool,
}

impl<F: LiveFeed> LiveSource<F> {
    pub fn new(feed: F, settings: LiveSettings, writer: WriterHandle) -> Self {
        Self {
            feed: Some(feed),
            settings,
            started_at: Utc::now(),
            rx: None,
            writer,
            stop: CancellationToken::new(),
            done: false,
        }
    }

    /// Wall-clock instant the capture began.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// `None` when `started_at + duration` is not representable.
    fn deadline(&self) -> Option<DateTime<Utc>> {
        TimeDelta::from_std(self.settings.duration)
            .ok()
            .and_then(|d| self.started_at.checked_add_signed(d))
    }

    fn start_pump(&self, feed: F) -> mpsc::Receiver<SourceItem> {
        let (tx, rx) = mpsc::channel(self.settings.channel_capacity);
        let pump = Pump {
            query: self.settings.query.clone(),
            keep_reply: self.settings.keep_reply,
            keep_retweet: self.settings.keep_retweet,
            deadline: self.deadline(),
            stop: self.stop.clone(),
            tx,
        };
        tokio::spawn(pump.run(feed));
        rx
    }

    async fn terminate(&mut self) -> Option<Record> {
        self.done = true;
        self.rx = None;
        self.writer.finish().await;
        None
    }
}

#[async_trait]
impl<F: LiveFeed> Source for LiveSource<F> {
    async fn advance(&mut self) -> Option<Record> {
        if self.done {
            return None;
        }
        if self.rx.is_none() {
            match self.feed.take() {
                Some(feed) if !self.stop.is_cancelled() => {
                    let rx = self.start_pump(feed);
                    self.rx = Some(rx);
                }
                _ => return self.terminate().await,
            }
        }
        let item = match self.rx.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        };
        match item {
            Some(SourceItem::Data(record)) => {
                self.writer.enqueue(record.clone()).await;
                Some(record)
            }
            Some(SourceItem::Stop) | None => self.terminate().await,
        }
    }

    fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }
}

struct Pump {
    query: FeedQuery,
    keep_reply: bool,
    keep_retweet: bool,
    deadline: Option<DateTime<Utc>>,
    stop: CancellationToken,
    tx: mpsc::Sender<SourceItem>,
}

impl Pump {
    fn accepts(&self, status: &Status) -> bool {
        (self.keep_reply || !status.is_reply()) && (self.keep_retweet || !status.retweet)
    }

    #[tracing::instrument(name = "live.pump", skip_all, fields(deadline = ?self.deadline))]
    async fn run<F: LiveFeed>(self, mut feed: F) {
        match feed.subscribe(&self.query).await {
            Ok(()) => {
                tc_info!(conn, track = ?self.query.track, language = %self.query.language, "live feed subscribed");
                self.forward(&mut feed).await;
            }
            Err(e) => tc_warn!(conn, error = %e, "live feed subscription failed"),
        }
        if let Err(e) = feed.shutdown().await {
            tc_warn!(conn, error = %e, "live feed shutdown failed");
        }
        // Receiver may already be gone; nothing left to unblock then.
        let _ = self.tx.send(SourceItem::Stop).await;
    }

    async fn forward<F: LiveFeed>(&self, feed: &mut F) {
        loop {
            let next = tokio::select! {
                _ = self.stop.cancelled() => {
                    tc_info!(pipe, "live capture stopped");
                    return;
                }
                next = feed.next_status() => next,
            };
            let status = match next {
                Ok(Some(status)) => status,
                Ok(None) => {
                    tc_info!(conn, "live feed ended");
                    return;
                }
                Err(e) => {
                    tc_warn!(conn, error = %e, "live feed error, ending capture");
                    return;
                }
            };
            if self.deadline.is_some_and(|d| status.created_at > d) {
                tc_info!(pipe, id = status.id, "capture deadline reached");
                self.stop.cancel();
                return;
            }
            if !self.accepts(&status) {
                tc_trace!(pipe, id = status.id, "status filtered out");
                continue;
            }
            if self.tx.send(SourceItem::Data(status.into_record())).await.is_err() {
                return;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
