mod feed;
mod file;
mod lines;
mod live;

use async_trait::async_trait;
use tc_core::Record;
use tokio_util::sync::CancellationToken;

pub use feed::{FeedQuery, LiveFeed, Status, TcpFeed};
pub use file::FileSource;
pub use live::{LiveSettings, LiveSource};

/// Item of a push → pull bridge channel.
#[derive(Debug)]
pub enum SourceItem {
    Data(Record),
    /// Terminates the sequence; nothing follows it.
    Stop,
}

/// Pull-based record sequence with cooperative stop.
///
/// Every record returned by [`advance`](Source::advance) has already been
/// queued to the source's writer, and the writer is told to finish on the call
/// that ends the sequence. After `None`, further calls keep returning `None`.
#[async_trait]
pub trait Source: Send {
    async fn advance(&mut self) -> Option<Record>;

    /// Token whose cancellation stops the source at its next `advance()`.
    /// Cancelling more than once is the same as cancelling once.
    fn stop_token(&self) -> CancellationToken;

    fn stop(&self) {
        self.stop_token().cancel();
    }
}
