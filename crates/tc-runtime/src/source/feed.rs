use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tc_core::Record;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

/// Longest status line accepted from a feed, terminator excluded.
const MAX_LINE: usize = 64 * 1024;

/// Server-side filter sent when subscribing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedQuery {
    pub track: Vec<String>,
    pub language: String,
}

/// One status as pushed by the feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Status {
    pub id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub in_reply_to_status_id: Option<i64>,
    #[serde(default)]
    pub retweet: bool,
}

impl Status {
    pub fn is_reply(&self) -> bool {
        matches!(self.in_reply_to_status_id, Some(id) if id > 0)
    }

    pub fn into_record(self) -> Record {
        Record::new(self.id, self.text, self.created_at)
    }
}

/// Push-style status feed.
#[async_trait]
pub trait LiveFeed: Send + 'static {
    async fn subscribe(&mut self, query: &FeedQuery) -> anyhow::Result<()>;

    /// Next status, or `None` once the feed has ended.
    async fn next_status(&mut self) -> anyhow::Result<Option<Status>>;

    /// Unsubscribe and release the connection.
    async fn shutdown(&mut self) -> anyhow::Result<()>;
}

/// JSON-lines feed over TCP.
///
/// After connecting, the client sends one line `{"track":[..],"language":".."}`
/// and then reads one JSON [`Status`] per line until the server closes. A line
/// longer than 64 KiB is an error.
pub struct TcpFeed {
    addr: String,
    reader: Option<BufReader<OwnedReadHalf>>,
    writer: Option<OwnedWriteHalf>,
    line: String,
}

impl TcpFeed {
    /// `addr` is `host:port` (no scheme).
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            reader: None,
            writer: None,
            line: String::new(),
        }
    }
}

#[async_trait]
impl LiveFeed for TcpFeed {
    async fn subscribe(&mut self, query: &FeedQuery) -> anyhow::Result<()> {
        let stream = TcpStream::connect(&self.addr).await?;
        tc_debug!(conn, addr = %self.addr, "feed connected");
        let (read_half, mut write_half) = stream.into_split();
        let mut payload = serde_json::to_vec(query)?;
        payload.push(b'\n');
        write_half.write_all(&payload).await?;
        write_half.flush().await?;
        self.reader = Some(BufReader::new(read_half));
        self.writer = Some(write_half);
        Ok(())
    }

    async fn next_status(&mut self) -> anyhow::Result<Option<Status>> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("feed not subscribed"))?;
        loop {
            self.line.clear();
            let read = (&mut *reader)
                .take(MAX_LINE as u64 + 1)
                .read_line(&mut self.line)
                .await?;
            if read == 0 {
                return Ok(None);
            }
            if read > MAX_LINE && !self.line.ends_with('\n') {
                anyhow::bail!("feed line exceeds {MAX_LINE} bytes");
            }
            let line = self.line.trim();
            if line.is_empty() {
                continue;
            }
            return Ok(Some(serde_json::from_str(line)?));
        }
    }

    async fn shutdown(&mut self) -> anyhow::Result<()> {
        self.reader = None;
        if let Some(mut writer) = self.writer.take() {
            writer.shutdown().await?;
            tc_debug!(conn, addr = %self.addr, "feed closed");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn status_parses_rfc3339_and_defaults() {
        let s: Status = serde_json::from_str(
            r#"{"id":5,"text":"hi","created_at":"2020-03-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(s.id, 5);
        assert!(!s.is_reply());
        assert!(!s.retweet);
        assert_eq!(s.into_record().timestamp.to_rfc3339(), "2020-03-01T10:00:00+00:00");
    }

    #[test]
    fn reply_detection_ignores_placeholder_ids() {
        let mut s: Status = serde_json::from_str(
            r#"{"id":5,"text":"hi","created_at":"2020-03-01T10:00:00Z","in_reply_to_status_id":-1}"#,
        )
        .unwrap();
        assert!(!s.is_reply());
        s.in_reply_to_status_id = Some(42);
        assert!(s.is_reply());
    }

    #[tokio::test]
    async fn tcp_feed_subscribes_and_streams_statuses() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (r, mut w) = stream.into_split();
            let mut r = BufReader::new(r);
            let mut sub = String::new();
            r.read_line(&mut sub).await.unwrap();
            w.write_all(
                b"{\"id\":1,\"text\":\"one\",\"created_at\":\"2020-03-01T10:00:00Z\"}\n\n\
                  {\"id\":2,\"text\":\"two\",\"created_at\":\"2020-03-01T10:00:05Z\",\"retweet\":true}\n",
            )
            .await
            .unwrap();
            sub
        });

        let mut feed = TcpFeed::new(addr.to_string());
        feed.subscribe(&FeedQuery {
            track: vec!["rust".into()],
            language: "en".into(),
        })
        .await
        .unwrap();

        let first = feed.next_status().await.unwrap().unwrap();
        assert_eq!(first.id, 1);
        let second = feed.next_status().await.unwrap().unwrap();
        assert!(second.retweet);
        assert!(feed.next_status().await.unwrap().is_none());
        feed.shutdown().await.unwrap();

        let sub: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(sub["track"][0], "rust");
        assert_eq!(sub["language"], "en");
    }

    #[tokio::test]
    async fn over_long_line_is_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (r, mut w) = stream.into_split();
            let mut sub = String::new();
            BufReader::new(r).read_line(&mut sub).await.unwrap();
            let exact = format!(
                "{{\"id\":1,\"text\":\"{}\",\"created_at\":\"2020-03-01T10:00:00Z\"}}\n",
                "x".repeat(100)
            );
            w.write_all(exact.as_bytes()).await.unwrap();
            // Never terminated; the client must give up at the limit.
            let _ = w.write_all(&vec![b'y'; MAX_LINE * 2]).await;
        });

        let mut feed = TcpFeed::new(addr.to_string());
        feed.subscribe(&FeedQuery {
            track: vec![],
            language: "en".into(),
        })
        .await
        .unwrap();

        assert_eq!(feed.next_status().await.unwrap().unwrap().id, 1);
        let err = feed.next_status().await.unwrap_err();
        assert!(err.to_string().contains("exceeds"), "{err}");
        feed.shutdown().await.unwrap();
        server.abort();
    }

    #[tokio::test]
    async fn next_status_before_subscribe_fails() {
        let mut feed = TcpFeed::new("127.0.0.1:1");
        assert!(feed.next_status().await.is_err());
    }
}
