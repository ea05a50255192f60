//! End-to-end pipeline tests.
//!
//! File mode: record file → FileSource → writer (SQLite) + filter → windows →
//! listings. Live mode: JSON-lines TCP feed → LiveSource → same tail.

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use tc_config::TwcloudConfig;
use tc_runtime::lifecycle::Pipeline;

fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

fn db_ids(path: &Path) -> Vec<i64> {
    let conn = Connection::open(path).unwrap();
    let mut stmt = conn
        .prepare("SELECT id FROM time_series ORDER BY id")
        .unwrap();
    stmt.query_map([], |r| r.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
}

const RECORDS: &str = "\
1\t\"Rust rust TOKIO, async!\"\t\"2020-03-01 10:00:00\"
2\t\"rust and tokio\nsecond line rust\"\t\"2020-03-01 10:00:30\"
3\t\"free giveaway rust\"\t\"2020-03-01 10:00:45\"
4\t\"tokio https://tokio.rs rocks\"\t\"2020-03-01 10:01:30\"
";

const FILE_CONFIG: &str = r#"
[capture]
mode = "file"
file = "tweets.txt"
keywords = ["async"]

[storage]
path = "data/tweets.db"
batch_threshold = 2

[filtering]
punctuation = [",", "!"]
stop_words = ["and"]
baseline = ["giveaway"]

[assessment]
window = "60s"
min_word_length = 3
frequency_threshold = 0
word_number = 5
output_dir = "out"
"#;

#[tokio::test]
async fn file_pipeline_end_to_end() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("data")).unwrap();
    std::fs::write(dir.path().join("tweets.txt"), RECORDS).unwrap();
    let config: TwcloudConfig = FILE_CONFIG.parse().unwrap();

    let report = Pipeline::new(config, dir.path()).run().await.unwrap();

    assert_eq!(report.pulled, 4);
    assert_eq!(report.discarded, 1);
    assert_eq!(report.windows, 2);
    assert_eq!(report.dispatch.succeeded, 2);
    assert_eq!(report.dispatch.failed, 0);
    assert_eq!(report.writer.committed, 4);

    // The writer sees every record, the discarded one included.
    assert_eq!(db_ids(&dir.path().join("data/tweets.db")), vec![1, 2, 3, 4]);

    let out = dir.path().join("out");
    let first = std::fs::read_to_string(out.join("word_frequency-100000.txt")).unwrap();
    assert_eq!(
        first,
        "rust = 4\ntokio = 2\nline = 1\nsecond = 1\n"
    );
    let second = std::fs::read_to_string(out.join("word_frequency-100100.txt")).unwrap();
    assert_eq!(second, "rocks = 1\ntokio = 1\n");

    let json: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(out.join("word_frequency-100000.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(json["window"], "100000");
    assert_eq!(json["words"][0]["word"], "rust");
}

#[tokio::test]
async fn file_pipeline_rejects_empty_record_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("data")).unwrap();
    std::fs::write(dir.path().join("tweets.txt"), "").unwrap();
    let config: TwcloudConfig = FILE_CONFIG.parse().unwrap();
    assert!(Pipeline::new(config, dir.path()).run().await.is_err());
}

#[tokio::test]
async fn live_pipeline_end_to_end() {
    init_test_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (r, mut w) = stream.into_split();
        let mut sub = String::new();
        BufReader::new(r).read_line(&mut sub).await.unwrap();
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let lines = format!(
            "{{\"id\":10,\"text\":\"hello rust\",\"created_at\":\"{now}\"}}\n\
             {{\"id\":11,\"text\":\"a reply\",\"created_at\":\"{now}\",\"in_reply_to_status_id\":10}}\n\
             {{\"id\":12,\"text\":\"hello again\",\"created_at\":\"{now}\"}}\n"
        );
        w.write_all(lines.as_bytes()).await.unwrap();
        sub
    });

    let dir = tempfile::tempdir().unwrap();
    let config: TwcloudConfig = format!(
        r#"
[capture]
mode = "live"
feed = "tcp://{addr}"
duration = "1h"
keywords = ["rust"]
language = "en"

[storage]
path = "live.db"

[assessment]
min_word_length = 0
frequency_threshold = 0
output_dir = "out"
"#
    )
    .parse()
    .unwrap();

    let report = Pipeline::new(config, dir.path()).run().await.unwrap();

    // The reply is dropped by the local criteria before it reaches the writer.
    assert_eq!(report.pulled, 2);
    assert_eq!(report.writer.committed, 2);
    assert!(report.windows >= 1);
    assert_eq!(report.dispatch.failed, 0);
    assert_eq!(db_ids(&dir.path().join("live.db")), vec![10, 12]);

    let sub: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
    assert_eq!(sub["track"][0], "rust");
}

#[tokio::test]
async fn stop_handle_ends_stalled_live_capture() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    // Accepts, then never sends anything.
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let (mut r, _w) = stream.into_split();
        let _ = tokio::io::AsyncReadExt::read_to_end(&mut r, &mut buf).await;
    });

    let dir = tempfile::tempdir().unwrap();
    let config: TwcloudConfig = format!(
        "[capture]\nmode = \"live\"\nfeed = \"tcp://{addr}\"\n\n[storage]\npath = \"live.db\"\n"
    )
    .parse()
    .unwrap();

    let pipeline = Pipeline::new(config, dir.path());
    let stop = pipeline.stop_handle();
    // Stopping before the source is attached is a no-op, so keep asking.
    let stopper = tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            stop.stop();
        }
    });

    let report = tokio::time::timeout(std::time::Duration::from_secs(5), pipeline.run())
        .await
        .expect("pipeline did not stop")
        .unwrap();
    assert_eq!(report.pulled, 0);
    assert_eq!(report.windows, 0);
    assert_eq!(report.writer.committed, 0);
    stopper.abort();
    server.abort();
}
