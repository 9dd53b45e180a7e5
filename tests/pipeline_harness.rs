//! End-to-end pipeline tests: mock feed server → poller → router → file sinks.
//!
//! Each test spins up its own wiremock server and tempdir, builds a config
//! programmatically, runs the real pipeline for a few poll ticks, shuts it
//! down, and asserts on the bytes that reached the sink files. Email
//! delivery is covered by unit tests against a recording transport; here
//! every sink is a file so no network beyond the mock feed is involved.

use feedrelay::config::{Config, FeedConfig, PipelineConfig, SinkConfig};
use feedrelay::pipeline::Pipeline;
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

const FEED_BODY: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Blog</title>
    <item>
        <guid>r-1</guid>
        <title>Spring Boot 3.2</title>
        <link>http://x</link>
        <category>releases</category>
    </item>
    <item>
        <guid>e-1</guid>
        <title>Structured logging</title>
        <link>http://y</link>
        <category>engineering</category>
    </item>
    <item>
        <guid>n-1</guid>
        <title>Conference recap</title>
        <link>http://z</link>
        <category>news</category>
    </item>
    <item>
        <guid>v-1</guid>
        <title>Unrouted video</title>
        <link>http://v</link>
        <category>videos</category>
    </item>
</channel></rss>"#;

async fn mock_feed(body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("Content-Type", "application/xml"),
        )
        .mount(&server)
        .await;
    server
}

/// Config with file sinks for releases/engineering/news under `dir`.
fn file_sink_config(feed_url: String, dir: &Path) -> Config {
    let mut routes = BTreeMap::new();
    let mut sinks = BTreeMap::new();
    for name in ["releases", "engineering", "news"] {
        routes.insert(name.to_string(), name.to_string());
        sinks.insert(
            name.to_string(),
            SinkConfig::File {
                path: dir.join(format!("{}.txt", name)),
            },
        );
    }

    Config {
        feed: FeedConfig {
            url: feed_url,
            poll_interval_ms: 25,
        },
        pipeline: PipelineConfig {
            channel_capacity: 10,
        },
        routes,
        sinks,
    }
}

/// Wait until `path` exists and is non-empty, or panic after 5 seconds.
async fn wait_for_output(path: &PathBuf) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false) {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "Timed out waiting for output at {}",
            path.display()
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn read(path: &PathBuf) -> String {
    std::fs::read_to_string(path).unwrap_or_default()
}

// ============================================================================
// Routing and delivery
// ============================================================================

#[tokio::test]
async fn entries_reach_exactly_their_category_sink() {
    let server = mock_feed(FEED_BODY).await;
    let dir = tempfile::tempdir().unwrap();
    let config = file_sink_config(format!("{}/feed", server.uri()), dir.path());

    let pipeline = Pipeline::start(config).unwrap();
    for name in ["releases", "engineering", "news"] {
        wait_for_output(&dir.path().join(format!("{}.txt", name))).await;
    }
    pipeline.shutdown().await;

    assert_eq!(
        read(&dir.path().join("releases.txt")),
        "《Spring Boot 3.2》 http://x\r\n"
    );
    assert_eq!(
        read(&dir.path().join("engineering.txt")),
        "《Structured logging》 http://y\r\n"
    );
    assert_eq!(
        read(&dir.path().join("news.txt")),
        "《Conference recap》 http://z\r\n"
    );

    // The unrouted category landed nowhere
    for name in ["releases", "engineering", "news"] {
        assert!(!read(&dir.path().join(format!("{}.txt", name))).contains("Unrouted video"));
    }
}

#[tokio::test]
async fn overlapping_polls_do_not_redeliver() {
    let server = mock_feed(FEED_BODY).await;
    let dir = tempfile::tempdir().unwrap();
    let config = file_sink_config(format!("{}/feed", server.uri()), dir.path());

    let pipeline = Pipeline::start(config).unwrap();
    wait_for_output(&dir.path().join("releases.txt")).await;
    // Many more 25ms polls over the same feed body
    tokio::time::sleep(Duration::from_millis(300)).await;
    pipeline.shutdown().await;

    // Still exactly one line despite a dozen polls
    assert_eq!(
        read(&dir.path().join("releases.txt")),
        "《Spring Boot 3.2》 http://x\r\n"
    );
    assert_eq!(
        read(&dir.path().join("news.txt")),
        "《Conference recap》 http://z\r\n"
    );
}

#[tokio::test]
async fn two_categories_can_share_one_sink() {
    let server = mock_feed(FEED_BODY).await;
    let dir = tempfile::tempdir().unwrap();

    let combined = dir.path().join("combined.txt");
    let mut routes = BTreeMap::new();
    routes.insert("releases".to_string(), "combined".to_string());
    routes.insert("engineering".to_string(), "combined".to_string());
    let mut sinks = BTreeMap::new();
    sinks.insert(
        "combined".to_string(),
        SinkConfig::File {
            path: combined.clone(),
        },
    );
    let config = Config {
        feed: FeedConfig {
            url: format!("{}/feed", server.uri()),
            poll_interval_ms: 25,
        },
        pipeline: PipelineConfig {
            channel_capacity: 10,
        },
        routes,
        sinks,
    };

    let pipeline = Pipeline::start(config).unwrap();
    wait_for_output(&combined).await;
    pipeline.shutdown().await;

    let content = read(&combined);
    assert!(content.contains("《Spring Boot 3.2》 http://x\r\n"));
    assert!(content.contains("《Structured logging》 http://y\r\n"));
    assert!(!content.contains("Conference recap"));
}

// ============================================================================
// Failure behavior
// ============================================================================

#[tokio::test]
async fn feed_errors_recover_on_a_later_tick() {
    let server = MockServer::start().await;
    // First two polls fail, then the feed comes back
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEED_BODY))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = file_sink_config(format!("{}/feed", server.uri()), dir.path());

    let pipeline = Pipeline::start(config).unwrap();
    wait_for_output(&dir.path().join("releases.txt")).await;
    pipeline.shutdown().await;

    assert_eq!(
        read(&dir.path().join("releases.txt")),
        "《Spring Boot 3.2》 http://x\r\n"
    );
}

#[tokio::test]
async fn shutdown_drains_queued_entries() {
    // Feed with more entries for one category than the channel holds
    let mut items = String::new();
    for i in 0..15 {
        items.push_str(&format!(
            "<item><guid>r-{i}</guid><title>Release {i}</title><link>http://r/{i}</link><category>releases</category></item>\n"
        ));
    }
    let body = format!(
        r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Blog</title>
{items}
</channel></rss>"#
    );

    let server = mock_feed(&body).await;
    let dir = tempfile::tempdir().unwrap();
    let config = file_sink_config(format!("{}/feed", server.uri()), dir.path());

    let pipeline = Pipeline::start(config).unwrap();
    wait_for_output(&dir.path().join("releases.txt")).await;
    pipeline.shutdown().await;

    // After shutdown returns, every entry made it out, once, in feed order
    let content = read(&dir.path().join("releases.txt"));
    let lines: Vec<&str> = content.split("\r\n").filter(|l| !l.is_empty()).collect();
    assert_eq!(lines.len(), 15);
    for (i, line) in lines.iter().enumerate() {
        assert_eq!(*line, format!("《Release {i}》 http://r/{i}"));
    }
}
