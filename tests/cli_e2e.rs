//! End-to-end CLI tests for tweetstore.
//!
//! These tests run the actual tweetstore binary and verify:
//! - Command-line interface behavior
//! - Output format and content
//! - Error handling and messages
//!
//! # Test Organization
//!
//! Tests are organized by command:
//! - `test_ingest_*` - Ingest command tests
//! - `test_range_*` / `test_bounds_*` - Time queries
//! - `test_stats_*` / `test_list_*` - Read-only views
//! - `test_cli_*` - General CLI tests (flags, help, version)

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

/// Log a test event with timestamp
macro_rules! test_log {
    ($($arg:tt)*) => {
        let timestamp = chrono::Utc::now().format("%H:%M:%S%.3f");
        eprintln!("[TEST {}] {}", timestamp, format!($($arg)*));
    };
}

const USER_A: &str = r#"{"id": 7, "name": "Alice", "screen_name": "alice", "location": "", "url": null, "description": "", "protected": false, "verified": false, "followers_count": 1200, "created_at": "Mon Jan 01 00:00:00 +0000 2018"}"#;

const USER_B: &str = r#"{"id": 8, "name": "Bob", "screen_name": "bob", "location": "Here", "url": null, "description": "", "protected": null, "verified": null, "created_at": "Mon Jan 01 00:00:00 +0000 2018"}"#;

fn status_line(id: i64, text: &str, created_at: &str, user: &str, extra: &str) -> String {
    format!(
        r#"{{"id": {id}, "text": "{text}", "truncated": false, "created_at": "{created_at}", "user": {user}{extra}}}"#
    )
}

/// Three originals, one retweet, one malformed JSON line, one blank line.
fn sample_feed() -> String {
    [
        status_line(100, "hi", "Wed Oct 10 20:19:24 +0000 2018", USER_A, r#", "reply_count": -1"#),
        status_line(101, "rust is great", "Wed Oct 10 21:00:00 +0000 2018", USER_A, ""),
        String::new(),
        status_line(102, "morning coffee", "Thu Oct 11 08:30:00 +0000 2018", USER_B, ""),
        status_line(
            103,
            "RT @alice: hi",
            "Thu Oct 11 09:00:00 +0000 2018",
            USER_B,
            r#", "retweeted_status": {"id": 100}"#,
        ),
        "{not json".to_string(),
    ]
    .join("\n")
}

struct TestEnv {
    dir: TempDir,
    db: PathBuf,
}

impl TestEnv {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let db = dir.path().join("store").join("tweetstore.db");
        Self { dir, db }
    }

    fn write_feed(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, content).expect("Failed to write feed");
        path
    }

    /// A command isolated from the user's config and environment.
    fn cmd(&self) -> Command {
        let mut cmd = tweetstore_cmd();
        isolate(&mut cmd, self.dir.path());
        cmd.arg("--db").arg(&self.db);
        cmd
    }

    fn ingest_sample(&self) {
        let feed = self.write_feed("feed.jsonl", &sample_feed());
        self.cmd().arg("ingest").arg(&feed).assert().success();
    }
}

fn tweetstore_cmd() -> Command {
    cargo_bin_cmd!("tweetstore")
}

fn isolate(cmd: &mut Command, home: &Path) {
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env("NO_COLOR", "1")
        .env_remove("TWEETSTORE_DB")
        .env_remove("TWEETSTORE_SAVE_RETWEETS")
        .env_remove("TWEETSTORE_USE_TZ")
        .env_remove("TWEETSTORE_TIME_ZONE")
        .env_remove("TWEETSTORE_FORMAT")
        .env_remove("TWEETSTORE_QUIET")
        .env_remove("RUST_LOG");
}

// =============================================================================
// Ingest Command Tests
// =============================================================================

#[test]
fn test_ingest_reports_summary() {
    test_log!("Starting test_ingest_reports_summary");
    let start = Instant::now();
    let env = TestEnv::new();
    let feed = env.write_feed("feed.jsonl", &sample_feed());

    env.cmd()
        .args(["--format", "json", "ingest"])
        .arg(&feed)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""lines":5"#))
        .stdout(predicate::str::contains(r#""ingested":3"#))
        .stdout(predicate::str::contains(r#""filtered":1"#))
        .stdout(predicate::str::contains(r#""failed":1"#));

    assert!(env.db.exists(), "database should be created");
    test_log!("Completed in {:?}", start.elapsed());
}

#[test]
fn test_ingest_text_summary() {
    let env = TestEnv::new();
    let feed = env.write_feed("feed.jsonl", &sample_feed());

    env.cmd()
        .arg("ingest")
        .arg(&feed)
        .assert()
        .success()
        .stdout(predicate::str::contains("Ingest complete"))
        .stdout(predicate::str::contains("Filtered:"));
}

#[test]
fn test_ingest_save_retweets() {
    let env = TestEnv::new();
    let feed = env.write_feed("feed.jsonl", &sample_feed());

    env.cmd()
        .args(["--format", "json", "ingest", "--save-retweets"])
        .arg(&feed)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""ingested":4"#))
        .stdout(predicate::str::contains(r#""filtered":0"#));
}

#[test]
fn test_ingest_from_stdin() {
    let env = TestEnv::new();

    env.cmd()
        .args(["--format", "json", "ingest", "-"])
        .write_stdin(sample_feed())
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""ingested":3"#));
}

#[test]
fn test_ingest_twice_updates_in_place() {
    let env = TestEnv::new();
    env.ingest_sample();

    let edited = status_line(100, "hi edited", "Wed Oct 10 20:19:24 +0000 2018", USER_A, "");
    let feed = env.write_feed("edit.jsonl", &edited);
    env.cmd().arg("ingest").arg(&feed).assert().success();

    env.cmd()
        .args(["--format", "json", "stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""tweets":3"#))
        .stdout(predicate::str::contains(r#""users":2"#));

    env.cmd()
        .args(["tweets", "--search", "edited"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hi edited"));
}

#[test]
fn test_ingest_missing_file_fails() {
    let env = TestEnv::new();

    env.cmd()
        .args(["ingest", "does-not-exist.jsonl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot read feed"));
}

// =============================================================================
// Range / Bounds Command Tests
// =============================================================================

#[test]
fn test_range_is_half_open() {
    let env = TestEnv::new();
    env.ingest_sample();

    env.cmd()
        .args([
            "range",
            "--from",
            "2018-10-10T20:19:24Z",
            "--to",
            "2018-10-10T21:00:00Z",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("hi"))
        .stdout(predicate::str::contains("rust is great").not());
}

#[test]
fn test_range_count() {
    let env = TestEnv::new();
    env.ingest_sample();

    env.cmd()
        .args([
            "range",
            "--count",
            "--from",
            "2018-10-10T00:00:00Z",
            "--to",
            "2018-10-12T00:00:00Z",
        ])
        .assert()
        .success()
        .stdout(predicate::str::diff("3\n"));
}

#[test]
fn test_range_keeps_fractional_bounds() {
    let env = TestEnv::new();
    env.ingest_sample();

    env.cmd()
        .args([
            "range",
            "--count",
            "--from",
            "2018-10-10T20:19:24Z",
            "--to",
            "2018-10-10T20:19:24.500Z",
        ])
        .assert()
        .success()
        .stdout(predicate::str::diff("1\n"));

    env.cmd()
        .args([
            "range",
            "--count",
            "--from",
            "2018-10-10T20:19:24.500Z",
            "--to",
            "2018-10-10T21:00:00Z",
        ])
        .assert()
        .success()
        .stdout(predicate::str::diff("0\n"));
}

#[test]
fn test_range_rejects_bad_bound() {
    let env = TestEnv::new();
    env.ingest_sample();

    env.cmd()
        .args(["range", "--from", "yesterday", "--to", "2018-10-12T00:00:00Z"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("yesterday"));
}

#[test]
fn test_bounds_reports_min_and_max() {
    let env = TestEnv::new();
    env.ingest_sample();

    env.cmd()
        .args(["--format", "json", "bounds"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""earliest":"2018-10-10T20:19:24+00:00""#))
        .stdout(predicate::str::contains(r#""latest":"2018-10-11T08:30:00+00:00""#));
}

#[test]
fn test_bounds_without_database_fails_with_hint() {
    let env = TestEnv::new();

    env.cmd()
        .arg("bounds")
        .assert()
        .failure()
        .stderr(predicate::str::contains("tweetstore ingest"));
}

// =============================================================================
// Stats / Listing Command Tests
// =============================================================================

#[test]
fn test_stats_text() {
    let env = TestEnv::new();
    env.ingest_sample();

    env.cmd()
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Store Statistics"))
        .stdout(predicate::str::contains("Tweets:"))
        .stdout(predicate::str::contains("First tweet: 2018-10-10T20:19:24+00:00"));
}

#[test]
fn test_list_users_search() {
    let env = TestEnv::new();
    env.ingest_sample();

    env.cmd()
        .args(["users", "--search", "ALI"])
        .assert()
        .success()
        .stdout(predicate::str::contains("@alice"))
        .stdout(predicate::str::contains("1,200 followers"))
        .stdout(predicate::str::contains("@bob").not());
}

#[test]
fn test_list_tweets_json() {
    let env = TestEnv::new();
    env.ingest_sample();

    env.cmd()
        .args(["--format", "json", "tweets", "-n", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""tweet_id":102"#))
        .stdout(predicate::str::contains(r#""tweet_id":100"#).not());
}

// =============================================================================
// General CLI Tests
// =============================================================================

#[test]
fn test_cli_help() {
    tweetstore_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ingest"))
        .stdout(predicate::str::contains("range"));
}

#[test]
fn test_cli_version() {
    tweetstore_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_config_default_content() {
    let env = TestEnv::new();

    env.cmd()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[time]"))
        .stdout(predicate::str::contains("save_retweets = false"));
}

#[test]
fn test_cli_malformed_config_fails_with_hint() {
    let env = TestEnv::new();
    let config_dir = env.dir.path().join("config").join("tweetstore");
    fs::create_dir_all(&config_dir).expect("Failed to create config dir");
    fs::write(config_dir.join("config.toml"), "[time]\nuse_tz = \"sometimes\"\n")
        .expect("Failed to write config");

    env.cmd()
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"))
        .stderr(predicate::str::contains("Hint:"));
}

#[test]
fn test_cli_bad_env_boolean_fails() {
    let env = TestEnv::new();

    env.cmd()
        .env("TWEETSTORE_SAVE_RETWEETS", "sometimes")
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("TWEETSTORE_SAVE_RETWEETS"));
}

#[test]
fn test_cli_completions() {
    tweetstore_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tweetstore"));
}

#[test]
fn test_cli_unknown_command() {
    tweetstore_cmd().arg("frobnicate").assert().failure();
}
