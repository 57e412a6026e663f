//! tweetstore - normalize and store tweets from a streaming JSON feed
//!
//! Raw status objects are validated, flattened into tweet and user records,
//! and upserted by their external ids. Stored tweets can then be queried by
//! creation time.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface definitions
//! - [`config`] - Layered configuration (file, environment, flags)
//! - [`error`] - Error types with rich context
//! - [`model`] - Tweet and user records
//! - [`normalizer`] - Raw status validation and upsert
//! - [`queries`] - Range and bounds queries over stored tweets
//! - [`repository`] - Persistence seam and an in-memory store
//! - [`storage`] - `SQLite` storage layer
//! - [`timestamp`] - Feed date parsing and timezone handling

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod normalizer;
pub mod queries;
pub mod repository;
pub mod storage;
pub mod timestamp;

pub use error::{Result, ResultExt, TweetStoreError, format_error};
pub use model::*;
pub use normalizer::Normalizer;
pub use queries::{CreatedInRange, created_in_range, earliest_created_at, latest_created_at};
pub use repository::{MemoryRepository, Repository};
pub use storage::Storage;
pub use timestamp::{TimeMode, Timestamp};

/// Default database filename
pub const DEFAULT_DB_NAME: &str = "tweetstore.db";

/// Standard width for content dividers in CLI output
pub const CONTENT_DIVIDER_WIDTH: usize = 40;

const BYTES_PER_KB: u64 = 1024;
const BYTES_PER_MB: u64 = 1024 * 1024;
const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

/// Get the default data directory for tweetstore
#[must_use]
pub fn default_data_dir() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("tweetstore")
}

/// Get the default database path
#[must_use]
pub fn default_db_path() -> std::path::PathBuf {
    default_data_dir().join(DEFAULT_DB_NAME)
}

/// Format an integer with thousands separators.
#[must_use]
pub fn format_number(value: i64) -> String {
    let abs = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(abs.len() + abs.len() / 3);

    for (idx, ch) in abs.chars().rev().enumerate() {
        if idx > 0 && idx % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }

    let mut formatted: String = out.chars().rev().collect();
    if value < 0 {
        formatted.insert(0, '-');
    }
    formatted
}

/// Format a usize with thousands separators.
#[must_use]
pub fn format_number_usize(value: usize) -> String {
    format_number(i64::try_from(value).unwrap_or(i64::MAX))
}

/// Shorten text to `max_chars` characters on one line, marking the cut with `...`.
#[must_use]
pub fn truncate_line(text: &str, max_chars: usize) -> String {
    let flat = text.replace(['\n', '\r'], " ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let kept: String = flat.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// Format bytes into a human-friendly string.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    if bytes < BYTES_PER_KB {
        format!("{bytes} B")
    } else if bytes < BYTES_PER_MB {
        format_bytes_with_unit(bytes, BYTES_PER_KB, "KB")
    } else if bytes < BYTES_PER_GB {
        format_bytes_with_unit(bytes, BYTES_PER_MB, "MB")
    } else {
        format_bytes_with_unit(bytes, BYTES_PER_GB, "GB")
    }
}

fn format_bytes_with_unit(bytes: u64, unit: u64, suffix: &str) -> String {
    let whole = bytes / unit;
    let tenths = (bytes % unit) * 10 / unit;
    format!("{whole}.{tenths} {suffix}")
}
