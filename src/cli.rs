//! CLI definitions for tweetstore.
//!
//! Uses clap for argument parsing with derive macros.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// tweetstore - normalize and store tweets from a JSON feed
#[derive(Parser, Debug)]
#[command(name = "tweetstore")]
#[command(version)]
#[command(about = "Normalize streamed tweets into a local SQLite store")]
#[command(long_about = r#"
tweetstore reads raw status objects (one JSON object per line), flattens
each into a tweet and its author, and upserts both by their external ids.
Re-ingesting the same status updates the stored rows in place.

Quick start:
  1. Capture a feed:  curl ... > feed.jsonl
  2. Ingest it:       tweetstore ingest feed.jsonl
  3. Query by time:   tweetstore range --from 2018-10-10T00:00:00Z --to 2018-10-11T00:00:00Z
"#)]
pub struct Cli {
    /// Path to the database file
    #[arg(long, env = "TWEETSTORE_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Output format (defaults to the configured format)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Be verbose; repeat (-vv) for trace output
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Be quiet (suppress non-error output)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a JSON Lines feed of status objects
    Ingest(IngestArgs),

    /// List tweets created in [from, to)
    Range(RangeArgs),

    /// Show the earliest and latest tweet creation times
    Bounds,

    /// List or search stored tweets
    Tweets(ListArgs),

    /// List or search stored users
    Users(ListArgs),

    /// Show store statistics
    Stats,

    /// Show configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// JSON Lines file to read, or `-` for stdin
    pub input: PathBuf,

    /// Store retweets instead of skipping them
    #[arg(long, conflicts_with = "skip_retweets")]
    pub save_retweets: bool,

    /// Skip retweets even if the config saves them
    #[arg(long)]
    pub skip_retweets: bool,
}

impl IngestArgs {
    /// Whether the input is stdin.
    #[must_use]
    pub fn reads_stdin(&self) -> bool {
        self.input.as_os_str() == "-"
    }

    /// Resolve the retweet flag against the configured default.
    #[must_use]
    pub const fn persist_retweets(&self, configured: bool) -> bool {
        if self.save_retweets {
            true
        } else if self.skip_retweets {
            false
        } else {
            configured
        }
    }
}

#[derive(Args, Debug)]
pub struct RangeArgs {
    /// Inclusive lower bound (RFC 3339, or YYYY-MM-DDTHH:MM:SS for naive stores)
    #[arg(long)]
    pub from: String,

    /// Exclusive upper bound
    #[arg(long)]
    pub to: String,

    /// Print only the number of matching tweets
    #[arg(long, short = 'c')]
    pub count: bool,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Case-insensitive substring to match
    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// Limit number of items
    #[arg(long, short = 'n', default_value = "20")]
    pub limit: usize,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Show the effective configuration instead of the default file
    #[arg(long)]
    pub show: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    JsonPretty,
}

impl OutputFormat {
    /// Parse a configured format name, falling back to text.
    #[must_use]
    pub fn from_config(value: &str) -> Self {
        <Self as ValueEnum>::from_str(value, true).unwrap_or_default()
    }

    #[must_use]
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json | Self::JsonPretty)
    }
}
