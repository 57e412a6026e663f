//! tweetstore - tweet feed normalizer CLI
//!
//! Main entry point for the tweetstore command-line tool.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use tracing::{debug, warn};

use tweetstore::cli::{
    Cli, Commands, CompletionsArgs, ConfigArgs, IngestArgs, ListArgs, OutputFormat, RangeArgs,
};
use tweetstore::config::Config;
use tweetstore::logging::{OperationGuard, init_cli_logging};
use tweetstore::{
    CONTENT_DIVIDER_WIDTH, Normalizer, Repository, Storage, Timestamp, Tweet, TweetStoreError,
    created_in_range, earliest_created_at, format_bytes, format_error, format_number,
    format_number_usize, latest_created_at, truncate_line,
};

/// Settings resolved from the config layers and the global flags.
struct AppContext {
    config: Config,
    db_path: PathBuf,
    format: OutputFormat,
    quiet: bool,
}

#[derive(Debug, Default, Serialize)]
struct IngestSummary {
    lines: usize,
    ingested: usize,
    filtered: usize,
    failed: usize,
}

#[derive(Debug, Serialize)]
struct Bounds {
    earliest: Option<Timestamp>,
    latest: Option<Timestamp>,
}

#[derive(Debug, Serialize)]
struct StatsReport {
    database: PathBuf,
    size_bytes: u64,
    tweets: i64,
    users: i64,
    earliest: Option<Timestamp>,
    latest: Option<Timestamp>,
}

/// Width of the one-line tweet preview in text output.
const TEXT_PREVIEW_WIDTH: usize = 120;

fn main() {
    let cli = Cli::parse();

    if let Err(err) = try_main(&cli) {
        eprintln!("{}", render_error(&err));
        std::process::exit(1);
    }
}

fn try_main(cli: &Cli) -> Result<()> {
    let mut config = Config::load().context("Cannot load configuration")?;
    if let Some(db) = &cli.db {
        config.paths.db = Some(db.clone());
    }
    if cli.quiet {
        config.output.quiet = true;
    }
    if !config.output.colors {
        colored::control::set_override(false);
    }

    init_cli_logging(config.output.quiet, cli.verbose, config.output.colors);

    let ctx = AppContext {
        db_path: config.db_path(),
        format: cli
            .format
            .unwrap_or_else(|| OutputFormat::from_config(&config.output.format)),
        quiet: config.output.quiet,
        config,
    };

    run(cli, &ctx)
}

fn run(cli: &Cli, ctx: &AppContext) -> Result<()> {
    match &cli.command {
        Commands::Ingest(args) => cmd_ingest(ctx, args),
        Commands::Range(args) => cmd_range(ctx, args),
        Commands::Bounds => cmd_bounds(ctx),
        Commands::Tweets(args) => cmd_tweets(ctx, args),
        Commands::Users(args) => cmd_users(ctx, args),
        Commands::Stats => cmd_stats(ctx),
        Commands::Config(args) => cmd_config(ctx, args),
        Commands::Completions(args) => cmd_completions(args),
    }
}

fn render_error(err: &anyhow::Error) -> String {
    let explanation = err
        .chain()
        .skip(1)
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ");
    let hint = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<TweetStoreError>())
        .and_then(TweetStoreError::suggestion);

    format_error(&err.to_string(), &explanation, hint)
}

fn print_json<T: Serialize + ?Sized>(format: OutputFormat, value: &T) -> Result<()> {
    let json = if format == OutputFormat::JsonPretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{json}");
    Ok(())
}

fn open_store(ctx: &AppContext) -> Result<Storage> {
    Storage::open_existing(&ctx.db_path)
        .with_context(|| format!("Cannot open store at {}", ctx.db_path.display()))
}

fn cmd_ingest(ctx: &AppContext, args: &IngestArgs) -> Result<()> {
    let normalizer = Normalizer::new(ctx.config.time_mode()?);
    let persist_retweets = args.persist_retweets(ctx.config.ingest.save_retweets);

    let reader: Box<dyn BufRead> = if args.reads_stdin() {
        Box::new(io::stdin().lock())
    } else {
        let file = File::open(&args.input)
            .with_context(|| format!("Cannot read feed {}", args.input.display()))?;
        Box::new(BufReader::new(file))
    };

    if let Some(parent) = ctx.db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create {}", parent.display()))?;
    }
    let mut storage = Storage::open(&ctx.db_path)?;

    debug!(
        db = %ctx.db_path.display(),
        persist_retweets,
        aware = normalizer.time_mode().is_aware(),
        "Ingesting feed"
    );

    let progress = if ctx.quiet || ctx.format.is_json() {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {pos} records {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb
    };

    let guard = OperationGuard::new("ingest");
    let summary = match ingest_lines(reader, &normalizer, &mut storage, persist_retweets, &progress)
    {
        Ok(summary) => {
            progress.finish_and_clear();
            guard.complete();
            summary
        }
        Err(err) => {
            progress.finish_and_clear();
            guard.fail(&err);
            return Err(err).context("Failed while reading the feed");
        }
    };

    if ctx.format.is_json() {
        return print_json(ctx.format, &summary);
    }
    if ctx.quiet {
        return Ok(());
    }

    println!("{}", "Ingest complete".bold().green());
    println!("  {:<12} {:>10}", "Ingested:", format_number_usize(summary.ingested).cyan());
    println!("  {:<12} {:>10}", "Filtered:", format_number_usize(summary.filtered));
    let failed = format_number_usize(summary.failed);
    if summary.failed > 0 {
        println!("  {:<12} {:>10}", "Failed:", failed.red());
    } else {
        println!("  {:<12} {:>10}", "Failed:", failed);
    }
    println!("  Database: {}", ctx.db_path.display());

    Ok(())
}

/// Feed every non-blank line through the normalizer.
///
/// Bad records are logged and counted. Only a read failure stops the loop.
fn ingest_lines<R: BufRead>(
    reader: R,
    normalizer: &Normalizer,
    storage: &mut Storage,
    persist_retweets: bool,
    progress: &ProgressBar,
) -> io::Result<IngestSummary> {
    let mut summary = IngestSummary::default();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        summary.lines += 1;

        let raw: serde_json::Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(err) => {
                warn!(line = line_no, error = %err, "Skipping unparseable line");
                summary.failed += 1;
                progress.inc(1);
                continue;
            }
        };

        match normalizer.ingest(storage, &raw, persist_retweets) {
            Ok(Some(_)) => summary.ingested += 1,
            Ok(None) => summary.filtered += 1,
            Err(err) => {
                if err.is_malformed_input() {
                    warn!(line = line_no, error = %err, "Rejected malformed status");
                } else {
                    warn!(line = line_no, error = %err, "Failed to store status");
                }
                summary.failed += 1;
            }
        }
        progress.inc(1);
        progress.set_message(format!("({} filtered, {} failed)", summary.filtered, summary.failed));
    }

    Ok(summary)
}

fn cmd_range(ctx: &AppContext, args: &RangeArgs) -> Result<()> {
    let start = Timestamp::parse_bound(&args.from)?;
    let end = Timestamp::parse_bound(&args.to)?;
    let storage = open_store(ctx)?;

    let query = created_in_range(&storage, start, end);

    if args.count {
        let count = query.count()?;
        if ctx.format.is_json() {
            return print_json(ctx.format, &serde_json::json!({ "count": count }));
        }
        println!("{count}");
        return Ok(());
    }

    let tweets = query.fetch()?;
    if ctx.format.is_json() {
        return print_json(ctx.format, &tweets);
    }

    if tweets.is_empty() {
        println!(
            "{}",
            format!("No tweets created in [{}, {}).", query.start(), query.end()).yellow()
        );
        return Ok(());
    }

    println!(
        "{} tweets created in [{}, {}):\n",
        format_number_usize(tweets.len()).cyan(),
        query.start(),
        query.end()
    );
    for tweet in &tweets {
        print_tweet(&storage, tweet)?;
    }

    Ok(())
}

fn print_tweet(storage: &Storage, tweet: &Tweet) -> Result<()> {
    let author = storage
        .user_name_for(tweet)?
        .unwrap_or_else(|| format!("user {}", tweet.fields.user_id));
    let badge = if tweet.is_retweet() {
        format!(" {}", "RT".on_magenta())
    } else {
        String::new()
    };

    println!(
        "{} {}{} {}",
        tweet.fields.created_at.to_string().dimmed(),
        tweet.tweet_id().to_string().dimmed(),
        badge,
        author.bold()
    );
    println!("   {}", truncate_line(&tweet.to_string(), TEXT_PREVIEW_WIDTH));
    Ok(())
}

fn cmd_bounds(ctx: &AppContext) -> Result<()> {
    let storage = open_store(ctx)?;
    let bounds = Bounds {
        earliest: earliest_created_at(&storage)?,
        latest: latest_created_at(&storage)?,
    };

    if ctx.format.is_json() {
        return print_json(ctx.format, &bounds);
    }

    match (bounds.earliest, bounds.latest) {
        (Some(earliest), Some(latest)) => {
            println!("  Earliest: {}", earliest.to_string().green());
            println!("  Latest:   {}", latest.to_string().green());
        }
        _ => println!("{}", "No tweets stored.".yellow()),
    }
    Ok(())
}

fn cmd_tweets(ctx: &AppContext, args: &ListArgs) -> Result<()> {
    let storage = open_store(ctx)?;
    let tweets = match &args.search {
        Some(query) => storage.search_tweets(query, args.limit)?,
        None => storage.list_tweets(args.limit)?,
    };

    if ctx.format.is_json() {
        return print_json(ctx.format, &tweets);
    }
    if tweets.is_empty() {
        println!("{}", "No tweets found.".yellow());
        return Ok(());
    }
    for tweet in &tweets {
        print_tweet(&storage, tweet)?;
    }
    Ok(())
}

fn cmd_users(ctx: &AppContext, args: &ListArgs) -> Result<()> {
    let storage = open_store(ctx)?;
    let users = match &args.search {
        Some(query) => storage.search_users(query, args.limit)?,
        None => storage.list_users(args.limit)?,
    };

    if ctx.format.is_json() {
        return print_json(ctx.format, &users);
    }
    if users.is_empty() {
        println!("{}", "No users found.".yellow());
        return Ok(());
    }
    for user in &users {
        let followers = user
            .fields
            .followers_count
            .map_or_else(|| "-".to_string(), format_number);
        println!(
            "{} {} {} {}",
            user.user_id().to_string().dimmed(),
            user.to_string().bold(),
            format!("@{}", user.fields.screen_name).cyan(),
            format!("({followers} followers)").dimmed()
        );
    }
    Ok(())
}

fn cmd_stats(ctx: &AppContext) -> Result<()> {
    let storage = open_store(ctx)?;
    let counts = storage.counts()?;
    let report = StatsReport {
        size_bytes: std::fs::metadata(&ctx.db_path).map(|m| m.len()).unwrap_or(0),
        database: ctx.db_path.clone(),
        tweets: counts.tweets,
        users: counts.users,
        earliest: earliest_created_at(&storage)?,
        latest: latest_created_at(&storage)?,
    };

    if ctx.format.is_json() {
        return print_json(ctx.format, &report);
    }

    println!("{}", "Store Statistics".bold().cyan());
    println!("{}", "─".repeat(CONTENT_DIVIDER_WIDTH));
    println!("  {:<12} {:>10}", "Tweets:", format_number(report.tweets));
    println!("  {:<12} {:>10}", "Users:", format_number(report.users));
    println!("  {:<12} {:>10}", "Size:", format_bytes(report.size_bytes));
    println!("{}", "─".repeat(CONTENT_DIVIDER_WIDTH));
    if let (Some(first), Some(last)) = (report.earliest, report.latest) {
        println!("  First tweet: {}", first.to_string().green());
        println!("  Last tweet:  {}", last.to_string().green());
    }
    Ok(())
}

fn cmd_config(ctx: &AppContext, args: &ConfigArgs) -> Result<()> {
    if !args.show {
        print!("{}", Config::default_config_content());
        return Ok(());
    }

    if ctx.format.is_json() {
        return print_json(ctx.format, &ctx.config);
    }

    println!("{}", "Current Configuration".bold().cyan());
    if let Some(path) = Config::user_config_path() {
        let state = if path.exists() { "" } else { " (not present)" };
        println!("  Config file: {}{state}", path.display());
    }
    println!("  Database:    {}", ctx.db_path.display());
    println!();
    print!(
        "{}",
        toml::to_string_pretty(&ctx.config).context("Failed to render configuration")?
    );
    Ok(())
}

fn cmd_completions(args: &CompletionsArgs) -> Result<()> {
    let mut cmd = Cli::command();
    generate(args.shell, &mut cmd, "tweetstore", &mut io::stdout());
    Ok(())
}
