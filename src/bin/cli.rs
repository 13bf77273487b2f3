//! gridsource CLI
//!
//! Runs a TOML-described feed through the collection pipeline. Exits
//! non-zero when any candidate failed, so schedulers can alert on
//! partial runs; re-invocation is safe because stored content dedupes
//! by hash.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use gridsource::{
    collector::Collector,
    error::{AppError, Result},
    models::{CollectorConfig, Environment, RunOptions},
    notify::LogSink,
    registry::{DedupeRegistry, MemoryRegistry},
    sources::{FeedConfig, HttpJsonSource},
    storage::{LocalStore, ObjectStore},
};

/// gridsource - electricity market data collection
#[derive(Parser, Debug)]
#[command(name = "gridsource", version, about = "Collects market data feeds")]
struct Cli {
    /// Path to the feed description (TOML)
    #[arg(short, long)]
    feed: PathBuf,

    /// Deployment environment (dev/staging/prod)
    #[arg(short, long, default_value = "dev")]
    environment: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collect the feed
    Run {
        /// Single date to collect (YYYY-MM-DD); omit for a snapshot
        #[arg(long, value_parser = parse_date, conflicts_with_all = ["start_date", "end_date"])]
        date: Option<NaiveDate>,

        /// First date of a backfill range, inclusive
        #[arg(long, value_parser = parse_date, requires = "end_date")]
        start_date: Option<NaiveDate>,

        /// Last date of a backfill range, inclusive
        #[arg(long, value_parser = parse_date, requires = "start_date")]
        end_date: Option<NaiveDate>,

        /// Per-dataset filter, `key=value`; repeatable
        #[arg(long = "filter", value_parser = parse_key_value)]
        filters: Vec<(String, String)>,

        /// Store even when the content hash is already registered
        #[arg(long)]
        force: bool,

        /// Skip the registry query entirely
        #[arg(long)]
        skip_hash_check: bool,

        /// Override the dedupe TTL in days for this run
        #[arg(long)]
        ttl_days: Option<u32>,

        /// Local object store root directory
        #[arg(long, default_value = "data")]
        store_root: PathBuf,

        /// S3 bucket to store into instead of the local store
        #[cfg(feature = "s3")]
        #[arg(long)]
        s3_bucket: Option<String>,

        /// Redis URL for the dedupe registry (process-local otherwise)
        #[cfg(feature = "redis")]
        #[arg(long)]
        redis_url: Option<String>,
    },

    /// Validate the feed description and exit
    Validate,
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("invalid date '{s}': {e}"))
}

fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("invalid filter '{s}': expected key=value"))
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let feed = FeedConfig::load(&cli.feed)?;
    let environment: Environment = cli.environment.parse()?;

    match cli.command {
        Command::Validate => {
            feed.validate()?;
            log::info!("Feed '{}' OK ({})", feed.name, feed.url);
            Ok(())
        }

        Command::Run {
            date,
            start_date,
            end_date,
            filters,
            force,
            skip_hash_check,
            ttl_days,
            store_root,
            #[cfg(feature = "s3")]
            s3_bucket,
            #[cfg(feature = "redis")]
            redis_url,
        } => {
            // The API key stays a CLI concern; the core never reads
            // ambient environment state.
            let api_key = std::env::var("MISO_API_KEY").ok();

            let mut options = RunOptions {
                start_date: date.or(start_date),
                end_date: date.or(end_date),
                force,
                skip_hash_check,
                ttl_days,
                ..RunOptions::default()
            };
            options.filters.extend(filters);

            let config = CollectorConfig::new(feed.name.clone(), environment);
            let source = HttpJsonSource::new(feed, api_key)?;

            let registry: Arc<dyn DedupeRegistry> = build_registry(
                #[cfg(feature = "redis")]
                redis_url.as_deref(),
            )?;
            let store: Arc<dyn ObjectStore> = build_store(
                store_root,
                #[cfg(feature = "s3")]
                s3_bucket,
            )
            .await;

            let collector =
                Collector::new(config, source, registry, store)?.with_sink(Arc::new(LogSink));

            let summary = collector.run(&options).await;

            log::info!(
                "Summary: total={} collected={} skipped_duplicate={} failed={}",
                summary.total_candidates,
                summary.collected,
                summary.skipped_duplicate,
                summary.failed
            );
            for error in &summary.errors {
                log::error!("  {}: {}", error.candidate, error.error);
            }

            if summary.has_failures() {
                return Err(AppError::config(format!(
                    "{} candidate(s) failed",
                    summary.failed
                )));
            }
            Ok(())
        }
    }
}

#[cfg(feature = "redis")]
fn build_registry(redis_url: Option<&str>) -> Result<Arc<dyn DedupeRegistry>> {
    match redis_url {
        Some(url) => Ok(Arc::new(gridsource::registry::RedisRegistry::new(url)?)),
        None => {
            log::warn!("No --redis-url given; dedupe is process-local only");
            Ok(Arc::new(MemoryRegistry::new()))
        }
    }
}

#[cfg(not(feature = "redis"))]
fn build_registry() -> Result<Arc<dyn DedupeRegistry>> {
    log::warn!("Built without the 'redis' feature; dedupe is process-local only");
    Ok(Arc::new(MemoryRegistry::new()))
}

#[cfg(feature = "s3")]
async fn build_store(store_root: PathBuf, s3_bucket: Option<String>) -> Arc<dyn ObjectStore> {
    match s3_bucket {
        Some(bucket) => Arc::new(gridsource::storage::S3Store::from_default_config(bucket).await),
        None => Arc::new(LocalStore::new(store_root)),
    }
}

#[cfg(not(feature = "s3"))]
async fn build_store(store_root: PathBuf) -> Arc<dyn ObjectStore> {
    Arc::new(LocalStore::new(store_root))
}
