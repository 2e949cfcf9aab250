//! surveyboard - survey completion status from the command line

mod cli;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use surveyboard_core::{
    Settings, SqliteLookup, StatusCache, StatusRecord, SubjectKey, SubjectView,
};
use tracing::level_filters::LevelFilter;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "surveyboard",
    version,
    about = "Survey completion status with a shared, de-duplicating cache",
    long_about = "Looks up which yearly surveys a member has completed.\n\
                  \n\
                  Each survey year lives in its own `survey_<year>_responses` table.\n\
                  Lookups for one member run concurrently and results are cached\n\
                  for the configured TTL (30s by default).\n\
                  \n\
                  Examples:\n\
                    surveyboard status member-1             # Table for one member\n\
                    surveyboard status member-1 --json      # Same, as JSON\n\
                    surveyboard batch m1 m2 m3              # Several members at once\n\
                    surveyboard watch member-1 -i 10        # Poll every 10 seconds\n\
                    surveyboard categories                  # Show configured surveys\n\
                  \n\
                  Environment Variables:\n\
                    SURVEYBOARD_CONFIG                      # Config file path\n\
                    SURVEYBOARD_DB                          # SQLite database path\n\
                    SURVEYBOARD_NO_COLOR                    # Disable ANSI colors\n\
                    RUST_LOG                                # Log filter (default: info)"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file (default: <config_dir>/surveyboard/config.toml)
    #[arg(long, env = "SURVEYBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database with the survey response tables
    #[arg(long, env = "SURVEYBOARD_DB")]
    db: Option<PathBuf>,

    /// Disable ANSI colors (log-friendly)
    #[arg(long, env = "SURVEYBOARD_NO_COLOR")]
    no_color: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Show survey status for one subject
    Status {
        /// Subject (member) identifier
        subject: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show survey status for several subjects concurrently
    Batch {
        /// Subject identifiers (duplicates share one lookup)
        #[arg(required = true)]
        subjects: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-check one subject periodically and print changes
    Watch {
        /// Subject (member) identifier
        subject: String,
        /// Seconds between checks
        #[arg(long, short = 'i', default_value = "30")]
        interval: u64,
        /// Stop after this many checks (default: run until interrupted)
        #[arg(long, short = 'n')]
        count: Option<u64>,
    },
    /// List the configured survey categories
    Categories,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_path = cli
        .config
        .or_else(Settings::default_path)
        .context("Could not determine config directory")?;
    let mut settings = Settings::load(&config_path)
        .with_context(|| format!("Failed to load config: {}", config_path.display()))?;
    if let Some(db) = cli.db {
        settings.database = Some(db);
    }

    let no_color = cli.no_color;

    match cli.command {
        Command::Categories => {
            let config = settings.cache_config()?;
            println!("{}", cli::format_categories(&config.categories));
        }
        Command::Status { subject, json } => {
            let cache = build_cache(&settings)?;
            let subject = SubjectKey::new(subject)?;
            let record = cache.fetch(&subject).await;
            println!("{}", cli::format_record(&record, json, no_color));
        }
        Command::Batch { subjects, json } => {
            let cache = build_cache(&settings)?;
            run_batch(&cache, subjects, json).await?;
        }
        Command::Watch {
            subject,
            interval,
            count,
        } => {
            let cache = Arc::new(build_cache(&settings)?);
            run_watch(cache, subject, interval, count, no_color).await?;
        }
    }

    Ok(())
}

fn build_cache(settings: &Settings) -> Result<StatusCache> {
    let config = settings.cache_config()?;
    let db = settings
        .database
        .as_ref()
        .context("No database configured: pass --db or set `database` in the config file")?;

    let lookup = SqliteLookup::open(db, config.years())
        .with_context(|| format!("Failed to open survey database: {}", db.display()))?;
    info!(db = %db.display(), ttl_secs = config.ttl.as_secs(), "Status cache ready");

    Ok(StatusCache::new(Arc::new(lookup), config)?)
}

async fn run_batch(cache: &StatusCache, subjects: Vec<String>, json: bool) -> Result<()> {
    let subjects = subjects
        .into_iter()
        .map(SubjectKey::new)
        .collect::<Result<Vec<_>, _>>()?;

    let records = join_all(subjects.iter().map(|s| cache.fetch(s))).await;

    let stats = cache.stats();
    debug!(
        fetches = stats.fetches,
        coalesced = stats.coalesced,
        hits = stats.hits,
        "Batch complete"
    );

    let refs: Vec<&StatusRecord> = records.iter().map(|r| &**r).collect();
    println!("{}", cli::format_batch(&refs, cache.categories(), json));
    Ok(())
}

async fn run_watch(
    cache: Arc<StatusCache>,
    subject: String,
    interval: u64,
    count: Option<u64>,
    no_color: bool,
) -> Result<()> {
    anyhow::ensure!(interval > 0, "interval must be at least 1 second");

    let subject = SubjectKey::new(subject)?;
    let view = SubjectView::attach(Arc::clone(&cache), subject);
    let mut ticker = tokio::time::interval(Duration::from_secs(interval));
    let mut last: Option<Arc<StatusRecord>> = None;
    let mut checks = 0u64;

    loop {
        ticker.tick().await;
        let record = view.load().await;

        if cli::status_changed(last.as_deref(), &record) {
            println!("{}\n", cli::format_record(&record, false, no_color));
        } else {
            debug!(subject = %view.subject(), "Served from cache, nothing new");
        }
        last = Some(record);

        checks += 1;
        if count.is_some_and(|n| checks >= n) {
            break;
        }
    }

    Ok(())
}
