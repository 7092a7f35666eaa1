//! Exposes the command line application.
use std::path::PathBuf;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use accio::config::Config;
use accio::key::ResourceKey;
use accio::{Accio, UseFetchOptions};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::logging;
use crate::models::{
    LeaderboardInfo, Player, PlayerCollection, PlayerScoreCollection, ScoreCollection,
};
use crate::output::{self, Render};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line of JSON per result.
    Json,
    /// Indented JSON.
    Pretty,
    /// A human readable table.
    Table,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ScoreSort {
    Top,
    Recent,
}

impl ScoreSort {
    fn as_str(self) -> &'static str {
        match self {
            ScoreSort::Top => "top",
            ScoreSort::Recent => "recent",
        }
    }
}

#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Fetch any resource key and print the raw JSON.
    Get {
        /// A path starting with `/`, or an absolute URL.
        key: String,
    },
    /// Show a player profile.
    Player { id: String },
    /// Show the global or country rankings.
    Players {
        #[arg(long)]
        page: Option<u32>,
        /// Only show players whose name matches.
        #[arg(long)]
        search: Option<String>,
        /// Comma separated list of country codes.
        #[arg(long)]
        countries: Option<String>,
    },
    /// Show a leaderboard, or one page of its scores.
    Leaderboard {
        id: u64,
        /// Show this page of scores instead of the leaderboard info.
        #[arg(long)]
        page: Option<u32>,
    },
    /// Show the scores of a player.
    Scores {
        player_id: String,
        #[arg(long, value_enum)]
        sort: Option<ScoreSort>,
        #[arg(long)]
        page: Option<u32>,
    },
}

/// Browse the ScoreSaber leaderboards from the command line.
///
/// With `--watch`, results are revalidated every `--interval` and printed again whenever they
/// change, until interrupted with Ctrl-C.
#[derive(Clone, Debug, Parser)]
#[command(name = "scoresaber", author, version, about, long_about)]
pub struct Cli {
    /// Path to your configuration file.
    #[arg(long, short, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// The API to talk to. Overrides the configuration file.
    #[arg(long, global = true)]
    pub api_url: Option<Url>,

    /// The log level. Overrides the configuration file.
    #[arg(long, global = true)]
    pub log_level: Option<LevelFilter>,

    #[arg(
        long,
        value_enum,
        global = true,
        default_value_t = OutputFormat::Table
    )]
    pub format: OutputFormat,

    /// Keep revalidating and print every change.
    #[arg(long, global = true)]
    pub watch: bool,

    /// The revalidation interval in watch mode.
    #[arg(
        long,
        global = true,
        value_parser = humantime::parse_duration,
        default_value = "30s"
    )]
    pub interval: Duration,

    #[command(subcommand)]
    pub command: Command,
}

impl Command {
    /// The resource key this command subscribes to.
    pub fn key(&self) -> ResourceKey {
        match self {
            Command::Get { key } => ResourceKey::new(key.as_str()),
            Command::Player { id } => ResourceKey::new(format!("/api/player/{id}/full")),
            Command::Players {
                page,
                search,
                countries,
            } => ResourceKey::new("/api/players")
                .query_opt("page", *page)
                .query_opt("search", search.as_deref())
                .query_opt("countries", countries.as_deref()),
            Command::Leaderboard { id, page: None } => {
                ResourceKey::new(format!("/api/leaderboard/by-id/{id}/info"))
            }
            Command::Leaderboard { id, page } => {
                ResourceKey::new(format!("/api/leaderboard/by-id/{id}/scores"))
                    .query_opt("page", *page)
            }
            Command::Scores {
                player_id,
                sort,
                page,
            } => ResourceKey::new(format!("/api/player/{player_id}/scores"))
                .query_opt("sort", sort.map(ScoreSort::as_str))
                .query_opt("page", *page),
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::get(cli.config.as_deref()).context("failed loading config")?;
    if let Some(api_url) = &cli.api_url {
        config.api_url = Some(api_url.clone());
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    Ok(config)
}

/// Runs the main application and returns the exit code.
pub fn execute() -> Result<i32> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let _sentry = sentry::init(sentry::ClientOptions {
        dsn: config.sentry_dsn.clone(),
        release: sentry::release_name!(),
        ..Default::default()
    });

    // SAFETY: no other threads exist before the runtime is built.
    unsafe { logging::init_logging(&config) };
    if let Some(statsd) = &config.metrics.statsd {
        accio::metrics::configure_statsd(
            &config.metrics.prefix,
            statsd.as_str(),
            config.metrics.custom_tags.clone(),
        )?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("scoresaber-rt")
        .build()
        .context("failed to create tokio runtime")?;

    runtime.block_on(run(cli, config))
}

async fn run(cli: Cli, config: Config) -> Result<i32> {
    let accio = Accio::from_config(&config)?;
    let key = String::from(cli.command.key());
    tracing::debug!(%key, "Resolved command");

    match cli.command {
        Command::Get { .. } => show::<Value>(&accio, key, &cli).await,
        Command::Player { .. } => show::<Player>(&accio, key, &cli).await,
        Command::Players { .. } => show::<PlayerCollection>(&accio, key, &cli).await,
        Command::Leaderboard { page: None, .. } => show::<LeaderboardInfo>(&accio, key, &cli).await,
        Command::Leaderboard { .. } => show::<ScoreCollection>(&accio, key, &cli).await,
        Command::Scores { .. } => show::<PlayerScoreCollection>(&accio, key, &cli).await,
    }
}

fn print_data<D: Serialize + Render>(data: Option<Arc<D>>, format: OutputFormat) {
    if let Some(data) = data {
        if let Err(error) = output::print(&*data, format) {
            logging::ensure_log_error(&error);
        }
    }
}

fn print_error(error: &accio::FetchError) {
    eprintln!("error: {}", error.message());
}

async fn show<D>(accio: &Accio, key: String, cli: &Cli) -> Result<i32>
where
    D: DeserializeOwned + Serialize + Render + Send + Sync + 'static,
{
    let options = UseFetchOptions::default().ignore_subscriptions(!cli.watch);
    let subscription = accio.use_fetch::<D>(key, options);
    subscription.settled().await;

    let error = subscription.error().get();
    if let Some(error) = &error {
        print_error(error);
    }
    print_data(subscription.data().get(), cli.format);

    if !cli.watch {
        return Ok(if error.is_some() { 1 } else { 0 });
    }

    let format = cli.format;
    let _data = subscription
        .data()
        .subscribe(move |data| print_data(data, format));
    let _errors = subscription.error().subscribe(|error| {
        if let Some(error) = error {
            print_error(&error);
        }
    });

    let mut ticker = tokio::time::interval(cli.interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;

    let mut ctrl_c = pin!(tokio::signal::ctrl_c());
    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result.context("failed to listen for ctrl-c")?;
                tracing::debug!("Interrupted, cancelling outstanding requests");
                accio.cancel_signal().renew();
                break;
            }
            _ = ticker.tick() => {
                accio.lifecycle().focus();
            }
        }
    }

    subscription.unsubscribe();
    Ok(0)
}
