use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use sentry::types::Dsn;
use serde::{Deserialize, Deserializer, de};
use tracing::level_filters::LevelFilter;
use url::Url;

/// The public ScoreSaber instance.
pub const DEFAULT_API_URL: &str = "https://scoresaber.com";

/// Controls the log format
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect (pretty for tty, simplified for other)
    Auto,
    /// With colors
    Pretty,
    /// Simplified log output
    Simplified,
    /// Dump out JSON lines
    Json,
}

/// Controls the logging system.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Logging {
    /// The log level.
    #[serde(deserialize_with = "deserialize_level_filter")]
    pub level: LevelFilter,
    /// Controls the log format.
    pub format: LogFormat,
    /// When set to true, backtraces are forced on.
    pub enable_backtraces: bool,
}

impl Default for Logging {
    fn default() -> Self {
        Logging {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
            enable_backtraces: false,
        }
    }
}

/// Control the metrics.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Metrics {
    /// host/port of statsd instance
    pub statsd: Option<String>,
    /// The prefix that should be added to all metrics.
    pub prefix: String,
    /// A map containing custom tags and their values.
    ///
    /// These tags will be appended to every metric.
    pub custom_tags: BTreeMap<String, String>,
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics {
            statsd: env::var("STATSD_SERVER").ok(),
            prefix: "accio".into(),
            custom_tags: BTreeMap::new(),
        }
    }
}

/// Controls the response cache.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a successful response is served from the cache.
    ///
    /// Defaults to `10m`, or to the `CACHE_EXPIRY_IN_MINUTES` environment variable.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,

    /// Maximum number of cached responses.
    ///
    /// The cache is unbounded by default. Its size is then bounded by the number of distinct
    /// resources visited, which is fine for interactive use but may grow in long-running
    /// processes.
    pub capacity: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: ttl_from_minutes(env::var("CACHE_EXPIRY_IN_MINUTES").ok().as_deref()),
            capacity: None,
        }
    }
}

/// Parses a TTL given in whole minutes, falling back to 10 minutes.
fn ttl_from_minutes(minutes: Option<&str>) -> Duration {
    let minutes: u64 = minutes
        .and_then(|minutes| minutes.trim().parse().ok())
        .unwrap_or(10);
    Duration::from_secs(minutes.saturating_mul(60))
}

/// Controls background revalidation on lifecycle events.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct RevalidateConfig {
    /// Minimum time between two lifecycle-triggered revalidations of the same subscription.
    #[serde(with = "humantime_serde")]
    pub debounce: Duration,
}

impl Default for RevalidateConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(5),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL that resource keys starting with `/` are resolved against.
    ///
    /// Defaults to the `API_URL` environment variable, or [`DEFAULT_API_URL`].
    pub api_url: Option<Url>,

    /// Sent as `Cookie` header with requests that include credentials.
    pub session_cookie: Option<String>,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Lifecycle revalidation settings.
    pub revalidate: RevalidateConfig,

    /// The timeout for establishing a connection.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Global timeout for one request, including reading the body.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Configuration for internal logging.
    pub logging: Logging,

    /// Configuration for reporting metrics to a statsd instance.
    pub metrics: Metrics,

    /// DSN to report internal errors to
    pub sentry_dsn: Option<Dsn>,
}

fn default_api_url() -> Option<Url> {
    let url = env::var("API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_owned());
    match Url::parse(&url) {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::error!(error = %e, url = %url, "Invalid API_URL");
            None
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: default_api_url(),
            session_cookie: None,
            cache: CacheConfig::default(),
            revalidate: RevalidateConfig::default(),
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
            logging: Logging::default(),
            metrics: Metrics::default(),
            sentry_dsn: None,
        }
    }
}

impl Config {
    pub fn get(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_reader(
                fs::File::open(path).context("failed to open configuration file")?,
            ),
            None => Ok(Config::default()),
        }
    }

    fn from_reader(mut reader: impl std::io::Read) -> Result<Self> {
        let mut config = String::new();
        reader
            .read_to_string(&mut config)
            .context("failed reading config file")?;
        // check for empty files explicitly
        if config.trim().is_empty() {
            anyhow::bail!("config file empty");
        }
        serde_yaml::from_str(&config).context("failed to parse config YAML")
    }
}

#[derive(Debug)]
struct LevelFilterVisitor;

impl de::Visitor<'_> for LevelFilterVisitor {
    type Value = LevelFilter;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> std::fmt::Result {
        write!(
            formatter,
            r#"one of the strings "off", "error", "warn", "info", "debug", or "trace""#
        )
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        match v {
            "off" => Ok(LevelFilter::OFF),
            "error" => Ok(LevelFilter::ERROR),
            "warn" => Ok(LevelFilter::WARN),
            "info" => Ok(LevelFilter::INFO),
            "debug" => Ok(LevelFilter::DEBUG),
            "trace" => Ok(LevelFilter::TRACE),
            _ => Err(de::Error::unknown_variant(
                v,
                &["off", "error", "warn", "info", "debug", "trace"],
            )),
        }
    }
}

fn deserialize_level_filter<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<LevelFilter, D::Error> {
    deserializer.deserialize_str(LevelFilterVisitor)
}
