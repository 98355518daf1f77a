//! Application configuration.

use std::path::PathBuf;

use clap::Parser;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::domain::errors::ProxyError;

const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "pixelgate";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Proxy configuration, parsed from CLI flags or environment by the
/// embedding process.
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = crate::NAME, version = crate::VERSION)]
pub struct ProxyConfig {
    /// Cache directory; defaults to the platform cache location.
    #[arg(long, env = "PIXELGATE_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Maximum number of cache entries before oldest-first eviction.
    #[arg(long, env = "PIXELGATE_MAX_CACHE_ENTRIES", default_value_t = 100)]
    #[serde(default = "default_max_cache_entries")]
    pub max_cache_entries: usize,

    /// Upstream fetch timeout in seconds.
    #[arg(long, env = "PIXELGATE_FETCH_TIMEOUT_SECS", default_value_t = 5)]
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Operator kill switch; when false every request is answered 503.
    #[arg(
        long,
        env = "PIXELGATE_SERVE_REQUESTS",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    #[serde(default = "default_true")]
    pub serve_requests: bool,

    /// Source URL used when a request omits `image_url`.
    #[arg(
        long,
        env = "PIXELGATE_DEFAULT_IMAGE_URL",
        default_value = "https://cdn.om-mishra.com/logo.png"
    )]
    #[serde(default = "default_image_url")]
    pub default_image_url: String,

    /// Bound on concurrent CPU-heavy decode/transform/encode work.
    #[arg(long, env = "PIXELGATE_MAX_CONCURRENT_TRANSFORMS", default_value_t = 4)]
    #[serde(default = "default_max_concurrent_transforms")]
    pub max_concurrent_transforms: usize,

    /// Log verbosity level.
    #[arg(long, env = "PIXELGATE_LOG_LEVEL", value_enum, default_value_t)]
    #[serde(default)]
    pub log_level: LogLevel,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            max_cache_entries: default_max_cache_entries(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            serve_requests: true,
            default_image_url: default_image_url(),
            max_concurrent_transforms: default_max_concurrent_transforms(),
            log_level: LogLevel::default(),
        }
    }
}

impl ProxyConfig {
    /// Resolves the cache directory: the configured path, the platform
    /// cache location, or a temp-dir fallback.
    #[must_use]
    pub fn effective_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, crate::NAME).map_or_else(
                || std::env::temp_dir().join(crate::NAME).join("cache"),
                |dirs| dirs.cache_dir().join("sources"),
            )
        })
    }

    /// Fetch timeout as a [`std::time::Duration`].
    #[must_use]
    pub const fn fetch_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Initializes tracing with an env-filter honoring `RUST_LOG`, falling back
/// to the configured level. Intended to be called once by the embedding
/// process.
///
/// # Errors
/// Returns error if a global subscriber is already installed.
pub fn init_logging(config: &ProxyConfig) -> Result<(), ProxyError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(ProxyError::internal)
}

fn default_max_cache_entries() -> usize {
    100
}

fn default_fetch_timeout_secs() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

fn default_image_url() -> String {
    "https://cdn.om-mishra.com/logo.png".to_owned()
}

fn default_max_concurrent_transforms() -> usize {
    4
}
