//! Runtime configuration for disctool
//!
//! Values are read from environment variables with sensible defaults. The CLI
//! can override the data directory after loading.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;

/// Default Discogs API endpoint
pub const DEFAULT_API_BASE: &str = "https://api.discogs.com";

/// Default User-Agent sent with every request
pub const DEFAULT_USER_AGENT: &str = "disctool/0.1";

/// Default maximum age, in days, of a reusable marketplace record
pub const DEFAULT_MAX_AGE_DAYS: i64 = 7;

/// Name of the SQLite database file inside the data directory
const DATABASE_FILE: &str = "disctool.db";

/// Name of the credential file inside the data directory
const AUTH_FILE: &str = "discogs_auth";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the database, credentials and downloaded artwork
    pub data_dir: PathBuf,
    /// Base URL of the Discogs API
    pub api_base: String,
    /// User-Agent header value
    pub user_agent: String,
    /// OAuth consumer key for this application
    pub consumer_key: String,
    /// OAuth consumer secret for this application
    pub consumer_secret: String,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    /// Maximum age of a reusable marketplace record, in days
    pub max_age_days: i64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `DISCTOOL_HOME` - Data directory (default: XDG data dir for `disctool`)
    /// - `DISCOGS_API_BASE` - API base URL (default: `https://api.discogs.com`)
    /// - `DISCOGS_USER_AGENT` - User-Agent header (default: `disctool/0.1`)
    /// - `DISCOGS_CONSUMER_KEY` / `DISCOGS_CONSUMER_SECRET` - OAuth application credentials
    /// - `DISCTOOL_TIMEOUT_SECS` - HTTP timeout in seconds (default: 30)
    /// - `DISCTOOL_MAX_AGE_DAYS` - Marketplace record max age (default: 7)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: env::var("DISCTOOL_HOME")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            api_base: env::var("DISCOGS_API_BASE")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.api_base),
            user_agent: env::var("DISCOGS_USER_AGENT")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.user_agent),
            consumer_key: env::var("DISCOGS_CONSUMER_KEY").unwrap_or_default(),
            consumer_secret: env::var("DISCOGS_CONSUMER_SECRET").unwrap_or_default(),
            request_timeout: env::var("DISCTOOL_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            max_age_days: env::var("DISCTOOL_MAX_AGE_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_age_days),
        }
    }

    /// Replaces the data directory, e.g. from a `--data-dir` flag
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Path of the SQLite response cache
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    /// Path of the persisted `token|secret` credential file
    pub fn auth_path(&self) -> PathBuf {
        self.data_dir.join(AUTH_FILE)
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = ProjectDirs::from("", "", "disctool")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".disctool"));
        Self {
            data_dir,
            api_base: DEFAULT_API_BASE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            consumer_key: String::new(),
            consumer_secret: String::new(),
            request_timeout: Duration::from_secs(30),
            max_age_days: DEFAULT_MAX_AGE_DAYS,
        }
    }
}
