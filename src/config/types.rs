use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for Forum-Archiver
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub forum: ForumConfig,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// User agent sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Deadline for a single request (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Deadline for establishing a connection (seconds)
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Session cookie header handed over by the login flow
    #[serde(default)]
    pub cookie: Option<String>,
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// How many interstitial listing pages may be followed for one attachment
    #[serde(
        rename = "max-interstitial-depth",
        default = "default_max_interstitial_depth"
    )]
    pub max_interstitial_depth: u32,

    /// Extra attempts for transient fetch failures (0 disables retry)
    #[serde(rename = "retry-attempts", default)]
    pub retry_attempts: u32,

    /// Initial backoff between retries (milliseconds), doubled per attempt
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Write buffer size used while streaming attachments to disk (bytes)
    #[serde(rename = "chunk-size", default = "default_chunk_size")]
    pub chunk_size: usize,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory that receives one sub-directory per thread
    #[serde(rename = "save-root")]
    pub save_root: PathBuf,

    /// Ledger file name, relative to `save-root` unless absolute
    #[serde(rename = "ledger-file", default = "default_ledger_file")]
    pub ledger_file: PathBuf,
}

/// Forum entry point configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForumConfig {
    /// First listing page of the crawl
    #[serde(rename = "start-url", default)]
    pub start_url: Option<String>,
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl CrawlerConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl OutputConfig {
    /// Full path of the ledger database
    pub fn ledger_path(&self) -> PathBuf {
        self.ledger_path_in(&self.save_root)
    }

    /// Ledger path for a save root other than the configured one
    pub fn ledger_path_in(&self, save_root: &Path) -> PathBuf {
        if self.ledger_file.is_absolute() {
            self.ledger_file.clone()
        } else {
            save_root.join(&self.ledger_file)
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            cookie: None,
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_interstitial_depth: default_max_interstitial_depth(),
            retry_attempts: 0,
            retry_delay_ms: default_retry_delay_ms(),
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_user_agent() -> String {
    format!("ForumArchiver/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_interstitial_depth() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_chunk_size() -> usize {
    8192
}

fn default_ledger_file() -> PathBuf {
    PathBuf::from("ledger.db")
}
