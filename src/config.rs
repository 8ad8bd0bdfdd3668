//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.lcasearch.toml` files.

use crate::dataset::{HttpSourceOptions, ParseOptions};
use crate::service::ServiceOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration filename.
pub const CONFIG_FILE: &str = ".lcasearch.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Remote source settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Search and aggregation settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Agency classification settings.
    #[serde(default)]
    pub agencies: AgencyConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory downloaded source files are cached in.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Directory exports are written to. Defaults to the cache directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_dir: Option<PathBuf>,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            export_dir: None,
            verbose: false,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("data_cache")
}

/// Where and how disclosure files are downloaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// URL template with `{year}` and `{quarter}` placeholders.
    #[serde(default = "default_url_template")]
    pub url_template: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Download attempts before giving up.
    #[serde(default = "default_retries")]
    pub retries: usize,

    /// Base delay between attempts in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Keep at most this many records per period.
    #[serde(default = "default_max_rows")]
    pub max_rows: Option<usize>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url_template: default_url_template(),
            timeout_seconds: default_timeout(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            max_rows: default_max_rows(),
        }
    }
}

fn default_url_template() -> String {
    HttpSourceOptions::default().url_template
}

fn default_timeout() -> u64 {
    60
}

fn default_retries() -> usize {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_max_rows() -> Option<usize> {
    Some(100_000)
}

/// Search and aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Result cap for searches.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Hide staffing agencies unless asked otherwise.
    #[serde(default = "default_true")]
    pub skip_agencies: bool,

    /// Result cap for exports.
    #[serde(default = "default_export_max_results")]
    pub export_max_results: usize,

    #[serde(default = "default_top_job_titles")]
    pub top_job_titles: usize,

    #[serde(default = "default_top_locations")]
    pub top_locations: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            skip_agencies: true,
            export_max_results: default_export_max_results(),
            top_job_titles: default_top_job_titles(),
            top_locations: default_top_locations(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_results() -> usize {
    50
}

fn default_export_max_results() -> usize {
    1000
}

fn default_top_job_titles() -> usize {
    10
}

fn default_top_locations() -> usize {
    5
}

/// Agency classification settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgencyConfig {
    /// Extra employer-name substrings treated as agencies.
    #[serde(default)]
    pub extra: Vec<String>,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref dir) = args.cache_dir {
            self.general.cache_dir = dir.clone();
        }
        if let Some(ref url) = args.source_url {
            self.source.url_template = url.clone();
        }
        if let Some(max_rows) = args.max_rows {
            self.source.max_rows = if max_rows == 0 { None } else { Some(max_rows) };
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Directory exports are written to.
    pub fn export_dir(&self) -> PathBuf {
        self.general
            .export_dir
            .clone()
            .unwrap_or_else(|| self.general.cache_dir.clone())
    }

    /// HTTP source options derived from the `[source]` section.
    pub fn http_options(&self, show_progress: bool) -> HttpSourceOptions {
        HttpSourceOptions {
            url_template: self.source.url_template.clone(),
            timeout_seconds: self.source.timeout_seconds,
            retries: self.source.retries,
            retry_delay: Duration::from_millis(self.source.retry_delay_ms),
            show_progress,
        }
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            max_rows: self.source.max_rows,
            ..ParseOptions::default()
        }
    }

    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions {
            export_dir: self.export_dir(),
            top_job_titles: self.search.top_job_titles,
            top_locations: self.search.top_locations,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
