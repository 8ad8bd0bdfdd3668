//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// lcasearch - query H-1B LCA disclosure data
///
/// Download quarterly Labor Condition Application disclosures from the
/// U.S. Department of Labor, then search jobs, inspect employers, and rank
/// sponsors. Built in Rust.
///
/// Examples:
///   lcasearch load --year 2024 --quarter 4
///   lcasearch search "software engineer" --state WA --min-wage 150000
///   lcasearch company Google
///   lcasearch top --limit 10
///   lcasearch ask "Find data scientist jobs in Austin, TX"
///   lcasearch --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .lcasearch.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Directory downloaded disclosure files are cached in
    #[arg(long, value_name = "DIR", env = "LCASEARCH_CACHE_DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Source URL template with {year} and {quarter} placeholders
    #[arg(long, value_name = "URL", env = "LCASEARCH_SOURCE_URL", global = true)]
    pub source_url: Option<String>,

    /// Keep at most this many records per period (0 for no limit)
    #[arg(long, value_name = "ROWS", global = true)]
    pub max_rows: Option<usize>,

    /// Output format (text, json)
    #[arg(long, default_value = "text", value_name = "FORMAT", global = true)]
    pub format: OutputFormat,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Generate a default .lcasearch.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Period selection shared by data commands.
#[derive(clap::Args, Debug, Clone)]
pub struct PeriodArgs {
    /// Fiscal year
    #[arg(long, default_value = "2024")]
    pub year: i64,

    /// Quarter (1-4)
    #[arg(long, default_value = "4")]
    pub quarter: i64,
}

/// Filters shared by `search` and `export`.
#[derive(clap::Args, Debug, Clone)]
pub struct SearchArgs {
    /// Job title to search for (case-insensitive, partial match)
    pub job_role: String,

    /// City filter (partial match)
    #[arg(long)]
    pub city: Option<String>,

    /// Two-letter state code
    #[arg(long)]
    pub state: Option<String>,

    /// Minimum annualized wage
    #[arg(long, value_name = "AMOUNT")]
    pub min_wage: Option<f64>,

    /// Maximum results (default: from config)
    #[arg(long, value_name = "COUNT")]
    pub max_results: Option<usize>,

    /// Keep staffing agencies and consultancies in the results
    #[arg(long)]
    pub include_agencies: bool,

    /// Only include certified applications
    #[arg(long)]
    pub certified_only: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Download (or reuse) and load the disclosure file for a period
    Load {
        #[command(flatten)]
        period: PeriodArgs,

        /// Download again even if a cached file exists
        #[arg(long)]
        force: bool,
    },

    /// Search jobs by role, location, and wage
    Search {
        #[command(flatten)]
        period: PeriodArgs,

        #[command(flatten)]
        filter: SearchArgs,
    },

    /// Sponsorship statistics for one company
    Company {
        #[command(flatten)]
        period: PeriodArgs,

        /// Company name (exact or partial)
        name: String,
    },

    /// Rank employers by application count
    Top {
        #[command(flatten)]
        period: PeriodArgs,

        /// Number of companies to list
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Keep staffing agencies in the ranking
        #[arg(long)]
        include_agencies: bool,
    },

    /// Export search results to CSV
    Export {
        #[command(flatten)]
        period: PeriodArgs,

        #[command(flatten)]
        filter: SearchArgs,

        /// Output filename, relative to the export directory
        #[arg(long, default_value = "h1b_results.csv", value_name = "FILE")]
        filename: String,
    },

    /// List requestable periods and local cache state
    Available,

    /// Ask in plain words, e.g. "top 10 sponsors"
    ///
    /// The period is loaded first only when the prompt queries data.
    Ask {
        #[command(flatten)]
        period: PeriodArgs,

        /// The prompt
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },

    /// Print tool definitions as JSON
    Tools,

    /// Execute one tool call
    ///
    /// Data tools load a period first: `year`/`quarter` from the arguments
    /// when given, else the --year/--quarter flags.
    Call {
        #[command(flatten)]
        period: PeriodArgs,

        /// Tool name
        name: String,

        /// JSON object of arguments
        #[arg(default_value = "{}")]
        arguments: String,
    },
}

impl Command {
    /// Period to load before running, for commands that always read data.
    ///
    /// `ask` and `call` decide from their prompt or tool name.
    pub fn data_period(&self) -> Option<&PeriodArgs> {
        match self {
            Command::Search { period, .. }
            | Command::Company { period, .. }
            | Command::Top { period, .. }
            | Command::Export { period, .. } => Some(period),
            _ => None,
        }
    }

    /// Any period selected on the command line.
    pub fn period_args(&self) -> Option<&PeriodArgs> {
        match self {
            Command::Load { period, .. }
            | Command::Ask { period, .. }
            | Command::Call { period, .. } => Some(period),
            other => other.data_period(),
        }
    }
}

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text (default)
    #[default]
    Text,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        let Some(ref command) = self.command else {
            return Err("A command is required (try --help)".to_string());
        };

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref url) = self.source_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Source URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(period) = command.period_args() {
            if !(1..=4).contains(&period.quarter) {
                return Err("Quarter must be between 1 and 4".to_string());
            }
        }

        match command {
            Command::Search { filter, .. } | Command::Export { filter, .. } => {
                if filter.max_results == Some(0) {
                    return Err("Max results must be at least 1".to_string());
                }
                if filter.min_wage.is_some_and(|w| w < 0.0) {
                    return Err("Minimum wage cannot be negative".to_string());
                }
            }
            Command::Top { limit, .. } if *limit == 0 => {
                return Err("Limit must be at least 1".to_string());
            }
            Command::Call { arguments, .. } => {
                let parsed: serde_json::Value = serde_json::from_str(arguments)
                    .map_err(|e| format!("Tool arguments are not valid JSON: {}", e))?;
                if !parsed.is_object() {
                    return Err("Tool arguments must be a JSON object".to_string());
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
