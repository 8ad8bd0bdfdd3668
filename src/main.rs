//! lcasearch - H-1B LCA disclosure search
//!
//! A CLI tool that downloads quarterly Labor Condition Application
//! disclosure files and answers job, employer, and sponsor queries
//! over them.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Error (invalid arguments, data unavailable, parse failure, etc.)

mod agency;
mod analysis;
mod ask;
mod cli;
mod config;
mod dataset;
mod error;
mod models;
mod report;
mod service;
mod tools;

use agency::AgencyClassifier;
use anyhow::{anyhow, Context, Result};
use cli::{Args, Command, OutputFormat, SearchArgs};
use config::{Config, CONFIG_FILE};
use dataset::{DatasetCache, HttpSource};
use models::{Period, SearchFilter};
use report::generator;
use serde::Serialize;
use service::H1bService;
use std::path::PathBuf;
use std::sync::Arc;
use tools::{ToolCall, ToolExecutor};
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config is read before logging starts so its verbose setting applies.
    let loaded = load_config(&args);
    let verbose = matches!(loaded, Ok((ref config, _)) if config.general.verbose);
    init_logging(&args, verbose);

    info!("lcasearch v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let result = match loaded {
        Ok((config, source)) => {
            match source {
                ConfigSource::File(path) => info!("Loaded config from {}", path.display()),
                ConfigSource::Defaults => debug!("No config file found, using defaults"),
            }
            run(args, config).await
        }
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        eprintln!("\n❌ Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .lcasearch.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize the cache directory, source URL, and search defaults.");
    Ok(())
}

/// Log level from the CLI flags and the config file's `verbose` setting.
///
/// `--quiet` wins over a verbose config.
fn log_level(args: &Args, config_verbose: bool) -> tracing::Level {
    if config_verbose && !args.quiet {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    }
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config_verbose: bool) {
    let level = log_level(args, config_verbose);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Where the configuration came from.
enum ConfigSource {
    File(PathBuf),
    Defaults,
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so problems are reported on stderr.
fn load_config(args: &Args) -> Result<(Config, ConfigSource)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigSource::File(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigSource::File(PathBuf::from(CONFIG_FILE)))),
        Ok(None) => Ok((Config::default(), ConfigSource::Defaults)),
        Err(e) => {
            eprintln!("⚠️  Failed to load config: {:#}", e);
            Ok((Config::default(), ConfigSource::Defaults))
        }
    }
}

/// Build the service from configuration.
fn build_service(config: &Config, show_progress: bool) -> Result<H1bService> {
    let source = HttpSource::new(config.http_options(show_progress))?;
    let cache = DatasetCache::new(
        config.general.cache_dir.clone(),
        Arc::new(source),
        config.parse_options(),
    );
    let classifier = AgencyClassifier::with_extra(&config.agencies.extra);

    Ok(H1bService::new(
        Arc::new(cache),
        classifier,
        config.service_options(),
    ))
}

/// Run one command.
async fn run(args: Args, mut config: Config) -> Result<()> {
    config.merge_with_args(&args);

    let format = args.format;
    let chatty = format == OutputFormat::Text && !args.quiet;
    let service = Arc::new(build_service(&config, !args.quiet)?);
    let command = args.command.clone().context("A command is required")?;

    // The process is short-lived, so data commands load their period first.
    let period = preload_period(&command)?;
    if let Some(p) = period {
        if chatty {
            println!("📥 Loading disclosure data for {}...", p);
        }
        let summary = service.load_data(p, false).await?;
        if chatty {
            println!("   {} records ready\n", summary.records);
        }
    }

    match command {
        Command::Load { period, force } => {
            let p = Period::from_parts(period.year, period.quarter)?;
            if chatty {
                println!("📥 Loading disclosure data for {}...", p);
            }
            let summary = service.load_data(p, force).await?;
            emit(format, &summary, generator::generate_load_text)?;
        }
        Command::Search { filter, .. } => {
            let filter = search_filter(&filter, &config, config.search.max_results);
            let outcome = service.search_jobs(&filter, period)?;
            emit(format, &outcome, generator::generate_search_text)?;
        }
        Command::Company { name, .. } => {
            let stats = service.company_stats(&name, period)?;
            emit(format, &stats, generator::generate_company_text)?;
        }
        Command::Top {
            limit,
            include_agencies,
            ..
        } => {
            let ranking = service.top_sponsors(limit, !include_agencies, period)?;
            emit(format, &ranking, generator::generate_sponsors_text)?;
        }
        Command::Export {
            filter, filename, ..
        } => {
            let filter = search_filter(&filter, &config, config.search.export_max_results);
            let summary = service.export_results(&filter, &filename, period)?;
            emit(format, &summary, generator::generate_export_text)?;
        }
        Command::Available => {
            let available = service.available_data();
            emit(format, &available, generator::generate_available_text)?;
        }
        Command::Ask { prompt, .. } => {
            let response = service.ask(&prompt.join(" ")).await;
            emit(format, &response, |r| {
                let mut out = format!("🔎 {}\n\n", r.action);
                out.push_str(&serde_json::to_string_pretty(&r.result).unwrap_or_default());
                if !r.suggestions.is_empty() {
                    out.push_str("\n\n💡 Try next:\n");
                    for s in &r.suggestions {
                        out.push_str(&format!("   - {}\n", s));
                    }
                }
                out.push('\n');
                out
            })?;
        }
        Command::Tools => {
            println!("{}", generator::generate_json(&tools::get_tool_definitions())?);
        }
        Command::Call { name, arguments, .. } => {
            let arguments: serde_json::Value =
                serde_json::from_str(&arguments).context("Tool arguments are not valid JSON")?;
            let executor = ToolExecutor::new(service.clone());
            let result = executor.execute(&ToolCall::new(name, arguments)).await;

            println!("{}", generator::generate_json(&result)?);
            if !result.success {
                return Err(anyhow!(result
                    .error
                    .unwrap_or_else(|| "Tool call failed".to_string())));
            }
        }
    }

    Ok(())
}

/// Period to load before running `command`, if it reads data.
fn preload_period(command: &Command) -> Result<Option<Period>> {
    let selected = match command {
        // A load intent picks its own period; listings need no table.
        Command::Ask { period, prompt } => {
            let intent = ask::parse_prompt(&prompt.join(" "));
            intent.reads_data().then_some(period)
        }
        Command::Call {
            period,
            name,
            arguments,
        } => {
            if !tools::reads_data(name) {
                return Ok(None);
            }
            let arguments: serde_json::Value =
                serde_json::from_str(arguments).context("Tool arguments are not valid JSON")?;
            match tools::period_arg(&arguments) {
                Ok(Some(requested)) => return Ok(Some(requested)),
                Ok(None) => Some(period),
                // The executor reports bad period arguments.
                Err(_) => None,
            }
        }
        other => other.data_period(),
    };

    Ok(selected
        .map(|p| Period::from_parts(p.year, p.quarter))
        .transpose()?)
}

/// Build a search filter from CLI flags and configured defaults.
fn search_filter(args: &SearchArgs, config: &Config, default_max: usize) -> SearchFilter {
    SearchFilter {
        job_role: args.job_role.clone(),
        city: args.city.clone(),
        state: args.state.clone(),
        min_wage: args.min_wage,
        skip_agencies: config.search.skip_agencies && !args.include_agencies,
        max_results: args.max_results.unwrap_or(default_max),
        certified_only: args.certified_only,
    }
}

/// Print a result as text or JSON.
fn emit<T: Serialize>(
    format: OutputFormat,
    value: &T,
    text: impl FnOnce(&T) -> String,
) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", generator::generate_json(value)?),
        OutputFormat::Text => print!("{}", text(value)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn command(argv: &[&str]) -> Command {
        Args::try_parse_from(argv).unwrap().command.unwrap()
    }

    fn q(year: i32, quarter: u8) -> Option<Period> {
        Some(Period::new(year, quarter).unwrap())
    }

    #[test]
    fn test_config_verbose_raises_log_level() {
        let args = Args::try_parse_from(["lcasearch", "available"]).unwrap();
        assert_eq!(log_level(&args, false), tracing::Level::INFO);
        assert_eq!(log_level(&args, true), tracing::Level::DEBUG);

        let quiet = Args::try_parse_from(["lcasearch", "available", "--quiet"]).unwrap();
        assert_eq!(log_level(&quiet, true), tracing::Level::ERROR);
    }

    #[test]
    fn test_load_config_reports_source() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[general]\nverbose = true\n").unwrap();

        let path_arg = path.to_string_lossy().into_owned();
        let args = Args::try_parse_from(["lcasearch", "available", "--config", path_arg.as_str()])
            .unwrap();
        let (config, source) = load_config(&args).unwrap();
        assert!(config.general.verbose);
        assert!(matches!(source, ConfigSource::File(p) if p == path));
    }

    #[test]
    fn test_preload_for_data_commands() {
        let cmd = command(&["lcasearch", "top", "--year", "2023", "--quarter", "2"]);
        assert_eq!(preload_period(&cmd).unwrap(), q(2023, 2));

        let cmd = command(&["lcasearch", "available"]);
        assert_eq!(preload_period(&cmd).unwrap(), None);
    }

    #[test]
    fn test_preload_for_ask_follows_intent() {
        let cmd = command(&["lcasearch", "ask", "load h1b data for 2023 q1"]);
        assert_eq!(preload_period(&cmd).unwrap(), None);

        let cmd = command(&["lcasearch", "ask", "which quarters are available"]);
        assert_eq!(preload_period(&cmd).unwrap(), None);

        let cmd = command(&["lcasearch", "ask", "--quarter", "3", "top 10 sponsors"]);
        assert_eq!(preload_period(&cmd).unwrap(), q(2024, 3));
    }

    #[test]
    fn test_preload_for_call() {
        let cmd = command(&["lcasearch", "call", "search_h1b_jobs", r#"{"job_role": "x"}"#]);
        assert_eq!(preload_period(&cmd).unwrap(), q(2024, 4));

        let cmd = command(&[
            "lcasearch",
            "call",
            "get_top_sponsors",
            r#"{"year": 2022, "quarter": 1}"#,
            "--quarter",
            "3",
        ]);
        assert_eq!(preload_period(&cmd).unwrap(), q(2022, 1));

        let cmd = command(&["lcasearch", "call", "get_top_sponsors", r#"{"year": 2022}"#]);
        assert_eq!(preload_period(&cmd).unwrap(), None);

        let cmd = command(&["lcasearch", "call", "load_h1b_data", "{}"]);
        assert_eq!(preload_period(&cmd).unwrap(), None);
    }
}
