//! loadsync - CLI entry point
//!
//! Runs simulated loaders and hook races against a real affinity thread.

use std::fs;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use loadsync::affinity::AffinityLoop;
use loadsync::cli::{Cli, Command, OutputFormat, get_log_path};
use loadsync::config::Config;
use loadsync::demo::{DemoRecord, StressReport, run_demo, run_stress};
use loadsync::events::create_event_bus;
use loadsync::library::Library;
use loadsync::loader::LoadOutcome;

fn parse_level(s: &str) -> tracing::Level {
    match s.to_uppercase().as_str() {
        "TRACE" => tracing::Level::TRACE,
        "DEBUG" => tracing::Level::DEBUG,
        "INFO" => tracing::Level::INFO,
        "WARN" | "WARNING" => tracing::Level::WARN,
        "ERROR" => tracing::Level::ERROR,
        _ => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
            tracing::Level::INFO
        }
    }
}

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > default (INFO)
    let level = cli_log_level
        .or(config_log_level)
        .map(parse_level)
        .unwrap_or(tracing::Level::INFO);

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_thread_names(true)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Demo { loaders, format }) => cmd_demo(&config, loaders, format),
        Some(Command::Stress { tasks, rounds, format }) => cmd_stress(&config, tasks, rounds, format),
        Some(Command::Config) => cmd_config(&config),
        None => {
            println!("No command given. Try `loadsync demo` or `loadsync --help`.");
            Ok(())
        }
    }
}

/// Spawn the affinity thread and a library wired to it
fn start_runtime(config: &Config) -> Result<(AffinityLoop, Library)> {
    let affinity = AffinityLoop::spawn(&config.affinity.thread_name).context("Failed to start affinity thread")?;
    let bus = create_event_bus(config.events.capacity);
    let library = Library::in_memory(bus, Arc::new(affinity.dispatcher()));
    Ok((affinity, library))
}

fn cmd_demo(config: &Config, loaders: Option<usize>, format: OutputFormat) -> Result<()> {
    debug!(?loaders, %format, "cmd_demo: called");
    let mut demo = config.demo.clone();
    if let Some(n) = loaders {
        demo.loaders = n;
    }

    let (affinity, library) = start_runtime(config)?;
    let records = run_demo(&demo, &library, &affinity.dispatcher())?;
    affinity.shutdown().context("Affinity thread failed")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        OutputFormat::Text => print_demo(&records),
    }
    Ok(())
}

fn print_demo(records: &[DemoRecord]) {
    for record in records {
        let status = match &record.outcome {
            LoadOutcome::Success => "success".green(),
            LoadOutcome::Failed { .. } => "failed".red(),
            LoadOutcome::Interrupted { .. } => "interrupted".yellow(),
        };
        let detail = record.outcome.error_message().unwrap_or_default();
        println!(
            "{:<40} {:<12} committed={:<4} final={:<4} hook={} {}",
            record.task_id.to_string(),
            status,
            record.committed_items,
            record.final_items,
            if record.hook_ran { "yes" } else { "no" },
            detail.dimmed()
        );
    }

    let succeeded = records.iter().filter(|r| r.outcome.is_success()).count();
    let interrupted = records.iter().filter(|r| r.outcome.is_interrupted()).count();
    let failed = records.len() - succeeded - interrupted;
    println!(
        "\n{} loaders: {} succeeded, {} failed, {} interrupted",
        records.len(),
        succeeded.to_string().green(),
        failed.to_string().red(),
        interrupted.to_string().yellow()
    );
}

fn cmd_stress(config: &Config, tasks: usize, rounds: usize, format: OutputFormat) -> Result<()> {
    debug!(tasks, rounds, %format, "cmd_stress: called");
    let (affinity, library) = start_runtime(config)?;
    let report = run_stress(&library, tasks, rounds)?;
    affinity.shutdown().context("Affinity thread failed")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_stress(&report),
    }

    if !report.is_clean() {
        return Err(eyre::eyre!(
            "post hooks misbehaved: {} lost, {} duplicated, {} second-hook errors",
            report.lost,
            report.duplicated,
            report.second_hook_errors
        ));
    }
    Ok(())
}

fn print_stress(report: &StressReport) {
    println!("tasks:            {}", report.tasks);
    println!("stored hooks:     {}", report.stored);
    println!("immediate hooks:  {}", report.ran_immediately);
    let verdict = if report.is_clean() { "clean".green() } else { "BROKEN".red() };
    println!(
        "lost/dup/second:  {}/{}/{} ({})",
        report.lost, report.duplicated, report.second_hook_errors, verdict
    );
}

fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    print!("{}", serde_yaml::to_string(config).context("Failed to serialize config")?);
    Ok(())
}
