//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// loadsync - run loaders on workers, finish them on one affinity thread
#[derive(Parser)]
#[command(
    name = "loadsync",
    about = "Worker-to-affinity-thread completion coordinator for item loaders",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run simulated loaders against one affinity thread
    Demo {
        /// Number of loaders (overrides demo.loaders)
        #[arg(short = 'n', long)]
        loaders: Option<usize>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Race post-hook attachment against loader completion
    Stress {
        /// Loaders started per round
        #[arg(short, long, default_value_t = 64)]
        tasks: usize,

        /// Number of rounds
        #[arg(short, long, default_value_t = 10)]
        rounds: usize,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the effective configuration
    Config,
}

/// Output format for demo/stress results
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Get the path to the log file
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("loadsync")
        .join("logs")
        .join("loadsync.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["loadsync"]);
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_parse_demo() {
        let cli = Cli::parse_from(["loadsync", "demo", "-n", "3", "--format", "json"]);
        match cli.command {
            Some(Command::Demo { loaders, format }) => {
                assert_eq!(loaders, Some(3));
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("Expected Demo, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_stress_defaults() {
        let cli = Cli::parse_from(["loadsync", "stress"]);
        match cli.command {
            Some(Command::Stress { tasks, rounds, format }) => {
                assert_eq!(tasks, 64);
                assert_eq!(rounds, 10);
                assert_eq!(format, OutputFormat::Text);
            }
            other => panic!("Expected Stress, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from(["loadsync", "config", "-l", "debug", "-c", "/tmp/x.yml"]);
        assert!(matches!(cli.command, Some(Command::Config)));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/x.yml")));
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("TEXT".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("plain".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("table".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_log_path() {
        let path = get_log_path();
        assert!(path.ends_with("loadsync/logs/loadsync.log"));
    }
}
