//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// interpipe - adaptive interpretation pipeline
#[derive(Parser)]
#[command(
    name = "ip",
    version,
    about = "Adaptive interpretation pipeline for maturity assessments",
    after_help = "Logs are written to: ~/.local/share/interpipe/logs/interpipe.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Start (or join) the pipeline for an assessment run
    Start {
        /// Assessment run ID
        #[arg(value_name = "RUN_ID")]
        run_id: String,

        /// Diagnostic input file (JSON or YAML) from the scoring side
        #[arg(short, long)]
        diagnostic: PathBuf,

        /// Stated capacity band (low, medium, high); inferred if omitted
        #[arg(short, long)]
        band: Option<crate::domain::CapacityBand>,

        /// Objective IDs to prioritize in the action plan (repeatable)
        #[arg(long = "focus")]
        priority_focus: Vec<String>,

        /// Delete a complete session and run again from scratch
        #[arg(long)]
        restart: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the current pipeline state for a run (the poll endpoint)
    Status {
        /// Assessment run ID
        #[arg(value_name = "RUN_ID")]
        run_id: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Submit answers for the outstanding question round
    Answer {
        /// Assessment run ID
        #[arg(value_name = "RUN_ID")]
        run_id: String,

        /// JSON file with the round's answers
        #[arg(short, long)]
        answers: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List sessions in the store
    Sessions {
        /// Filter by status (pending, awaiting_user, complete, ...)
        #[arg(short, long)]
        status: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show aggregate pipeline metrics
    Metrics {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show pipeline logs
    Logs {
        /// Follow log output (like tail -f)
        #[arg(short, long)]
        follow: bool,

        /// Number of lines to show
        #[arg(short, long, default_value = "50")]
        lines: usize,
    },
}

/// Output format for CLI commands
#[derive(Clone, Debug, Default)]
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

/// Path to the log file
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("interpipe")
        .join("logs")
        .join("interpipe.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_from_str() {
        assert!(matches!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text)));
        assert!(matches!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json)));
        assert!("csv".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_cli_parses_start() {
        let cli = Cli::try_parse_from([
            "ip", "start", "run-42", "--diagnostic", "diag.json", "--band", "low", "--focus", "gov.roles",
        ])
        .unwrap();
        match cli.command {
            Command::Start {
                run_id,
                band,
                priority_focus,
                restart,
                ..
            } => {
                assert_eq!(run_id, "run-42");
                assert_eq!(band, Some(crate::domain::CapacityBand::Low));
                assert_eq!(priority_focus, vec!["gov.roles"]);
                assert!(!restart);
            }
            _ => panic!("Expected start command"),
        }
    }

    #[test]
    fn test_cli_parses_answer() {
        let cli = Cli::try_parse_from(["ip", "answer", "run-42", "--answers", "answers.json", "--format", "json"])
            .unwrap();
        assert!(matches!(cli.command, Command::Answer { .. }));
    }
}
