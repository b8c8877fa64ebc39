//! interpipe - adaptive interpretation pipeline
//!
//! CLI entry point: start / answer / poll an interpretation session.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::info;

use interpipe::cli::{Cli, Command, OutputFormat, get_log_path};
use interpipe::config::Config;
use interpipe::domain::DiagnosticInput;
use interpipe::pipeline::{AnswerSubmission, PipelineOutcome};
use interpipe::service::{PipelineService, StartRequest};

fn setup_logging(verbose: bool) -> Result<()> {
    let log_path = get_log_path();
    if let Some(dir) = log_path.parent() {
        fs::create_dir_all(dir).context("Failed to create log directory")?;
    }

    // Logs go to the file; stdout stays clean for command output
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(model = %config.llm.model, "interpipe loaded config");

    match cli.command {
        Command::Start {
            run_id,
            diagnostic,
            band,
            priority_focus,
            restart,
            format,
        } => cmd_start(&config, &run_id, &diagnostic, band, priority_focus, restart, format).await,
        Command::Status { run_id, format } => cmd_status(&config, &run_id, format).await,
        Command::Answer {
            run_id,
            answers,
            format,
        } => cmd_answer(&config, &run_id, &answers, format).await,
        Command::Sessions { status, format } => cmd_sessions(&config, status, format).await,
        Command::Metrics { format } => cmd_metrics(&config, format).await,
        Command::Logs { follow, lines } => cmd_logs(follow, lines).await,
    }
}

/// Start (or join) the pipeline for a run
#[allow(clippy::too_many_arguments)]
async fn cmd_start(
    config: &Config,
    run_id: &str,
    diagnostic_path: &Path,
    band: Option<interpipe::domain::CapacityBand>,
    priority_focus: Vec<String>,
    restart: bool,
    format: OutputFormat,
) -> Result<()> {
    config.validate()?;

    let diagnostic = load_diagnostic(diagnostic_path)?;
    let service = PipelineService::from_config(config)?;

    let outcome = service
        .start(StartRequest {
            run_id: run_id.to_string(),
            diagnostic,
            stated_band: band,
            priority_focus,
            restart,
        })
        .await
        .map_err(|e| eyre::eyre!("{}", e))?;

    if outcome.already_in_progress {
        println!("{} Pipeline already exists for this run; showing its state\n", "!".yellow());
    }
    print_outcome(&outcome, &format)
}

/// Poll the persisted pipeline state
async fn cmd_status(config: &Config, run_id: &str, format: OutputFormat) -> Result<()> {
    let service = PipelineService::from_config(config)?;
    let outcome = service.status(run_id).await.map_err(|e| eyre::eyre!("{}", e))?;
    print_outcome(&outcome, &format)
}

/// Submit the outstanding round's answers
async fn cmd_answer(config: &Config, run_id: &str, answers_path: &Path, format: OutputFormat) -> Result<()> {
    config.validate()?;

    let content = fs::read_to_string(answers_path)
        .context(format!("Failed to read answers file {}", answers_path.display()))?;
    let submissions: Vec<AnswerSubmission> =
        serde_json::from_str(&content).context("Failed to parse answers file")?;

    let service = PipelineService::from_config(config)?;
    let outcome = service
        .answer(run_id, submissions)
        .await
        .map_err(|e| eyre::eyre!("{}", e))?;
    print_outcome(&outcome, &format)
}

/// List sessions in the store
async fn cmd_sessions(config: &Config, status: Option<String>, format: OutputFormat) -> Result<()> {
    let service = PipelineService::from_config(config)?;
    let sessions = service.sessions(status).await.map_err(|e| eyre::eyre!("{}", e))?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
        OutputFormat::Text => {
            if sessions.is_empty() {
                println!("No sessions found.");
                return Ok(());
            }
            for session in sessions {
                let updated = chrono::DateTime::from_timestamp_millis(session.updated_at)
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!(
                    "{}  {}  round {}  questions {}  {}  {}",
                    session.run_id.cyan(),
                    colored_status(&session.status.to_string()),
                    session.current_round,
                    session.total_questions_asked,
                    updated,
                    session.id.dimmed()
                );
            }
        }
    }
    Ok(())
}

/// Show aggregate metrics
async fn cmd_metrics(config: &Config, format: OutputFormat) -> Result<()> {
    let service = PipelineService::from_config(config)?;
    let metrics = service.metrics().await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&metrics)?);
        }
        OutputFormat::Text => {
            println!("Pipeline Metrics");
            println!("----------------");
            println!("Total sessions:  {}", metrics.total_sessions);
            println!("  Pending:       {}", metrics.pending);
            println!("  In flight:     {}", metrics.in_flight);
            println!("  Awaiting user: {}", metrics.awaiting_user);
            println!("  Complete:      {}", metrics.complete);
            println!("  Failed:        {}", metrics.failed);
            println!();
            println!("Questions asked: {}", metrics.total_questions_asked);
            println!("Rounds run:      {}", metrics.total_rounds);
        }
    }
    Ok(())
}

/// Show logs
async fn cmd_logs(follow: bool, lines: usize) -> Result<()> {
    let log_path = get_log_path();

    if !log_path.exists() {
        println!("No log file found at: {}", log_path.display());
        return Ok(());
    }

    if follow {
        println!("Following log file: {} (Ctrl+C to stop)", log_path.display());
        println!();

        let mut child = std::process::Command::new("tail")
            .args(["-f", "-n", &lines.to_string()])
            .arg(&log_path)
            .spawn()
            .context("Failed to run tail -f")?;
        child.wait()?;
    } else {
        let file = fs::File::open(&log_path).context("Failed to open log file")?;
        let reader = BufReader::new(file);
        let all_lines: Vec<String> = reader.lines().map_while(Result::ok).collect();

        let start = all_lines.len().saturating_sub(lines);
        for line in &all_lines[start..] {
            println!("{}", line);
        }
    }

    Ok(())
}

/// Read the diagnostic snapshot from a JSON or YAML file
fn load_diagnostic(path: &Path) -> Result<DiagnosticInput> {
    let content = fs::read_to_string(path).context(format!("Failed to read diagnostic file {}", path.display()))?;

    let is_json = path.extension().map(|e| e == "json").unwrap_or(false);
    let diagnostic = if is_json {
        serde_json::from_str(&content).context("Failed to parse diagnostic JSON")?
    } else {
        serde_yaml::from_str(&content).context("Failed to parse diagnostic YAML")?
    };
    Ok(diagnostic)
}

fn colored_status(status: &str) -> ColoredString {
    match status {
        "complete" => status.green(),
        "failed" => status.red(),
        "awaiting_user" => status.yellow(),
        other => other.normal(),
    }
}

/// Render one outcome for the terminal
fn print_outcome(outcome: &PipelineOutcome, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(outcome)?);
            return Ok(());
        }
        OutputFormat::Text => {}
    }

    println!("Run:      {}", outcome.run_id.cyan());
    println!("Session:  {}", outcome.session_id.dimmed());
    println!("Status:   {}", colored_status(&outcome.status.to_string()));
    println!(
        "Progress: round {}, {} questions asked",
        outcome.current_round, outcome.total_questions_asked
    );

    if let Some(error) = &outcome.error {
        println!();
        println!("{} {}", "Error:".red(), error);
        return Ok(());
    }

    if !outcome.questions.is_empty() {
        println!();
        println!("Outstanding questions:");
        for question in &outcome.questions {
            println!("  {} [{}] {}", question.id.yellow(), question.kind, question.text);
            for option in &question.options {
                println!("      - {}", option);
            }
            if !question.rationale.is_empty() {
                println!("      {}", question.rationale.dimmed());
            }
        }
        println!();
        println!("Answer with: ip answer {} --answers <file.json>", outcome.run_id);
    }

    if let Some(report) = &outcome.report {
        println!();
        if report.forced {
            println!("{} Final gate force-accepted this report after one rewrite", "!".yellow());
        }
        for section in &report.draft.sections {
            println!("{}", format!("## {}", section.kind).bold());
            println!("{}", section.body);
            println!();
        }
        println!("{}", "Evidence".bold());
        for evidence in &report.evidence_manifest {
            println!("  {} - {}", evidence.id.cyan(), evidence.source);
        }
        println!();
        println!(
            "{} ({} band{}, {} omitted)",
            "Action plan".bold(),
            report.action_plan.band,
            if report.action_plan.assumed { ", assumed" } else { "" },
            report.action_plan.omitted
        );
        for action in &report.action_plan.actions {
            let flag = if action.over_capacity { " [over capacity]".red().to_string() } else { String::new() };
            println!(
                "  {:>2}. [{}] {}{}",
                action.priority_rank, action.timeline, action.expert_action.title, flag
            );
            println!("      {}", action.rationale.why_selected.dimmed());
        }
    }

    Ok(())
}
