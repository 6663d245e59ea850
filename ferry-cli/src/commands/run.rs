//! Run command handler
//!
//! Runs the full pipeline for one pushed commit and reports every stage.

use anyhow::Result;
use clap::Args;
use colored::*;
use ferry_core::domain::image::CommitSha;
use ferry_core::domain::log::{LogEntry, LogLevel};
use ferry_core::domain::run::{RunReport, RunState, StageOutcome, StageReport};
use ferry_core::domain::trigger::Trigger;
use ferry_runner::{FerryError, Pipeline, Secrets};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Commit the push landed on
    #[arg(long, env = "GITHUB_SHA")]
    pub commit: String,

    /// Branch the push landed on (defaults to the tracked branch)
    #[arg(long, env = "GITHUB_REF_NAME")]
    pub branch: Option<String>,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// Also write the rendered task definition to this file
    #[arg(long)]
    pub render_output: Option<PathBuf>,

    /// Print the run log even when the run succeeds
    #[arg(long)]
    pub logs: bool,
}

/// Runs the pipeline for the pushed commit
///
/// # Arguments
/// * `tracked` - Branch assumed when the push names none
pub async fn handle_run(
    args: RunArgs,
    tracked: &str,
    pipeline: &Pipeline,
    secrets: &Secrets,
) -> Result<i32> {
    let commit = parse_commit(&args.commit)?;
    let branch = args.branch.unwrap_or_else(|| tracked.to_string());

    let report = pipeline.run(Trigger::new(branch, commit), secrets).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, args.logs || !report.succeeded());
    }

    Ok(report.exit_code)
}

/// A commit that cannot be used as an image tag is a configuration error
fn parse_commit(raw: &str) -> ferry_runner::Result<CommitSha> {
    raw.parse()
        .map_err(|e| FerryError::Config(format!("Invalid commit '{}': {}", raw, e)))
}

fn print_report(report: &RunReport, with_logs: bool) {
    println!(
        "{} {} {} on {}",
        "Run".bold(),
        report.run_id.to_string().dimmed(),
        report.trigger.commit.short().cyan(),
        report.trigger.branch
    );

    if report.state == RunState::Ignored {
        println!(
            "{}",
            format!("Branch {} is not tracked, nothing deployed.", report.trigger.branch).yellow()
        );
        return;
    }

    println!();
    for stage in &report.stages {
        print_stage(stage);
    }
    println!();

    if let Some(image) = &report.image {
        println!("  Image:     {}", image.to_string().cyan());
    }
    if let Some(revision) = &report.revision {
        println!("  Revision:  {}", revision.family_revision().cyan());
    }
    let elapsed = report.finished_at.signed_duration_since(report.started_at);
    println!("  Duration:  {}s", elapsed.num_seconds());
    println!("  Result:    {}", colorize_state(&report.state));

    if with_logs && !report.logs.is_empty() {
        println!("\n{}", "Logs:".bold());
        println!("{}", "─".repeat(80).dimmed());
        for log in &report.logs {
            print_log_entry(log);
        }
        println!("{}", "─".repeat(80).dimmed());
    }
}

fn print_stage(stage: &StageReport) {
    let marker = match &stage.outcome {
        StageOutcome::Succeeded => "✓".green(),
        StageOutcome::Failed { .. } => "✗".red(),
        StageOutcome::Skipped => "-".dimmed(),
    };
    let duration = stage
        .duration()
        .map(|d| format!("{:.1}s", d.num_milliseconds() as f64 / 1000.0))
        .unwrap_or_default();

    println!("  {} {:<26} {}", marker, stage.stage.to_string(), duration.dimmed());

    if let StageOutcome::Failed { error } = &stage.outcome {
        println!("      {}", error.red());
    }
}

fn print_log_entry(log: &LogEntry) {
    let level = log.level.to_string();
    let level_colored = match log.level {
        LogLevel::Debug => level.dimmed(),
        LogLevel::Info => level.cyan(),
        LogLevel::Warning => level.yellow(),
        LogLevel::Error => level.red(),
    };

    println!(
        "{} [{}] {}",
        log.timestamp.format("%H:%M:%S").to_string().dimmed(),
        level_colored,
        log.message
    );
}

fn colorize_state(state: &RunState) -> ColoredString {
    let label = state.to_string();
    match state {
        RunState::Stable => label.green(),
        RunState::Ignored => label.dimmed(),
        RunState::Failed(_) => label.red(),
        _ => label.yellow(),
    }
}
