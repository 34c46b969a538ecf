//! Job command handlers
//!
//! Handles job submission (imports and investor reports), status queries
//! and log display.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use croft_client::{JobAccepted, OrchestratorClient};
use croft_core::domain::job::{Job, JobStatus};
use croft_core::domain::log::{LogEntry, LogLevel};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::Config;
use crate::id_resolver::resolve_job_id;
use crate::types::{IdOrPrefix, parse_status};

const WAIT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Job subcommands
#[derive(Subcommand)]
pub enum JobCommands {
    /// Submit a CSV file of production events for import
    Import {
        /// Path to the CSV file
        file: PathBuf,

        /// Wait until the job has finished
        #[arg(short, long)]
        wait: bool,
    },
    /// Request an investor report
    Report {
        /// Wait until the job has finished
        #[arg(short, long)]
        wait: bool,
    },
    /// Get job details
    Get {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// List jobs, newest first
    List {
        /// Only show jobs in this status
        #[arg(long, value_parser = parse_status)]
        status: Option<JobStatus>,
    },
    /// Get job logs
    Logs {
        /// Job ID or unambiguous prefix
        id: String,
    },
}

/// Handle job commands
///
/// Routes job subcommands to their respective handlers.
pub async fn handle_job_command(command: JobCommands, config: &Config) -> Result<()> {
    let client = OrchestratorClient::new(&config.orchestrator_url);

    match command {
        JobCommands::Import { file, wait } => submit_import(&client, &file, wait).await,
        JobCommands::Report { wait } => submit_report(&client, wait).await,
        JobCommands::Get { id } => get_job(&client, &id).await,
        JobCommands::List { status } => list_jobs(&client, status).await,
        JobCommands::Logs { id } => get_job_logs(&client, &id).await,
    }
}

/// Submit a CSV file as an import job
async fn submit_import(client: &OrchestratorClient, file: &Path, wait: bool) -> Result<()> {
    let csv = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let accepted = client
        .submit_import(csv)
        .await
        .context("Failed to submit import")?;

    print_accepted("Import", &accepted);

    if wait {
        wait_and_print(client, &accepted).await?;
    }

    Ok(())
}

/// Submit an investor report job
async fn submit_report(client: &OrchestratorClient, wait: bool) -> Result<()> {
    let accepted = client
        .submit_report()
        .await
        .context("Failed to submit report")?;

    print_accepted("Report", &accepted);

    if wait {
        wait_and_print(client, &accepted).await?;
    }

    Ok(())
}

/// Get and display a single job
async fn get_job(client: &OrchestratorClient, id: &str) -> Result<()> {
    let uuid = resolve_job_id(client, &IdOrPrefix::parse(id)).await?;

    let job = client.get_job(uuid).await?;

    print_job_details(&job);

    Ok(())
}

/// List jobs
async fn list_jobs(client: &OrchestratorClient, status: Option<JobStatus>) -> Result<()> {
    let jobs = client.list_jobs(status).await?;

    if jobs.is_empty() {
        println!("{}", "No jobs found.".yellow());
    } else {
        println!("{}", format!("Found {} job(s):", jobs.len()).bold());
        println!();
        for job in jobs {
            print_job_summary(&job);
        }
    }

    Ok(())
}

/// Get and display job logs
async fn get_job_logs(client: &OrchestratorClient, id: &str) -> Result<()> {
    let uuid = resolve_job_id(client, &IdOrPrefix::parse(id)).await?;

    let logs = client.get_job_logs(uuid).await?;

    if logs.is_empty() {
        println!("{}", "No logs found for this job.".yellow());
    } else {
        println!("{}", format!("Logs for job {}:", uuid).bold());
        println!("{}", "─".repeat(80).dimmed());
        for log in logs {
            print_log_entry(&log);
        }
        println!("{}", "─".repeat(80).dimmed());
    }

    Ok(())
}

/// Poll until the job is finished, then print it
///
/// A failed job makes the command fail too.
async fn wait_and_print(client: &OrchestratorClient, accepted: &JobAccepted) -> Result<()> {
    println!("{}", "Waiting for job to finish...".dimmed());

    let job = client
        .wait_for_job(accepted.job_id, WAIT_POLL_INTERVAL, None)
        .await?;

    println!();
    print_job_details(&job);

    if job.status == JobStatus::Failed {
        anyhow::bail!("Job {} failed", job.id);
    }

    Ok(())
}

fn print_accepted(kind: &str, accepted: &JobAccepted) {
    println!(
        "{} {} job submitted: {}",
        "✓".green(),
        kind,
        accepted.job_id.to_string().cyan()
    );
    println!("  Status: {}", colorize_status(&accepted.status));
}

/// Print a job summary from a full Job object
fn print_job_summary(job: &Job) {
    let status_colored = colorize_status(&job.status);

    println!("  {} Job {}", "▸".cyan(), job.id.to_string().dimmed());
    println!("    Type:     {}", job.job_type);
    println!("    Status:   {}", status_colored);
    println!(
        "    Created:  {}",
        job.created_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    if let Some(worker) = &job.worker_id {
        println!("    Worker:   {}", worker.dimmed());
    }
    println!();
}

/// Print detailed job information
fn print_job_details(job: &Job) {
    let status_colored = colorize_status(&job.status);

    println!("{}", "Job Details:".bold());
    println!("  ID:          {}", job.id.to_string().cyan());
    println!("  Type:        {}", job.job_type);
    println!("  Status:      {}", status_colored);
    println!("  Created:     {}", job.created_at.format("%Y-%m-%d %H:%M:%S"));

    if let Some(started) = job.started_at {
        println!("  Started:     {}", started.format("%Y-%m-%d %H:%M:%S"));
    }

    if let Some(completed) = job.completed_at {
        println!("  Completed:   {}", completed.format("%Y-%m-%d %H:%M:%S"));

        // Calculate duration
        if let Some(started) = job.started_at {
            let duration = completed.signed_duration_since(started);
            println!("  Duration:    {}s", duration.num_seconds());
        }
    }

    if let Some(worker) = &job.worker_id {
        println!("  Worker:      {}", worker);
    }

    if let Some(message) = &job.message {
        println!("\n{}", "Result:".bold());
        println!("  {}", message);
    }

    if let Some(uri) = &job.uri {
        println!("\n{}", "Report:".bold());
        println!("  {}", uri.cyan());
    }

    if let Some(error) = &job.error_message {
        println!("\n{}", "Error:".bold());
        println!("{}", error.red());
    }
}

/// Print a log entry
fn print_log_entry(log: &LogEntry) {
    let level_str = log.level.as_str().to_uppercase();
    let level_colored = match log.level {
        LogLevel::Debug => level_str.dimmed(),
        LogLevel::Info => level_str.cyan(),
        LogLevel::Warning => level_str.yellow(),
        LogLevel::Error => level_str.red(),
    };

    println!(
        "{} [{}] {}",
        log.timestamp.format("%H:%M:%S").to_string().dimmed(),
        level_colored,
        log.message
    );
}

/// Colorize job status for display
fn colorize_status(status: &JobStatus) -> colored::ColoredString {
    let status_str = status.as_str();
    match status {
        JobStatus::Pending => status_str.yellow(),
        JobStatus::Running => status_str.cyan(),
        JobStatus::Completed => status_str.green(),
        JobStatus::Failed => status_str.red(),
    }
}
