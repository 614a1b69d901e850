//! Task scheduler CLI - runs the poller and manages tasks.

mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{info, warn};

use config::Settings;
use tasksched_core::{LogEntry, ScheduleId, TaskId, TaskStatus, TaskUpdate, Time};
use tasksched_execution::{CycleReport, ExecutionEngine, Poller, TaskService, DEFAULT_LOG_LIMIT};
use tasksched_notify::{Mailer, NotificationGateway, Notifier, SmtpMailer, TracingMailer};
use tasksched_storage::SqliteStorage;

#[derive(Parser)]
#[command(name = "tasksched", version)]
#[command(about = "Runs scheduled tasks and emails their owners", long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the poller until interrupted
    Serve,
    /// Run a single execution cycle and exit
    RunOnce,
    /// Manage users
    #[command(subcommand)]
    User(UserCommand),
    /// Manage tasks
    #[command(subcommand)]
    Task(TaskCommand),
    /// Show audit log entries
    Logs {
        /// Owner email
        #[arg(long)]
        user: String,
        /// Only this task (includes stats)
        #[arg(long)]
        task: Option<TaskId>,
        /// Max entries
        #[arg(long, default_value_t = DEFAULT_LOG_LIMIT)]
        limit: usize,
    },
    /// Show the next schedules due
    Upcoming {
        /// Owner email
        #[arg(long)]
        user: String,
        /// Max entries
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum UserCommand {
    /// Register a user
    Add {
        /// Display name
        name: String,
        /// Email address
        email: String,
    },
}

#[derive(Subcommand)]
enum TaskCommand {
    /// Create a task and schedule it
    Add {
        /// Owner email
        #[arg(long)]
        user: String,
        /// Title
        title: String,
        /// When to run: RFC 3339 or relative like +30m, +2h, +1d
        #[arg(long, value_parser = parse_when)]
        at: Time,
        /// Description
        #[arg(long)]
        description: Option<String>,
    },
    /// List tasks
    List {
        /// Owner email
        #[arg(long)]
        user: String,
        /// Filter by status
        #[arg(long)]
        status: Option<TaskStatus>,
    },
    /// Show a task with its schedules
    Show {
        /// Owner email
        #[arg(long)]
        user: String,
        /// Task ID
        id: TaskId,
    },
    /// Edit a task
    Update {
        /// Owner email
        #[arg(long)]
        user: String,
        /// Task ID
        id: TaskId,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New description
        #[arg(long)]
        description: Option<String>,
        /// New status
        #[arg(long)]
        status: Option<TaskStatus>,
    },
    /// Move a schedule to a new time
    Reschedule {
        /// Owner email
        #[arg(long)]
        user: String,
        /// Schedule ID
        schedule: ScheduleId,
        /// New time: RFC 3339 or relative like +30m
        #[arg(long, value_parser = parse_when)]
        at: Time,
    },
    /// Delete a task with its schedules and logs
    Delete {
        /// Owner email
        #[arg(long)]
        user: String,
        /// Task ID
        id: TaskId,
    },
    /// Delete a single schedule
    Unschedule {
        /// Owner email
        #[arg(long)]
        user: String,
        /// Schedule ID
        schedule: ScheduleId,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(cli.settings.env_filter())
        .init();

    let store = Arc::new(
        SqliteStorage::new(&cli.settings.database_url)
            .await
            .with_context(|| format!("failed to open {}", cli.settings.database_url))?,
    );
    let notifier = build_notifier(&cli.settings).await?;

    let result = run(&cli, store.clone(), notifier).await;
    store.close().await;
    result
}

async fn build_notifier(settings: &Settings) -> Result<Arc<dyn Notifier>> {
    let mailer: Arc<dyn Mailer> = match settings.smtp() {
        Some(smtp) => {
            let mailer = SmtpMailer::new(&smtp).context("invalid email settings")?;
            mailer.verify().await;
            Arc::new(mailer)
        }
        None => {
            warn!("EMAIL_USER not set, emails will be logged instead of sent");
            Arc::new(TracingMailer)
        }
    };
    Ok(Arc::new(NotificationGateway::new(mailer)))
}

async fn run(cli: &Cli, store: Arc<SqliteStorage>, notifier: Arc<dyn Notifier>) -> Result<()> {
    let service = TaskService::new(store.clone(), notifier.clone());

    match &cli.command {
        Commands::Serve => {
            let engine = ExecutionEngine::new(store, notifier).with_config(cli.settings.engine());
            let poller = Poller::new(Arc::new(engine), cli.settings.cron_schedule.clone());

            poller.start();
            info!("Poller status: {}", serde_json::to_string(&poller.status())?);
            info!("Task scheduler running, press Ctrl-C to stop");
            tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;

            info!("Shutting down...");
            poller.stop().await;
        }
        Commands::RunOnce => {
            let engine = ExecutionEngine::new(store, notifier).with_config(cli.settings.engine());
            let report = engine.run_cycle().await?;
            print_report(&report, cli.json)?;
        }
        Commands::User(UserCommand::Add { name, email }) => {
            let user = service.register_user(name, email).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&user)?);
            } else {
                println!("Registered user: {} <{}> ({})", user.name, user.email, user.id);
            }
        }
        Commands::Task(command) => run_task(command, &service, cli.json).await?,
        Commands::Logs { user, task, limit } => {
            let user = service.find_user(user).await?;
            match task {
                Some(task_id) => {
                    let logs = service.task_logs(user.id, *task_id, *limit).await?;
                    if cli.json {
                        println!("{}", serde_json::to_string_pretty(&logs)?);
                        return Ok(());
                    }
                    println!(
                        "Executions: {} ({} succeeded, {} failed), emails sent: {}",
                        logs.stats.total_executions,
                        logs.stats.successful,
                        logs.stats.failed,
                        logs.stats.emails_sent,
                    );
                    print_logs(&logs.logs);
                }
                None => {
                    let logs = service.user_logs(user.id, *limit).await?;
                    if cli.json {
                        println!("{}", serde_json::to_string_pretty(&logs)?);
                    } else {
                        print_logs(&logs);
                    }
                }
            }
        }
        Commands::Upcoming { user, limit } => {
            let user = service.find_user(user).await?;
            let schedules = service.upcoming(user.id, *limit).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&schedules)?);
            } else {
                println!("Upcoming ({})", schedules.len());
                for schedule in schedules {
                    println!("  {} | task {} | {}", schedule.id, schedule.task_id, schedule.scheduled_time);
                }
            }
        }
    }
    Ok(())
}

async fn run_task(command: &TaskCommand, service: &TaskService<SqliteStorage>, json: bool) -> Result<()> {
    match command {
        TaskCommand::Add { user, title, at, description } => {
            let owner = service.find_user(user).await?;
            let detail = service.create_task(owner.id, title, description.clone(), *at).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&detail)?);
            } else {
                println!("Added task: {} - {}", detail.task.id, detail.task.title);
                for schedule in &detail.schedules {
                    println!("  Schedule {} at {}", schedule.id, schedule.scheduled_time);
                }
            }
        }
        TaskCommand::List { user, status } => {
            let owner = service.find_user(user).await?;
            let tasks = service.list_tasks(owner.id, status.map(|s| vec![s])).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else {
                println!("Tasks ({})", tasks.len());
                for task in tasks {
                    println!("  {} | {:<9} | {}", task.id, task.status.as_str(), task.title);
                }
            }
        }
        TaskCommand::Show { user, id } => {
            let owner = service.find_user(user).await?;
            let detail = service.task_detail(owner.id, *id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&detail)?);
                return Ok(());
            }
            let task = &detail.task;
            println!("Task: {}", task.id);
            println!("  Title: {}", task.title);
            if let Some(description) = &task.description {
                println!("  Description: {}", description);
            }
            println!("  Status: {}", task.status);
            println!("  Created: {}", task.created_at);
            for schedule in &detail.schedules {
                match schedule.executed_at {
                    Some(at) => println!("  Schedule {} at {} (executed {})", schedule.id, schedule.scheduled_time, at),
                    None => println!("  Schedule {} at {}", schedule.id, schedule.scheduled_time),
                }
            }
        }
        TaskCommand::Update { user, id, title, description, status } => {
            let owner = service.find_user(user).await?;
            let update = TaskUpdate {
                title: title.clone(),
                description: description.clone(),
                status: *status,
            };
            let task = service.update_task(owner.id, *id, update).await?;
            print_ok(json, json!({ "task": task }), &format!("Updated task: {}", task.id))?;
        }
        TaskCommand::Reschedule { user, schedule, at } => {
            let owner = service.find_user(user).await?;
            let schedule = service.reschedule(owner.id, *schedule, *at).await?;
            print_ok(
                json,
                json!({ "schedule": schedule }),
                &format!("Rescheduled {} to {}", schedule.id, schedule.scheduled_time),
            )?;
        }
        TaskCommand::Delete { user, id } => {
            let owner = service.find_user(user).await?;
            service.delete_task(owner.id, *id).await?;
            print_ok(json, json!({ "deleted": id }), &format!("Deleted task: {}", id))?;
        }
        TaskCommand::Unschedule { user, schedule } => {
            let owner = service.find_user(user).await?;
            service.delete_schedule(owner.id, *schedule).await?;
            print_ok(json, json!({ "deleted": schedule }), &format!("Deleted schedule: {}", schedule))?;
        }
    }
    Ok(())
}

fn print_ok(json: bool, value: serde_json::Value, text: &str) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", text);
    }
    Ok(())
}

fn print_report(report: &CycleReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!(
        "Processed {} schedule(s): {} executed, {} failed",
        report.processed(),
        report.succeeded(),
        report.failed(),
    );
    for outcome in &report.outcomes {
        let state = if outcome.is_success() { "executed" } else { "failed" };
        println!(
            "  {} | task {} | {} | email sent: {}",
            outcome.schedule_id, outcome.task_id, state, outcome.email_sent
        );
    }
    Ok(())
}

fn print_logs(logs: &[LogEntry]) {
    println!("Logs ({})", logs.len());
    for log in logs {
        println!(
            "  {} | {:<21} | {:<7} | email: {:<5} | {}",
            log.created_at.format("%Y-%m-%d %H:%M:%S"),
            log.action.as_str(),
            log.status.as_str(),
            log.email_sent,
            log.message,
        );
    }
}

/// Parse `+30m`/`+2h`/`+1d` relative to now, or an RFC 3339 instant.
fn parse_when(input: &str) -> std::result::Result<Time, String> {
    if let Some(relative) = input.strip_prefix('+') {
        let (split, unit) = relative
            .char_indices()
            .last()
            .ok_or_else(|| format!("invalid offset '{}'", input))?;
        let amount: i64 = relative[..split]
            .parse()
            .map_err(|_| format!("invalid offset '{}'", input))?;
        let offset = match unit {
            's' => Duration::try_seconds(amount),
            'm' => Duration::try_minutes(amount),
            'h' => Duration::try_hours(amount),
            'd' => Duration::try_days(amount),
            _ => return Err(format!("unknown unit in '{}', use s, m, h or d", input)),
        };
        return offset
            .and_then(|offset| Utc::now().checked_add_signed(offset))
            .ok_or_else(|| format!("offset '{}' is out of range", input));
    }
    DateTime::parse_from_rfc3339(input)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid time '{}': {}", input, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_relative_time() {
        let before = Utc::now();
        let at = parse_when("+30m").unwrap();
        assert!(at >= before + Duration::minutes(30));
        assert!(at <= Utc::now() + Duration::minutes(30));
        assert!(parse_when("+5x").is_err());
        assert!(parse_when("+m").is_err());
        assert!(parse_when("+").is_err());
    }

    #[test]
    fn test_parse_rejects_bad_offsets_without_panicking() {
        assert!(parse_when("+5é").unwrap_err().contains("unknown unit"));
        assert!(parse_when("+é").is_err());
        assert!(parse_when("+99999999999999d").unwrap_err().contains("out of range"));
        assert!(parse_when("+9223372036854775807s").unwrap_err().contains("out of range"));
        assert!(parse_when("+-5m").is_ok());
    }

    #[test]
    fn test_parse_absolute_time() {
        let at = parse_when("2030-01-02T03:04:05+02:00").unwrap();
        assert_eq!(at.to_rfc3339(), "2030-01-02T01:04:05+00:00");
        assert!(parse_when("tomorrow").is_err());
    }

    #[test]
    fn test_cli_parses_task_add() {
        let cli = Cli::try_parse_from([
            "tasksched", "task", "add", "--user", "ada@example.com", "Water plants", "--at", "+1h",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Task(TaskCommand::Add { .. })));
    }
}
