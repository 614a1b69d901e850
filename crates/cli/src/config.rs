//! Runtime settings: command-line flags with environment fallbacks.

use clap::Args;
use tasksched_execution::{EngineConfig, PollSchedule};
use tasksched_notify::SmtpConfig;
use tracing_subscriber::EnvFilter;

/// Settings shared by every command. Each flag falls back to the named
/// environment variable, which may come from a `.env` file.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Database connection URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://tasksched.db")]
    pub database_url: String,

    /// When the poller checks for due schedules (cron syntax)
    #[arg(long, env = "CRON_SCHEDULE", default_value = "*/1 * * * *")]
    pub cron_schedule: PollSchedule,

    /// Max schedules executed per cycle
    #[arg(long, env = "MAX_BATCH")]
    pub max_batch: Option<usize>,

    /// SMTP relay host
    #[arg(long, env = "EMAIL_HOST", default_value = "smtp.gmail.com")]
    pub email_host: String,

    /// SMTP relay port
    #[arg(long, env = "EMAIL_PORT", default_value_t = 587)]
    pub email_port: u16,

    /// SMTP login; without it emails are only logged
    #[arg(long, env = "EMAIL_USER")]
    pub email_user: Option<String>,

    /// SMTP password
    #[arg(long, env = "EMAIL_PASSWORD", hide_env_values = true)]
    pub email_password: Option<String>,

    /// Sender address (defaults to the SMTP login)
    #[arg(long, env = "EMAIL_FROM")]
    pub email_from: Option<String>,

    /// Default log filter; RUST_LOG takes precedence
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Settings {
    /// SMTP settings, if a login is configured.
    pub fn smtp(&self) -> Option<SmtpConfig> {
        let username = self.email_user.clone().filter(|u| !u.is_empty())?;
        Some(SmtpConfig {
            host: self.email_host.clone(),
            port: self.email_port,
            username,
            password: self.email_password.clone().unwrap_or_default(),
            from: self.email_from.clone().filter(|f| !f.is_empty()),
        })
    }

    /// Engine settings.
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            max_batch: self.max_batch.filter(|n| *n > 0),
        }
    }

    /// Log filter: `RUST_LOG` if set, otherwise the configured level.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.log_level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}
