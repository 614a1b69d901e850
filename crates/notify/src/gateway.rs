//! The notification gateway: template selection, rendering and delivery.

use std::sync::Arc;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tasksched_core::{Outcome, Time};
use tracing::{error, info};

use crate::mailer::{Mailer, OutgoingEmail};
use crate::templates;

/// Which template to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A task was created and scheduled
    TaskScheduled,
    /// A task was executed, successfully or not
    TaskExecuted,
    /// A user registered
    Welcome,
}

impl NotificationKind {
    /// Template name.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::TaskScheduled => "task_scheduled",
            NotificationKind::TaskExecuted => "task_executed",
            NotificationKind::Welcome => "welcome",
        }
    }

    /// Subject line for this kind of email.
    pub fn subject(&self, data: &TemplateData) -> String {
        let title = data.task_title.as_deref().unwrap_or_default();
        match self {
            NotificationKind::TaskScheduled => format!("Task Scheduled: {}", title),
            NotificationKind::TaskExecuted => format!("Task Executed: {}", title),
            NotificationKind::Welcome => "Welcome to Task Scheduler!".to_string(),
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values substituted into a template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateData {
    /// Recipient's display name
    pub user_name: String,
    /// Recipient's email (welcome only)
    pub user_email: Option<String>,
    /// Task title
    pub task_title: Option<String>,
    /// Task description
    pub task_description: Option<String>,
    /// When the task ran
    pub executed_at: Option<Time>,
    /// When the task is due
    pub scheduled_time: Option<Time>,
    /// Execution outcome
    pub status: Option<Outcome>,
}

impl TemplateData {
    /// Data for a task-executed email.
    pub fn task_executed(
        user_name: impl Into<String>,
        task_title: impl Into<String>,
        task_description: Option<String>,
        executed_at: Time,
        status: Outcome,
    ) -> Self {
        Self {
            user_name: user_name.into(),
            task_title: Some(task_title.into()),
            task_description,
            executed_at: Some(executed_at),
            status: Some(status),
            ..Default::default()
        }
    }

    /// Data for a task-scheduled email.
    pub fn task_scheduled(
        user_name: impl Into<String>,
        task_title: impl Into<String>,
        task_description: Option<String>,
        scheduled_time: Time,
    ) -> Self {
        Self {
            user_name: user_name.into(),
            task_title: Some(task_title.into()),
            task_description,
            scheduled_time: Some(scheduled_time),
            ..Default::default()
        }
    }

    /// Data for a welcome email.
    pub fn welcome(user_name: impl Into<String>, user_email: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            user_email: Some(user_email.into()),
            ..Default::default()
        }
    }
}

/// Sends notifications. Never fails: the return value says whether the
/// message went out.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Render and send one notification.
    async fn send(&self, kind: NotificationKind, recipient: &str, data: &TemplateData) -> bool;
}

/// Default [`Notifier`]: renders the built-in templates and delivers them
/// through a [`Mailer`].
#[derive(Clone)]
pub struct NotificationGateway {
    mailer: Arc<dyn Mailer>,
}

impl NotificationGateway {
    /// Create a gateway over a transport.
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    /// Render without sending.
    pub fn render(kind: NotificationKind, recipient: &str, data: &TemplateData) -> OutgoingEmail {
        OutgoingEmail {
            to: recipient.to_string(),
            subject: kind.subject(data),
            kind,
            html: templates::render(kind, data),
        }
    }
}

#[async_trait]
impl Notifier for NotificationGateway {
    async fn send(&self, kind: NotificationKind, recipient: &str, data: &TemplateData) -> bool {
        let email = Self::render(kind, recipient, data);
        match self.mailer.deliver(&email).await {
            Ok(()) => {
                info!(to = %recipient, kind = %kind, "email sent");
                true
            }
            Err(e) => {
                error!(to = %recipient, kind = %kind, error = %e, "failed to send email");
                false
            }
        }
    }
}
