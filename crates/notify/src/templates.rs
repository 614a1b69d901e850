//! HTML email templates.

use chrono::Datelike;
use tasksched_core::{Outcome, Time};

use crate::gateway::{NotificationKind, TemplateData};

const STYLE: &str = "\
body { font-family: Arial, sans-serif; line-height: 1.6; color: #333; }
.container { max-width: 600px; margin: 0 auto; padding: 20px; }
.header { background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); color: white; padding: 30px; text-align: center; border-radius: 10px 10px 0 0; }
.content { background: #f9f9f9; padding: 30px; border-radius: 0 0 10px 10px; }
.status { padding: 10px 20px; border-radius: 5px; display: inline-block; font-weight: bold; margin: 15px 0; }
.success { background: #d4edda; color: #155724; }
.failed { background: #f8d7da; color: #721c24; }
.details { background: white; padding: 20px; border-left: 4px solid #667eea; margin: 20px 0; }
.badge { background: #667eea; color: white; padding: 10px 20px; border-radius: 5px; display: inline-block; font-weight: bold; margin: 15px 0; }
.footer { text-align: center; padding: 20px; color: #666; font-size: 12px; }";

/// Render the body for a notification kind.
pub fn render(kind: NotificationKind, data: &TemplateData) -> String {
    match kind {
        NotificationKind::TaskExecuted => task_executed(data),
        NotificationKind::TaskScheduled => task_scheduled(data),
        NotificationKind::Welcome => welcome(data),
    }
}

/// Escape text for inclusion in HTML.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Format an instant for display in an email.
pub fn format_time(time: &Time) -> String {
    time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn page(heading: &str, content: &str) -> String {
    format!(
        "<!DOCTYPE html>
<html>
<head><style>{style}</style></head>
<body>
  <div class=\"container\">
    <div class=\"header\"><h1>{heading}</h1></div>
    <div class=\"content\">
{content}
    </div>
    <div class=\"footer\">
      <p>This is an automated message from Task Scheduler</p>
      <p>&copy; {year} Task Scheduler. All rights reserved.</p>
    </div>
  </div>
</body>
</html>
",
        style = STYLE,
        heading = heading,
        content = content,
        year = chrono::Utc::now().year(),
    )
}

fn task_details(data: &TemplateData) -> String {
    let mut details = format!(
        "<p><strong>Title:</strong> {}</p>",
        escape_html(data.task_title.as_deref().unwrap_or_default())
    );
    if let Some(description) = data.task_description.as_deref().filter(|d| !d.is_empty()) {
        details.push_str(&format!("<p><strong>Description:</strong> {}</p>", escape_html(description)));
    }
    details
}

fn task_executed(data: &TemplateData) -> String {
    let status = data.status.unwrap_or(Outcome::Success);
    let executed_at = data.executed_at.as_ref().map(format_time).unwrap_or_default();
    let content = format!(
        "      <p>Hello {name},</p>
      <p>Your scheduled task has been executed.</p>
      <div class=\"status {class}\">Status: {status}</div>
      <div class=\"details\">
        <h3>Task Details</h3>
        {details}
        <p><strong>Executed At:</strong> {executed_at}</p>
      </div>
      <p>Thank you for using Task Scheduler!</p>",
        name = escape_html(&data.user_name),
        class = status.as_str(),
        status = status.as_str().to_uppercase(),
        details = task_details(data),
        executed_at = executed_at,
    );
    page("Task Executed", &content)
}

fn task_scheduled(data: &TemplateData) -> String {
    let scheduled = data.scheduled_time.as_ref().map(format_time).unwrap_or_default();
    let content = format!(
        "      <p>Hello {name},</p>
      <p>Your task has been successfully scheduled!</p>
      <div class=\"badge\">{scheduled}</div>
      <div class=\"details\">
        <h3>Task Details</h3>
        {details}
      </div>
      <p>You will receive a notification when the task is executed.</p>",
        name = escape_html(&data.user_name),
        scheduled = scheduled,
        details = task_details(data),
    );
    page("Task Scheduled", &content)
}

fn welcome(data: &TemplateData) -> String {
    let content = format!(
        "      <p>Hello {name},</p>
      <p>Your account <strong>{email}</strong> is ready.</p>
      <div class=\"details\">
        <h3>What you can do</h3>
        <ul>
          <li>Create tasks with a future execution time</li>
          <li>Get an email when each task is executed</li>
          <li>Review the execution log of every task</li>
        </ul>
      </div>",
        name = escape_html(&data.user_name),
        email = escape_html(data.user_email.as_deref().unwrap_or_default()),
    );
    page("Welcome to Task Scheduler", &content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>\"Tom\" & 'Jerry'</b>"), "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;");
    }

    #[test]
    fn test_failed_execution_template() {
        let at = chrono::Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let data = TemplateData::task_executed("Ada", "<Deploy>", Some("prod".to_string()), at, Outcome::Failed);
        let html = render(NotificationKind::TaskExecuted, &data);

        assert!(html.contains("Status: FAILED"));
        assert!(html.contains("class=\"status failed\""));
        assert!(html.contains("&lt;Deploy&gt;"));
        assert!(html.contains("<strong>Description:</strong> prod"));
        assert!(html.contains("2026-03-01 09:30:00 UTC"));
    }

    #[test]
    fn test_description_omitted_when_missing() {
        let data = TemplateData::task_scheduled("Ada", "Deploy", None, chrono::Utc::now());
        let html = render(NotificationKind::TaskScheduled, &data);
        assert!(!html.contains("Description"));
        assert!(html.contains("successfully scheduled"));
    }

    #[test]
    fn test_welcome_template() {
        let html = render(NotificationKind::Welcome, &TemplateData::welcome("Ada", "ada@example.com"));
        assert!(html.contains("Hello Ada"));
        assert!(html.contains("ada@example.com"));
    }
}
