//! Mail transport abstraction.

use async_trait::async_trait;
use tracing::info;

use crate::gateway::NotificationKind;
use crate::NotifyError;

/// A fully rendered email ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// Template the body was rendered from
    pub kind: NotificationKind,
    /// HTML body
    pub html: String,
}

/// Delivers rendered emails.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one email.
    async fn deliver(&self, email: &OutgoingEmail) -> Result<(), NotifyError>;
}

/// Mailer that only logs what it would have sent.
///
/// Used when no SMTP credentials are configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMailer;

#[async_trait]
impl Mailer for TracingMailer {
    async fn deliver(&self, email: &OutgoingEmail) -> Result<(), NotifyError> {
        info!(
            to = %email.to,
            subject = %email.subject,
            kind = %email.kind,
            bytes = email.html.len(),
            "smtp disabled, email not delivered"
        );
        Ok(())
    }
}
