//! SMTP transport backed by lettre.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info, warn};

use crate::mailer::{Mailer, OutgoingEmail};
use crate::NotifyError;

/// SMTP connection settings.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// Relay host
    pub host: String,
    /// Relay port (587 for STARTTLS)
    pub port: u16,
    /// Login user
    pub username: String,
    /// Login password
    pub password: String,
    /// Sender address; defaults to the login user
    pub from: Option<String>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from: None,
        }
    }
}

/// Mailer that delivers over SMTP with STARTTLS.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build a mailer from settings. Does not connect.
    pub fn new(config: &SmtpConfig) -> Result<Self, NotifyError> {
        if config.username.is_empty() {
            return Err(NotifyError::Config("smtp username is empty".to_string()));
        }
        let from: Mailbox = config.from.as_deref().unwrap_or(&config.username).parse()?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(config.username.clone(), config.password.clone()))
            .build();

        debug!(host = %config.host, port = config.port, "smtp transport configured");
        Ok(Self { transport, from })
    }

    /// Open a connection to check the relay is reachable.
    /// Failure is reported, not fatal: emails are best-effort.
    pub async fn verify(&self) -> bool {
        match self.transport.test_connection().await {
            Ok(true) => {
                info!("email transport is ready to send emails");
                true
            }
            Ok(false) => {
                warn!("email transport verification failed");
                false
            }
            Err(e) => {
                warn!(error = %e, "email transport verification failed");
                false
            }
        }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn deliver(&self, email: &OutgoingEmail) -> Result<(), NotifyError> {
        let to: Mailbox = email.to.parse()?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(email.html.clone())?;

        let response = self.transport.send(message).await?;
        debug!(to = %email.to, code = %response.code(), "smtp accepted message");
        Ok(())
    }
}
