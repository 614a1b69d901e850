//! Notification gateway for the task scheduler.
//!
//! Renders templated emails and hands them to a [`Mailer`] transport.
//! Callers only ever see a sent/not-sent boolean; transport failures are
//! logged here and never propagated.

#![warn(missing_docs)]

pub mod gateway;
pub mod mailer;
pub mod smtp;
pub mod templates;

pub use gateway::{NotificationGateway, NotificationKind, Notifier, TemplateData};
pub use mailer::{Mailer, OutgoingEmail, TracingMailer};
pub use smtp::{SmtpConfig, SmtpMailer};

/// Errors raised by mail transports.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Malformed sender or recipient address
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// Message could not be assembled
    #[error("invalid message: {0}")]
    Message(#[from] lettre::error::Error),

    /// SMTP transport failure
    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// Transport is misconfigured
    #[error("mailer not configured: {0}")]
    Config(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}
