//! Outbound mail delivery.
//!
//! Workflows hand an [`OutboundEmail`] to a [`Mailer`] and only learn whether the
//! transport accepted it. Production uses [`SmtpMailer`]; when SMTP credentials are
//! incomplete the [`LogMailer`] records the message in the logs instead, which keeps
//! local runs usable without a relay.

mod smtp;

pub use smtp::SmtpMailer;

use crate::config::MailConfig;
use tracing::info;

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
}

/// Delivery abstraction shared by the verification and dispatch workflows.
///
/// Implementations must return within their configured timeout.
pub trait Mailer: Send + Sync {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailerError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    #[error("invalid mail address '{0}'")]
    InvalidAddress(String),
    #[error("failed to build message: {0}")]
    Build(String),
    #[error("mail transport failed: {0}")]
    Transport(String),
    #[error("mail transport unavailable: {0}")]
    Unavailable(String),
    #[error("mail delivery did not finish within {0:?}")]
    TimedOut(std::time::Duration),
}

/// Logs the message instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailerError> {
        info!(
            to = %email.to,
            subject = %email.subject,
            body = %email.text_body,
            "smtp not configured; simulated send"
        );
        Ok(())
    }
}

/// Transport selected from configuration at start-up.
#[derive(Debug)]
pub enum MailTransport {
    Smtp(SmtpMailer),
    Log(LogMailer),
}

impl MailTransport {
    pub fn from_config(config: &MailConfig) -> Result<Self, MailerError> {
        match (&config.smtp, &config.sender) {
            (Some(smtp), Some(sender)) => {
                let mailer = SmtpMailer::new(smtp, sender, config.timeout)?;
                info!(host = %smtp.host, port = smtp.port, "smtp transport configured");
                Ok(Self::Smtp(mailer))
            }
            _ => {
                info!("smtp not fully configured; outbound mail will be logged only");
                Ok(Self::Log(LogMailer))
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Smtp(_) => "smtp",
            Self::Log(_) => "log",
        }
    }
}

impl Mailer for MailTransport {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailerError> {
        match self {
            Self::Smtp(mailer) => mailer.send(email),
            Self::Log(mailer) => mailer.send(email),
        }
    }
}
