use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{
    normalize_name, ContactStatus, ContactSubmission, ContactValidationError, ContactView,
    EmailAddress, PendingContact,
};
use super::notification::{confirmation_link, verification_email};
use super::repository::{ContactRepository, RepositoryError, UpsertOutcome};
use super::token::{generate_token, TokenDigest, TokenError};
use crate::clock::{Clock, SystemClock};
use crate::config::VerificationConfig;
use crate::mail::{Mailer, MailerError};

/// Service composing the contact repository, token issuance and the mailer.
pub struct VerificationService<R, M> {
    repository: Arc<R>,
    mailer: Arc<M>,
    clock: Arc<dyn Clock>,
    settings: VerificationConfig,
}

/// What the caller learns about a submission. Never carries the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionReceipt {
    pub status: ContactStatus,
    pub message: String,
    pub email_sent: bool,
}

impl SubmissionReceipt {
    fn pending() -> Self {
        Self {
            status: ContactStatus::Pending,
            message: "Check your inbox for a link to confirm your email address.".to_string(),
            email_sent: true,
        }
    }

    fn already_verified() -> Self {
        Self {
            status: ContactStatus::Verified,
            message: "This email address is already verified.".to_string(),
            email_sent: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmationReceipt {
    pub email: EmailAddress,
    pub verified_at: DateTime<Utc>,
}

impl<R, M> VerificationService<R, M>
where
    R: ContactRepository + 'static,
    M: Mailer + 'static,
{
    pub fn new(repository: Arc<R>, mailer: Arc<M>, settings: VerificationConfig) -> Self {
        Self::with_clock(repository, mailer, Arc::new(SystemClock), settings)
    }

    pub fn with_clock(
        repository: Arc<R>,
        mailer: Arc<M>,
        clock: Arc<dyn Clock>,
        settings: VerificationConfig,
    ) -> Self {
        Self {
            repository,
            mailer,
            clock,
            settings,
        }
    }

    /// Store or refresh a contact and mail it a fresh confirmation link.
    ///
    /// A delivery failure is reported but not rolled back: the stored token stays valid
    /// and a later resubmission rotates it.
    #[tracing::instrument(name = "submit contact", skip_all, fields(opt_in = submission.opt_in))]
    pub fn submit_contact(
        &self,
        submission: ContactSubmission,
    ) -> Result<SubmissionReceipt, VerificationError> {
        let ContactSubmission {
            email,
            name,
            opt_in,
        } = submission;
        let email = EmailAddress::parse(&email)?;
        let name = normalize_name(name)?;
        self.issue(email, name, opt_in)
    }

    /// Consume a confirmation token and mark its contact verified.
    #[tracing::instrument(name = "confirm token", skip_all)]
    pub fn confirm_token(&self, token: &str) -> Result<ConfirmationReceipt, VerificationError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(VerificationError::InvalidToken);
        }

        let contact = self
            .repository
            .find_by_token(token)?
            .ok_or(VerificationError::InvalidToken)?;
        let Some(digest) = contact.token.clone() else {
            return Err(VerificationError::InvalidToken);
        };

        let now = self.clock.now();
        if contact.token_expired(now, self.settings.token_ttl) {
            warn!(contact_id = %contact.id, "confirmation token expired");
            return Err(VerificationError::ExpiredToken);
        }

        match self.repository.mark_verified(&contact.id, &digest, now) {
            Ok(verified) => {
                info!(contact_id = %verified.id, "contact verified");
                Ok(ConfirmationReceipt {
                    email: verified.email,
                    verified_at: now,
                })
            }
            Err(RepositoryError::Conflict | RepositoryError::NotFound) => {
                warn!(contact_id = %contact.id, "token consumed or rotated concurrently");
                Err(VerificationError::InvalidToken)
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Operator resend: rotates the token of a pending contact and mails it again.
    #[tracing::instrument(name = "resend verification", skip_all)]
    pub fn resend_verification(&self, email: &str) -> Result<SubmissionReceipt, VerificationError> {
        let email = EmailAddress::parse(email)?;
        let contact = self
            .repository
            .fetch_by_email(&email)?
            .ok_or(VerificationError::UnknownContact)?;
        if contact.is_verified() {
            return Ok(SubmissionReceipt::already_verified());
        }
        self.issue(email, contact.name, contact.opt_in)
    }

    pub fn list_contacts(&self) -> Result<Vec<ContactView>, VerificationError> {
        Ok(self
            .repository
            .list()?
            .iter()
            .map(|contact| contact.view())
            .collect())
    }

    fn issue(
        &self,
        email: EmailAddress,
        name: Option<String>,
        opt_in: bool,
    ) -> Result<SubmissionReceipt, VerificationError> {
        let token = generate_token()?;
        let digest = TokenDigest::from_token(&token)?;

        let outcome = self.repository.upsert_pending(PendingContact {
            email,
            name,
            opt_in,
            token: digest,
            issued_at: self.clock.now(),
        })?;

        let contact = match outcome {
            UpsertOutcome::AlreadyVerified(contact) => {
                info!(contact_id = %contact.id, "contact already verified; nothing to send");
                return Ok(SubmissionReceipt::already_verified());
            }
            UpsertOutcome::Created(contact) => {
                info!(contact_id = %contact.id, "contact created");
                contact
            }
            UpsertOutcome::Rotated(contact) => {
                info!(contact_id = %contact.id, "confirmation token rotated");
                contact
            }
        };

        let link = confirmation_link(&self.settings.base_url, &token);
        if let Err(err) = self.mailer.send(&verification_email(&contact, &link)) {
            warn!(contact_id = %contact.id, error = %err, "confirmation email not delivered");
            return Err(VerificationError::Delivery(err));
        }

        info!(contact_id = %contact.id, "confirmation email sent");
        Ok(SubmissionReceipt::pending())
    }
}

/// Error raised by the verification service. Display strings are safe to show users.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error(transparent)]
    Validation(#[from] ContactValidationError),
    #[error("we could not send the confirmation email; please try again later")]
    Delivery(#[source] MailerError),
    #[error("this confirmation link is invalid or has already been used")]
    InvalidToken,
    #[error("this confirmation link has expired; please submit your email again")]
    ExpiredToken,
    #[error("no contact is saved for that email address")]
    UnknownContact,
    #[error("could not issue a confirmation token")]
    Token(#[from] TokenError),
    #[error("contact storage is unavailable")]
    Repository(#[from] RepositoryError),
}
