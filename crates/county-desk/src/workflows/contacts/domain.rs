use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::token::TokenDigest;

const EMAIL_SHAPE: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";
const MAX_EMAIL_LENGTH: usize = 254;
const MAX_NAME_LENGTH: usize = 200;

fn email_shape() -> &'static Regex {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE.get_or_init(|| Regex::new(EMAIL_SHAPE).expect("email pattern compiles"))
}

/// Normalized (trimmed, lowercased) email address with a basic shape check.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn parse(raw: &str) -> Result<Self, ContactValidationError> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(ContactValidationError::MissingEmail);
        }
        if normalized.len() > MAX_EMAIL_LENGTH || !email_shape().is_match(&normalized) {
            return Err(ContactValidationError::MalformedEmail);
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = ContactValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trims the optional display name; blank names are dropped.
pub fn normalize_name(name: Option<String>) -> Result<Option<String>, ContactValidationError> {
    let Some(name) = name else {
        return Ok(None);
    };
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(ContactValidationError::NameTooLong {
            max: MAX_NAME_LENGTH,
        });
    }
    Ok(Some(trimmed.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContactValidationError {
    #[error("email is required")]
    MissingEmail,
    #[error("email address is not valid")]
    MalformedEmail,
    #[error("name must be at most {max} characters")]
    NameTooLong { max: usize },
}

/// Stable identifier assigned when a contact is first stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactId(pub String);

impl ContactId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactStatus {
    Pending,
    Verified,
}

impl ContactStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
        }
    }
}

/// Stored contact. `token` holds only the salted digest of the outstanding token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub email: EmailAddress,
    pub name: Option<String>,
    pub opt_in: bool,
    pub status: ContactStatus,
    pub token: Option<TokenDigest>,
    pub token_issued_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
}

impl Contact {
    pub fn is_verified(&self) -> bool {
        self.status == ContactStatus::Verified && self.verified_at.is_some()
    }

    /// A token with no issue time is treated as expired.
    pub fn token_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match self.token_issued_at {
            Some(issued_at) => now.signed_duration_since(issued_at) > ttl,
            None => true,
        }
    }

    pub fn view(&self) -> ContactView {
        ContactView {
            email: self.email.to_string(),
            name: self.name.clone(),
            opt_in: self.opt_in,
            status: self.status.label(),
            created_at: self.created_at,
            verified_at: self.verified_at,
            awaiting_confirmation: self.token.is_some(),
        }
    }
}

/// Payload accepted by `POST /save_email`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactSubmission {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub opt_in: bool,
}

/// Input handed to the repository once validation and token issuance are done.
#[derive(Debug, Clone)]
pub struct PendingContact {
    pub email: EmailAddress,
    pub name: Option<String>,
    pub opt_in: bool,
    pub token: TokenDigest,
    pub issued_at: DateTime<Utc>,
}

/// Sanitized contact representation without token material.
#[derive(Debug, Clone, Serialize)]
pub struct ContactView {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub opt_in: bool,
    pub status: &'static str,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    pub awaiting_confirmation: bool,
}
