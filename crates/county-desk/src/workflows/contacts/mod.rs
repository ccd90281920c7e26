//! Contact email capture and verification.
//!
//! A submission stores (or refreshes) a pending contact and mails a single-use
//! confirmation link; visiting the link marks the contact verified. Tokens are never
//! persisted in plaintext and expire after the configured validity window.

pub mod domain;
pub mod file_store;
pub mod notification;
pub mod repository;
pub mod router;
pub mod service;
pub mod token;

#[cfg(test)]
mod tests;

pub use domain::{
    Contact, ContactId, ContactStatus, ContactSubmission, ContactValidationError, ContactView,
    EmailAddress, PendingContact,
};
pub use file_store::JsonFileContactRepository;
pub use repository::{
    ContactRepository, InMemoryContactRepository, RepositoryError, UpsertOutcome,
};
pub use router::contact_router;
pub use service::{
    ConfirmationReceipt, SubmissionReceipt, VerificationError, VerificationService,
};
pub use token::{generate_token, IssuedToken, TokenDigest, TokenError};
