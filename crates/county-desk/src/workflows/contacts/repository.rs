use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Contact, ContactId, ContactStatus, EmailAddress, PendingContact};
use super::token::TokenDigest;

/// Storage abstraction for contacts so the verification service can be exercised in
/// isolation. Implementations serialize mutations and persist them before returning.
pub trait ContactRepository: Send + Sync {
    fn upsert_pending(&self, pending: PendingContact) -> Result<UpsertOutcome, RepositoryError>;
    fn find_by_token(&self, token: &str) -> Result<Option<Contact>, RepositoryError>;
    /// Fails with `Conflict` unless the contact still holds `consumed`.
    fn mark_verified(
        &self,
        id: &ContactId,
        consumed: &TokenDigest,
        at: DateTime<Utc>,
    ) -> Result<Contact, RepositoryError>;
    fn fetch_by_email(&self, email: &EmailAddress) -> Result<Option<Contact>, RepositoryError>;
    fn list(&self) -> Result<Vec<Contact>, RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created(Contact),
    Rotated(Contact),
    AlreadyVerified(Contact),
}

impl UpsertOutcome {
    pub fn contact(&self) -> &Contact {
        match self {
            Self::Created(contact) | Self::Rotated(contact) | Self::AlreadyVerified(contact) => {
                contact
            }
        }
    }
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record changed concurrently")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("stored contacts are unreadable: {0}")]
    Corrupt(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Contact table keyed by normalized email. Both backends apply their mutations here.
#[derive(Debug, Clone, Default)]
pub(crate) struct ContactTable {
    contacts: BTreeMap<EmailAddress, Contact>,
}

/// On-disk document layout.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ContactDocument {
    pub(crate) version: u32,
    pub(crate) contacts: Vec<Contact>,
}

pub(crate) const DOCUMENT_VERSION: u32 = 1;

impl ContactTable {
    pub(crate) fn from_document(document: ContactDocument) -> Result<Self, RepositoryError> {
        if document.version != DOCUMENT_VERSION {
            return Err(RepositoryError::Corrupt(format!(
                "unsupported document version {}",
                document.version
            )));
        }
        let mut contacts = BTreeMap::new();
        for contact in document.contacts {
            if contacts.insert(contact.email.clone(), contact).is_some() {
                return Err(RepositoryError::Corrupt(
                    "duplicate email in contact table".to_string(),
                ));
            }
        }
        Ok(Self { contacts })
    }

    pub(crate) fn to_document(&self) -> ContactDocument {
        ContactDocument {
            version: DOCUMENT_VERSION,
            contacts: self.contacts.values().cloned().collect(),
        }
    }

    pub(crate) fn upsert_pending(&mut self, pending: PendingContact) -> UpsertOutcome {
        let PendingContact {
            email,
            name,
            opt_in,
            token,
            issued_at,
        } = pending;

        match self.contacts.get_mut(&email) {
            None => {
                let contact = Contact {
                    id: ContactId::generate(),
                    email: email.clone(),
                    name,
                    opt_in,
                    status: ContactStatus::Pending,
                    token: Some(token),
                    token_issued_at: Some(issued_at),
                    created_at: issued_at,
                    verified_at: None,
                };
                self.contacts.insert(email, contact.clone());
                UpsertOutcome::Created(contact)
            }
            Some(existing) if existing.status == ContactStatus::Verified => {
                UpsertOutcome::AlreadyVerified(existing.clone())
            }
            Some(existing) => {
                existing.name = name;
                existing.opt_in = opt_in;
                existing.token = Some(token);
                existing.token_issued_at = Some(issued_at);
                UpsertOutcome::Rotated(existing.clone())
            }
        }
    }

    /// Checks every outstanding digest so the scan time does not depend on where a
    /// match sits in the table.
    pub(crate) fn find_by_token(&self, token: &str) -> Option<Contact> {
        let mut found = None;
        for contact in self.contacts.values() {
            let matched = contact
                .token
                .as_ref()
                .is_some_and(|digest| digest.matches(token));
            if matched && found.is_none() {
                found = Some(contact.clone());
            }
        }
        found
    }

    pub(crate) fn mark_verified(
        &mut self,
        id: &ContactId,
        consumed: &TokenDigest,
        at: DateTime<Utc>,
    ) -> Result<Contact, RepositoryError> {
        let contact = self
            .contacts
            .values_mut()
            .find(|contact| &contact.id == id)
            .ok_or(RepositoryError::NotFound)?;

        if contact.status != ContactStatus::Pending || contact.token.as_ref() != Some(consumed) {
            return Err(RepositoryError::Conflict);
        }

        contact.status = ContactStatus::Verified;
        contact.verified_at = Some(at);
        contact.token = None;
        contact.token_issued_at = None;
        Ok(contact.clone())
    }

    pub(crate) fn fetch_by_email(&self, email: &EmailAddress) -> Option<Contact> {
        self.contacts.get(email).cloned()
    }

    pub(crate) fn list(&self) -> Vec<Contact> {
        self.contacts.values().cloned().collect()
    }
}

pub(crate) fn lock_table(
    table: &Mutex<ContactTable>,
) -> Result<MutexGuard<'_, ContactTable>, RepositoryError> {
    table
        .lock()
        .map_err(|_| RepositoryError::Unavailable("contact table lock poisoned".to_string()))
}

/// Process-local repository used when no contact database path is configured.
#[derive(Debug, Default)]
pub struct InMemoryContactRepository {
    table: Mutex<ContactTable>,
}

impl ContactRepository for InMemoryContactRepository {
    fn upsert_pending(&self, pending: PendingContact) -> Result<UpsertOutcome, RepositoryError> {
        Ok(lock_table(&self.table)?.upsert_pending(pending))
    }

    fn find_by_token(&self, token: &str) -> Result<Option<Contact>, RepositoryError> {
        Ok(lock_table(&self.table)?.find_by_token(token))
    }

    fn mark_verified(
        &self,
        id: &ContactId,
        consumed: &TokenDigest,
        at: DateTime<Utc>,
    ) -> Result<Contact, RepositoryError> {
        lock_table(&self.table)?.mark_verified(id, consumed, at)
    }

    fn fetch_by_email(&self, email: &EmailAddress) -> Result<Option<Contact>, RepositoryError> {
        Ok(lock_table(&self.table)?.fetch_by_email(email))
    }

    fn list(&self) -> Result<Vec<Contact>, RepositoryError> {
        Ok(lock_table(&self.table)?.list())
    }
}
