use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::domain::{Contact, ContactId, EmailAddress, PendingContact};
use super::repository::{
    lock_table, ContactDocument, ContactRepository, ContactTable, RepositoryError, UpsertOutcome,
};
use super::token::TokenDigest;

/// Contact repository persisted as a single JSON document.
///
/// The file is the source of truth. Every read and mutation reloads the document under
/// the table lock, so an operator command writing the same file from another process is
/// seen by the running server. Mutations are applied to a copy of the table, written to
/// `<path>.tmp`, synced and renamed over the original before the cached table is
/// replaced. A failed write leaves both the file and the cache untouched.
#[derive(Debug)]
pub struct JsonFileContactRepository {
    path: PathBuf,
    table: Mutex<ContactTable>,
}

impl JsonFileContactRepository {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let path = path.into();
        let table = read_table(&path)?;

        info!(path = %path.display(), contacts = table.list().len(), "contact store opened");
        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, table: &ContactTable) -> Result<(), RepositoryError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| unavailable(parent, err))?;
        }

        let bytes = serde_json::to_vec_pretty(&table.to_document())
            .map_err(|err| RepositoryError::Unavailable(err.to_string()))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut file = File::create(&tmp).map_err(|err| unavailable(&tmp, err))?;
        file.write_all(&bytes)
            .and_then(|_| file.sync_all())
            .map_err(|err| unavailable(&tmp, err))?;
        fs::rename(&tmp, &self.path).map_err(|err| unavailable(&self.path, err))?;

        debug!(path = %self.path.display(), "contact store persisted");
        Ok(())
    }

    /// Locks the cache and refreshes it from disk.
    fn current(&self) -> Result<MutexGuard<'_, ContactTable>, RepositoryError> {
        let mut guard = lock_table(&self.table)?;
        *guard = read_table(&self.path)?;
        Ok(guard)
    }

    fn mutate<T>(
        &self,
        apply: impl FnOnce(&mut ContactTable) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut guard = self.current()?;
        let mut next = guard.clone();
        let value = apply(&mut next)?;
        self.persist(&next)?;
        *guard = next;
        Ok(value)
    }
}

fn read_table(path: &Path) -> Result<ContactTable, RepositoryError> {
    match fs::read(path) {
        Ok(bytes) => {
            let document: ContactDocument = serde_json::from_slice(&bytes)
                .map_err(|err| RepositoryError::Corrupt(err.to_string()))?;
            ContactTable::from_document(document)
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(ContactTable::default()),
        Err(err) => Err(unavailable(path, err)),
    }
}

fn unavailable(path: &Path, err: std::io::Error) -> RepositoryError {
    RepositoryError::Unavailable(format!("{}: {err}", path.display()))
}

impl ContactRepository for JsonFileContactRepository {
    fn upsert_pending(&self, pending: PendingContact) -> Result<UpsertOutcome, RepositoryError> {
        self.mutate(|table| Ok(table.upsert_pending(pending)))
    }

    fn find_by_token(&self, token: &str) -> Result<Option<Contact>, RepositoryError> {
        Ok(self.current()?.find_by_token(token))
    }

    fn mark_verified(
        &self,
        id: &ContactId,
        consumed: &TokenDigest,
        at: DateTime<Utc>,
    ) -> Result<Contact, RepositoryError> {
        self.mutate(|table| table.mark_verified(id, consumed, at))
    }

    fn fetch_by_email(&self, email: &EmailAddress) -> Result<Option<Contact>, RepositoryError> {
        Ok(self.current()?.fetch_by_email(email))
    }

    fn list(&self) -> Result<Vec<Contact>, RepositoryError> {
        Ok(self.current()?.list())
    }
}
