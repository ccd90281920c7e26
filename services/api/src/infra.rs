use chrono::{DateTime, Utc};
use county_desk::config::StorageConfig;
use county_desk::workflows::contacts::{
    Contact, ContactId, ContactRepository, EmailAddress, InMemoryContactRepository,
    JsonFileContactRepository, PendingContact, RepositoryError, TokenDigest, UpsertOutcome,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Contact backend chosen from configuration: a JSON file when a path is set,
/// otherwise an in-memory table that is lost on restart.
pub(crate) enum ContactStore {
    Memory(InMemoryContactRepository),
    File(JsonFileContactRepository),
}

impl ContactStore {
    pub(crate) fn from_config(config: &StorageConfig) -> Result<Self, RepositoryError> {
        match &config.contacts_path {
            Some(path) => {
                let repository = JsonFileContactRepository::open(path)?;
                info!(path = %path.display(), "using json contact store");
                Ok(Self::File(repository))
            }
            None => {
                warn!("CONTACTS_DB_PATH not set; contacts are kept in memory only");
                Ok(Self::Memory(InMemoryContactRepository::default()))
            }
        }
    }

    pub(crate) fn is_persistent(&self) -> bool {
        matches!(self, Self::File(_))
    }

    fn backend(&self) -> &dyn ContactRepository {
        match self {
            Self::Memory(repository) => repository,
            Self::File(repository) => repository,
        }
    }
}

impl ContactRepository for ContactStore {
    fn upsert_pending(&self, pending: PendingContact) -> Result<UpsertOutcome, RepositoryError> {
        self.backend().upsert_pending(pending)
    }

    fn find_by_token(&self, token: &str) -> Result<Option<Contact>, RepositoryError> {
        self.backend().find_by_token(token)
    }

    fn mark_verified(
        &self,
        id: &ContactId,
        consumed: &TokenDigest,
        at: DateTime<Utc>,
    ) -> Result<Contact, RepositoryError> {
        self.backend().mark_verified(id, consumed, at)
    }

    fn fetch_by_email(&self, email: &EmailAddress) -> Result<Option<Contact>, RepositoryError> {
        self.backend().fetch_by_email(email)
    }

    fn list(&self) -> Result<Vec<Contact>, RepositoryError> {
        self.backend().list()
    }
}
