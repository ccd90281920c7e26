use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::clock::ManualClock;
use crate::config::VerificationConfig;
use crate::mail::{Mailer, MailerError, OutboundEmail};
use crate::workflows::contacts::domain::{Contact, ContactId, EmailAddress, PendingContact};
use crate::workflows::contacts::repository::{
    ContactRepository, InMemoryContactRepository, RepositoryError, UpsertOutcome,
};
use crate::workflows::contacts::token::TokenDigest;
use crate::workflows::contacts::{ContactSubmission, VerificationService};

pub(super) const BASE_URL: &str = "https://desk.example.org";

pub(super) fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 1, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn settings() -> VerificationConfig {
    VerificationConfig {
        base_url: BASE_URL.to_string(),
        token_ttl: chrono::Duration::hours(48),
    }
}

pub(super) fn submission(email: &str) -> ContactSubmission {
    ContactSubmission {
        email: email.to_string(),
        name: Some("Alice Example".to_string()),
        opt_in: true,
    }
}

#[derive(Default)]
pub(super) struct RecordingMailer {
    sent: Mutex<Vec<OutboundEmail>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub(super) fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().expect("mailer mutex poisoned").clone()
    }

    pub(super) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Token carried by the most recent confirmation email.
    pub(super) fn last_token(&self) -> String {
        let sent = self.sent();
        let email = sent.last().expect("an email was sent");
        token_from(email)
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailerError::Transport("connection timed out".to_string()));
        }
        self.sent
            .lock()
            .expect("mailer mutex poisoned")
            .push(email.clone());
        Ok(())
    }
}

pub(super) fn token_from(email: &OutboundEmail) -> String {
    let marker = "/verify?token=";
    let start = email
        .text_body
        .find(marker)
        .expect("confirmation link present")
        + marker.len();
    email.text_body[start..]
        .split_whitespace()
        .next()
        .expect("token follows link")
        .to_string()
}

pub(super) type TestService = VerificationService<InMemoryContactRepository, RecordingMailer>;

pub(super) struct Harness {
    pub(super) service: TestService,
    pub(super) repository: Arc<InMemoryContactRepository>,
    pub(super) mailer: Arc<RecordingMailer>,
    pub(super) clock: Arc<ManualClock>,
}

pub(super) fn build_harness() -> Harness {
    let repository = Arc::new(InMemoryContactRepository::default());
    let mailer = Arc::new(RecordingMailer::default());
    let clock = Arc::new(ManualClock::new(start_time()));
    let service = VerificationService::with_clock(
        repository.clone(),
        mailer.clone(),
        clock.clone(),
        settings(),
    );
    Harness {
        service,
        repository,
        mailer,
        clock,
    }
}

pub(super) struct UnavailableRepository;

impl ContactRepository for UnavailableRepository {
    fn upsert_pending(&self, _pending: PendingContact) -> Result<UpsertOutcome, RepositoryError> {
        Err(RepositoryError::Unavailable("disk full".to_string()))
    }

    fn find_by_token(&self, _token: &str) -> Result<Option<Contact>, RepositoryError> {
        Err(RepositoryError::Unavailable("disk full".to_string()))
    }

    fn mark_verified(
        &self,
        _id: &ContactId,
        _consumed: &TokenDigest,
        _at: DateTime<Utc>,
    ) -> Result<Contact, RepositoryError> {
        Err(RepositoryError::Unavailable("disk full".to_string()))
    }

    fn fetch_by_email(&self, _email: &EmailAddress) -> Result<Option<Contact>, RepositoryError> {
        Err(RepositoryError::Unavailable("disk full".to_string()))
    }

    fn list(&self) -> Result<Vec<Contact>, RepositoryError> {
        Err(RepositoryError::Unavailable("disk full".to_string()))
    }
}

pub(super) async fn read_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf-8 body")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    serde_json::from_str(&read_body(response).await).expect("json payload")
}
