use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::mail::{Mailer, MailerError, OutboundEmail};
use crate::workflows::requests::{DispatchRequest, RecipientDirectory, Recipients, RequestDispatcher};

/// Records every accepted message; recipients listed in `unreachable` fail.
#[derive(Default)]
pub(super) struct OfficeMailer {
    sent: Mutex<Vec<OutboundEmail>>,
    unreachable: Mutex<HashSet<String>>,
}

impl OfficeMailer {
    pub(super) fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().expect("mailer mutex poisoned").clone()
    }

    pub(super) fn refuse(&self, address: &str) {
        self.unreachable
            .lock()
            .expect("mailer mutex poisoned")
            .insert(address.to_string());
    }
}

impl Mailer for OfficeMailer {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailerError> {
        if self
            .unreachable
            .lock()
            .expect("mailer mutex poisoned")
            .contains(&email.to)
        {
            return Err(MailerError::Transport("550 mailbox unavailable".to_string()));
        }
        self.sent
            .lock()
            .expect("mailer mutex poisoned")
            .push(email.clone());
        Ok(())
    }
}

pub(super) fn directory() -> RecipientDirectory {
    RecipientDirectory::with_builtin_mappings(Recipients::new(
        "pva@example.com",
        "zoning@example.com",
    ))
}

pub(super) fn dispatcher() -> (RequestDispatcher<OfficeMailer>, Arc<OfficeMailer>) {
    let mailer = Arc::new(OfficeMailer::default());
    let dispatcher = RequestDispatcher::new(Arc::new(directory()), mailer.clone());
    (dispatcher, mailer)
}

pub(super) fn carroll_request() -> DispatchRequest {
    DispatchRequest {
        address: "440 Main St, Carrollton, KY 41008".to_string(),
        county: "Carroll".to_string(),
        city: Some("Carrollton".to_string()),
        property_id: Some("C-1021".to_string()),
        send_to_pva: true,
        send_to_zoning: true,
    }
}
