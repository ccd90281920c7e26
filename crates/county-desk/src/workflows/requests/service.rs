use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::directory::{RecipientDirectory, Recipients};
use super::domain::{DispatchError, DispatchRequest, Office, PropertyRequest};
use crate::mail::{Mailer, OutboundEmail};

/// Forwards validated property requests to the county offices.
///
/// Stateless: every call resolves recipients and sends one email per selected office.
/// Repeated calls send duplicate emails.
pub struct RequestDispatcher<M> {
    directory: Arc<RecipientDirectory>,
    mailer: Arc<M>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Sent,
    Failed { error: String },
}

impl DeliveryOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryOutcome::Sent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub success: bool,
    pub address: String,
    pub county: &'static str,
    pub city: Option<String>,
    pub property_id: Option<String>,
    pub emails_used: Recipients,
    pub results: BTreeMap<Office, DeliveryOutcome>,
}

impl<M> RequestDispatcher<M>
where
    M: Mailer + 'static,
{
    pub fn new(directory: Arc<RecipientDirectory>, mailer: Arc<M>) -> Self {
        Self { directory, mailer }
    }

    pub fn directory(&self) -> &RecipientDirectory {
        &self.directory
    }

    /// Validates the request and sends it to each selected office.
    ///
    /// Validation failures send nothing. Delivery failures are reported per office.
    #[tracing::instrument(name = "dispatch request", skip_all)]
    pub fn dispatch(&self, request: DispatchRequest) -> Result<DispatchReport, DispatchError> {
        let request = request.validate()?;
        let resolution = self
            .directory
            .resolve(Some(request.county.name()), request.city.as_deref());
        info!(
            county = %request.county,
            city = request.city.as_deref().unwrap_or(""),
            source = ?resolution.source,
            "recipients resolved"
        );

        let mut results = BTreeMap::new();
        for office in &request.offices {
            let outcome = self.send_to(*office, &request, &resolution.recipients);
            results.insert(*office, outcome);
        }

        Ok(DispatchReport {
            success: results.values().all(DeliveryOutcome::is_sent),
            address: request.address,
            county: request.county.name(),
            city: request.city,
            property_id: request.property_id,
            emails_used: resolution.recipients,
            results,
        })
    }

    fn send_to(
        &self,
        office: Office,
        request: &PropertyRequest,
        recipients: &Recipients,
    ) -> DeliveryOutcome {
        let Some(to) = recipients.for_office(office) else {
            warn!(office = office.label(), "no recipient configured");
            return DeliveryOutcome::Failed {
                error: format!("no {} recipient configured", office.label()),
            };
        };

        match self.mailer.send(&request_email(office, request, to)) {
            Ok(()) => {
                info!(office = office.label(), to, "request sent");
                DeliveryOutcome::Sent
            }
            Err(err) => {
                warn!(office = office.label(), to, error = %err, "request delivery failed");
                DeliveryOutcome::Failed {
                    error: format!("could not deliver the {} request", office.label()),
                }
            }
        }
    }
}

pub(crate) fn request_email(office: Office, request: &PropertyRequest, to: &str) -> OutboundEmail {
    let mut body = format!(
        "Hello {office} office,\n\n\
         A records request has been submitted for the following property.\n\n\
         Address: {address}\n\
         County: {county}\n",
        office = office.label(),
        address = request.address,
        county = request.county,
    );
    if let Some(city) = &request.city {
        body.push_str(&format!("City: {city}\n"));
    }
    if let Some(property_id) = &request.property_id {
        body.push_str(&format!("Property ID: {property_id}\n"));
    }
    body.push_str("\nPlease reply with any records on file for this property.\n");

    OutboundEmail {
        to: to.to_string(),
        subject: format!("{} request for {}", office.label(), request.address),
        text_body: body,
        html_body: None,
    }
}
