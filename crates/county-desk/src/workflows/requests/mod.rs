//! Forwarding property requests to county PVA and Zoning offices.

pub mod directory;
pub mod domain;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use directory::{DirectoryError, MappingSource, RecipientDirectory, Recipients, Resolution};
pub use domain::{infer_city, County, DispatchError, DispatchRequest, Office, PropertyRequest};
pub use router::request_router;
pub use service::{DeliveryOutcome, DispatchReport, RequestDispatcher};
