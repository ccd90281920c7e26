//! Contact verification and county request dispatch for the county desk service.

pub mod clock;
pub mod config;
pub mod error;
pub mod mail;
pub mod telemetry;
pub mod workflows;
