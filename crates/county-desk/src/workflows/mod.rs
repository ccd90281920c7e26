pub mod contacts;
pub mod requests;
