//! # smartcity-core
//!
//! Core types shared by every Smart City crate: the data [`Domain`]s the
//! dashboard tracks, the [`Record`] envelope the record store hands out, and
//! the real-time [`events`] bus that pushes record changes to live clients.

pub mod domain;
pub mod error;
pub mod events;
pub mod record;

pub use domain::Domain;
pub use error::CoreError;
pub use record::Record;

/// Generate a new record identifier.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
