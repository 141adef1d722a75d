//! # smartcity-storage
//!
//! Record store abstraction for the Smart City dashboard.
//!
//! The dashboard treats persistence as a collaborator keyed by [`Domain`]:
//! reads are parameterised by a [`RecordQuery`] (filter, sort order, limit)
//! and writes hand back the stored [`Record`]. Backends implement
//! [`RecordStore`]; this crate ships an in-memory backend and the
//! [`EventedStore`] wrapper that publishes record events after writes.
//!
//! ```ignore
//! use smartcity_storage::{InMemoryRecordStore, RecordQuery, RecordStore};
//!
//! let store = InMemoryRecordStore::new();
//! store.insert(Domain::Air, json!({"AQI": 120})).await?;
//! let newest = store.find(Domain::Air, &RecordQuery::newest(10)).await?;
//! ```

mod error;
pub mod evented;
pub mod memory;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use evented::EventedStore;
pub use memory::InMemoryRecordStore;
pub use traits::RecordStore;
pub use types::{RecordQuery, SortOrder};

pub use smartcity_core::{Domain, Record};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shareable record store.
pub type DynRecordStore = std::sync::Arc<dyn RecordStore>;
