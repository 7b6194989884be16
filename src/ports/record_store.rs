//! Record store port: opaque persistence of sealed patient records.
//!
//! The core never inspects row shape; it hands a `PatientRecord` over and
//! gets one back, keyed by a store-assigned id.

use crate::domain::{PatientRecord, RecordId, SearchQuery};

/// Trait for persisting sealed records.
pub trait RecordStore: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Insert a new record, returning its assigned id.
    ///
    /// # Errors
    /// Returns error if the storage operation fails.
    fn insert(&self, record: &PatientRecord) -> Result<RecordId, Self::Error>;

    /// Replace an existing record wholesale.
    ///
    /// Records are never patched in place; an update recomputes the whole
    /// sealed bundle and overwrites it.
    ///
    /// # Errors
    /// Returns error if the record does not exist or the operation fails.
    fn update(&self, id: RecordId, record: &PatientRecord) -> Result<(), Self::Error>;

    /// Fetch a record by id.
    ///
    /// # Errors
    /// Returns error if the storage operation fails.
    fn fetch(&self, id: RecordId) -> Result<Option<PatientRecord>, Self::Error>;

    /// Search records by one of the supported query modes.
    ///
    /// # Errors
    /// Returns error if the storage operation fails.
    fn search(&self, query: &SearchQuery) -> Result<Vec<PatientRecord>, Self::Error>;
}
