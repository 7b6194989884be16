//! Media staging port: plaintext attachment blobs entering and leaving the
//! crypto core.
//!
//! Uploads are staged as files before encryption; decrypted media is
//! published back through the same bridge. The staging area only ever holds
//! plaintext transiently.

use crate::domain::{Attachment, RecordId};

/// Trait for the media staging bridge.
pub trait MediaStaging: Send + Sync {
    /// Error type for staging operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Collect staged attachments and consume their staging files.
    ///
    /// Implementations return at most one attachment per kind; which file
    /// wins when several of one kind are staged is the implementation's
    /// policy (first match, by convention).
    ///
    /// # Errors
    /// Returns error if the staging area cannot be read or cleared.
    fn take_staged(&self) -> Result<Vec<Attachment>, Self::Error>;

    /// Publish a decrypted attachment for a record.
    ///
    /// # Errors
    /// Returns error if the blob cannot be written out.
    fn publish(&self, record_id: RecordId, attachment: &Attachment) -> Result<(), Self::Error>;
}
