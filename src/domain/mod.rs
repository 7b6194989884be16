//! Domain layer: record data model, roles, and the envelope cipher.

pub mod envelope;
mod record;
mod role;

pub use envelope::{EnvelopeError, RecordKey};
pub use record::{
    hash_patient_id, Admission, Attachment, AttachmentKind, DecryptedRecord, PatientRecord,
    RecordCiphertext, RecordDraft, RecordId, SearchQuery,
};
pub use role::Role;
