//! Patient record data model.
//!
//! A record's clinical payload (symptoms, diagnosis, optional image and
//! video) only ever leaves the crate sealed; the surrounding metadata
//! (names, dates) is stored in the clear, with the patient identifier
//! replaced by its SHA-256 hash so storage can match on it without holding
//! the raw id.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Role;

/// Storage-assigned record identifier.
pub type RecordId = i64;

/// Attachment kinds a record can carry, at most one of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttachmentKind {
    Image,
    Video,
}

impl AttachmentKind {
    /// Staged file extensions accepted for this kind.
    #[must_use]
    pub fn staged_extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Image => &["jpg", "jpeg", "png"],
            Self::Video => &["mp4", "avi"],
        }
    }

    /// File name used when restored plaintext media is published.
    #[must_use]
    pub fn restored_file_name(&self, record_id: RecordId) -> String {
        match self {
            Self::Image => format!("restored_image_{record_id}.jpg"),
            Self::Video => format!("restored_video_{record_id}.mp4"),
        }
    }
}

impl std::fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => f.write_str("image"),
            Self::Video => f.write_str("video"),
        }
    }
}

/// A plaintext media blob tagged by kind.
#[derive(Clone)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("kind", &self.kind)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

/// Plaintext clinical payload handed in for encryption.
#[derive(Debug, Clone, Default)]
pub struct RecordDraft {
    pub symptoms: String,
    pub diagnosis: String,
    /// Zero or more staged blobs; the crypto service keeps the first of
    /// each kind and ignores the rest.
    pub attachments: Vec<Attachment>,
}

/// The sealed payload bundle of one record.
///
/// Each payload field is `IV(12) ‖ AES-GCM ciphertext‖tag`; a zero-length
/// field means "no attachment" (absence and emptiness are the same thing at
/// this layer). The two wrapped-key fields carry the record's single
/// payload key under each role's public key, which is what gives dual-role
/// access without storing two ciphertext copies.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct RecordCiphertext {
    pub symptoms: Vec<u8>,
    pub diagnosis: Vec<u8>,
    pub image: Vec<u8>,
    pub video: Vec<u8>,
    pub doctor_wrapped_key: Vec<u8>,
    pub nurse_wrapped_key: Vec<u8>,
}

impl RecordCiphertext {
    /// The wrapped payload key for a role. Empty means no grant.
    #[must_use]
    pub fn wrapped_key_for(&self, role: Role) -> &[u8] {
        match role {
            Role::Doctor => &self.doctor_wrapped_key,
            Role::Nurse => &self.nurse_wrapped_key,
        }
    }

    /// The sealed attachment blob of a kind. Empty means absent.
    #[must_use]
    pub fn attachment(&self, kind: AttachmentKind) -> &[u8] {
        match kind {
            AttachmentKind::Image => &self.image,
            AttachmentKind::Video => &self.video,
        }
    }
}

impl std::fmt::Debug for RecordCiphertext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordCiphertext")
            .field("symptoms_bytes", &self.symptoms.len())
            .field("diagnosis_bytes", &self.diagnosis.len())
            .field("image_bytes", &self.image.len())
            .field("video_bytes", &self.video.len())
            .field("doctor_grant", &!self.doctor_wrapped_key.is_empty())
            .field("nurse_grant", &!self.nurse_wrapped_key.is_empty())
            .finish()
    }
}

/// Decrypted clinical payload as seen by an authorized role.
#[derive(Clone, PartialEq, Eq)]
pub struct DecryptedRecord {
    pub symptoms: String,
    pub diagnosis: String,
    pub image: Option<Vec<u8>>,
    pub video: Option<Vec<u8>>,
}

impl DecryptedRecord {
    #[must_use]
    pub fn attachment(&self, kind: AttachmentKind) -> Option<&[u8]> {
        match kind {
            AttachmentKind::Image => self.image.as_deref(),
            AttachmentKind::Video => self.video.as_deref(),
        }
    }
}

impl std::fmt::Debug for DecryptedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Plaintext stays out of Debug output; logs only ever see sizes.
        f.debug_struct("DecryptedRecord")
            .field("symptoms_chars", &self.symptoms.len())
            .field("diagnosis_chars", &self.diagnosis.len())
            .field("image_bytes", &self.image.as_ref().map(Vec::len))
            .field("video_bytes", &self.video.as_ref().map(Vec::len))
            .finish()
    }
}

/// A stored patient record: clear metadata plus the sealed payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientRecord {
    /// `None` until the store assigns an id on insert.
    pub id: Option<RecordId>,
    /// SHA-256 hex of the plaintext patient identifier.
    pub patient_id_hash: String,
    pub patient_name: String,
    pub date_of_birth: NaiveDate,
    pub doctor_name: String,
    pub nurse_name: String,
    pub checked_in_at: DateTime<Utc>,
    pub sealed: RecordCiphertext,
}

/// Intake data for admitting or updating a record.
#[derive(Debug, Clone)]
pub struct Admission {
    pub patient_id: String,
    pub patient_name: String,
    pub date_of_birth: NaiveDate,
    pub doctor_name: String,
    pub nurse_name: String,
    pub symptoms: String,
    pub diagnosis: String,
}

/// Search modes supported by the record store.
#[derive(Debug, Clone)]
pub enum SearchQuery {
    /// Exact match on the hash of this plaintext patient id.
    PatientId(String),
    /// Substring match on the patient name, exact matches first.
    Name(String),
    /// Substring match on the date of birth (e.g. "2000" for a year).
    DateOfBirth(String),
    /// Capped unfiltered listing.
    All,
}

/// Hash a plaintext patient identifier for storage and lookup.
#[must_use]
pub fn hash_patient_id(patient_id: &str) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(patient_id.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
