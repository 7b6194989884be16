//! # Mediseal
//!
//! Role-scoped confidentiality core for medical records.
//!
//! Each record's clinical payload (symptoms, diagnosis, optional image and
//! video) is sealed once under a fresh AES-256-GCM key; that key is wrapped
//! with RSA-OAEP under both the doctor and the nurse public key, so either
//! role opens the same bits with its own private key. A session registry
//! binds logins to client-certificate fingerprints and allows at most one
//! live session per fingerprint.
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: roles, the record data model, and the envelope cipher
//! - `ports`: trait definitions for external collaborators (key store,
//!   credential source, record store, media staging)
//! - `adapters`: concrete implementations (PEM key files, credential file,
//!   SQLite, staging directory)
//! - `application`: use cases orchestrating domain and ports
//! - `telemetry`: tracing setup with log sanitization

pub mod adapters;
pub mod application;
pub mod domain;
pub mod ports;
pub mod telemetry;

pub use application::{
    Fingerprint, Principal, RecordCryptoError, RecordCryptoService, RecordService, SessionError,
    SessionRegistry, SessionToken,
};
pub use domain::{
    Admission, DecryptedRecord, EnvelopeError, PatientRecord, RecordCiphertext, RecordDraft, Role,
    SearchQuery,
};

/// Result type for Mediseal operations.
pub type Result<T> = std::result::Result<T, MedisealError>;

/// Main error type for Mediseal.
#[derive(Debug, thiserror::Error)]
pub enum MedisealError {
    #[error("record crypto failed: {0}")]
    Crypto(#[from] application::RecordCryptoError),

    #[error("session operation failed: {0}")]
    Session(#[from] application::SessionError),

    #[error("storage operation failed: {0}")]
    Storage(#[from] adapters::StorageError),

    #[error("media staging failed: {0}")]
    Media(#[from] adapters::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
