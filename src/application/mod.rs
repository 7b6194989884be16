//! Application layer: use cases and services.
//!
//! This module orchestrates domain logic with ports to implement the core
//! flows: sealing/opening records and managing certificate-bound sessions.

mod record_crypto;
mod records;
mod session;

pub use record_crypto::{RecordCryptoError, RecordCryptoService};
pub use records::RecordService;
pub use session::{Fingerprint, Principal, SessionError, SessionRegistry, SessionToken};
