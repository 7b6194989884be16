//! Adapters layer: concrete implementations of ports.
//!
//! - `pem_keystore`: role RSA keys from PEM files (or in-process)
//! - `credential_file`: text credential file with Argon2id hashes
//! - `sqlite`: SQLite persistence of sealed records
//! - `media_dir`: filesystem staging for attachment blobs

pub mod credential_file;
pub mod media_dir;
pub mod pem_keystore;
pub mod sqlite;

pub use credential_file::{CredentialError, FileCredentials};
pub use media_dir::{DirMediaStaging, MediaError};
pub use pem_keystore::{KeyStoreError, MemoryKeyStore, PemKeyStore};
pub use sqlite::{SqliteRecordStore, StorageError};
