//! Key store adapters: PEM files on disk and an in-process map.
//!
//! The on-disk layout mirrors how role keys are installed operationally:
//! one directory per role under a key root, holding `public.key` (SPKI PEM)
//! and `private.key` (PKCS#8 PEM). Key generation and installation are
//! outside this system; missing material is an error, never generated on
//! the fly.

use std::collections::HashMap;
use std::path::PathBuf;

use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::domain::Role;
use crate::ports::KeyStore;

/// Error type for key loading.
#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("no {which} key for {role} at {path}")]
    NotFound {
        role: Role,
        which: &'static str,
        path: PathBuf,
    },

    #[error("key for {role} is not provisioned")]
    Unprovisioned { role: Role },

    #[error("failed to parse key material for {role}: {reason}")]
    Parse { role: Role, reason: String },

    #[error("key source I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Key store reading PEM files from `<root>/<role>/{public,private}.key`.
pub struct PemKeyStore {
    root: PathBuf,
}

impl PemKeyStore {
    #[must_use]
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    fn key_path(&self, role: Role, which: &'static str) -> PathBuf {
        self.root.join(role.as_str()).join(format!("{which}.key"))
    }

    fn read_pem(&self, role: Role, which: &'static str) -> Result<String, KeyStoreError> {
        let path = self.key_path(role, which);
        if !path.exists() {
            return Err(KeyStoreError::NotFound { role, which, path });
        }
        Ok(std::fs::read_to_string(path)?)
    }
}

impl KeyStore for PemKeyStore {
    type Error = KeyStoreError;

    fn load_public_key(&self, role: Role) -> Result<RsaPublicKey, Self::Error> {
        let pem = self.read_pem(role, "public")?;
        RsaPublicKey::from_public_key_pem(&pem).map_err(|e| KeyStoreError::Parse {
            role,
            reason: e.to_string(),
        })
    }

    fn load_private_key(&self, role: Role) -> Result<RsaPrivateKey, Self::Error> {
        let pem = self.read_pem(role, "private")?;
        RsaPrivateKey::from_pkcs8_pem(&pem).map_err(|e| KeyStoreError::Parse {
            role,
            reason: e.to_string(),
        })
    }
}

/// In-process key store for embedded deployments and tests.
///
/// Roles may be partially provisioned (public key only, or nothing at
/// all); lookups against missing material fail like a missing key file
/// would.
#[derive(Default)]
pub struct MemoryKeyStore {
    public: HashMap<Role, RsaPublicKey>,
    private: HashMap<Role, RsaPrivateKey>,
}

impl MemoryKeyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision a role with a full key pair (public derived from private).
    #[must_use]
    pub fn with_keypair(mut self, role: Role, private: RsaPrivateKey) -> Self {
        self.public.insert(role, RsaPublicKey::from(&private));
        self.private.insert(role, private);
        self
    }

    /// Provision a role with only its public half.
    #[must_use]
    pub fn with_public_key(mut self, role: Role, public: RsaPublicKey) -> Self {
        self.public.insert(role, public);
        self
    }
}

impl KeyStore for MemoryKeyStore {
    type Error = KeyStoreError;

    fn load_public_key(&self, role: Role) -> Result<RsaPublicKey, Self::Error> {
        self.public
            .get(&role)
            .cloned()
            .ok_or(KeyStoreError::Unprovisioned { role })
    }

    fn load_private_key(&self, role: Role) -> Result<RsaPrivateKey, Self::Error> {
        self.private
            .get(&role)
            .cloned()
            .ok_or(KeyStoreError::Unprovisioned { role })
    }
}
