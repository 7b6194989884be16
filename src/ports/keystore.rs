//! KeyStore port: long-lived asymmetric key material per role.
//!
//! Key generation, rotation and distribution happen outside this system;
//! the core only ever loads what an external key source already holds.

use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::domain::Role;

/// Trait for loading role key pairs from an external key source.
///
/// Loading is stateless per call; concurrent callers must not share
/// mutable state through an implementation.
pub trait KeyStore: Send + Sync {
    /// Error type for key loading operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load a role's public key.
    ///
    /// # Errors
    /// Returns error if the key does not exist or cannot be parsed.
    fn load_public_key(&self, role: Role) -> Result<RsaPublicKey, Self::Error>;

    /// Load a role's private key.
    ///
    /// # Errors
    /// Returns error if the key does not exist or cannot be parsed.
    fn load_private_key(&self, role: Role) -> Result<RsaPrivateKey, Self::Error>;
}
