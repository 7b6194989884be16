//! Credential port: username/password verification against an external
//! credential source.

use crate::domain::Role;

/// Trait for credential verification.
pub trait CredentialVerifier: Send + Sync {
    /// Error type for backend failures (unreadable source, not bad input).
    type Error: std::error::Error + Send + Sync + 'static;

    /// Check a username/password pair.
    ///
    /// Returns the principal's role on success and `None` when the pair
    /// does not match — unknown user and wrong password are deliberately
    /// the same outcome.
    ///
    /// # Errors
    /// Returns error only when the credential source itself fails.
    fn verify(&self, username: &str, password: &str) -> Result<Option<Role>, Self::Error>;
}
