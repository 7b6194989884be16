//! Credential file adapter.
//!
//! Credentials live in a plain text file, one entry per line:
//!
//! ```text
//! # username:role:argon2-phc-hash
//! drA:doctor:$argon2id$v=19$m=19456,t=2,p=1$...
//! ```
//!
//! Blank lines and `#` comments are ignored. Passwords are verified against
//! Argon2id PHC hashes; an unknown user and a wrong password produce the
//! same non-match result, so callers cannot distinguish the two.

use std::path::Path;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::domain::Role;
use crate::ports::CredentialVerifier;

/// Error type for the credential file.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("credential file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("credential file line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("password hashing failed: {0}")]
    Hash(String),
}

#[derive(Debug)]
struct CredentialEntry {
    username: String,
    role: Role,
    password_hash: String,
}

/// Credential source backed by a text file, loaded once at construction.
#[derive(Debug)]
pub struct FileCredentials {
    entries: Vec<CredentialEntry>,
}

impl FileCredentials {
    /// Load and validate a credential file.
    ///
    /// # Errors
    /// Returns error if the file is unreadable or any line is malformed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CredentialError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse credential file content.
    ///
    /// # Errors
    /// Returns error if any non-comment line is malformed.
    pub fn parse(content: &str) -> Result<Self, CredentialError> {
        let mut entries = Vec::new();

        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut parts = line.splitn(3, ':');
            let (username, role, hash) = match (parts.next(), parts.next(), parts.next()) {
                (Some(u), Some(r), Some(h)) if !u.is_empty() => (u, r, h),
                _ => {
                    return Err(CredentialError::Malformed {
                        line: idx + 1,
                        reason: "expected username:role:hash".to_string(),
                    })
                }
            };

            let role = Role::parse(role).map_err(|reason| CredentialError::Malformed {
                line: idx + 1,
                reason,
            })?;

            // Reject unparseable hashes at load time rather than at login.
            PasswordHash::new(hash).map_err(|e| CredentialError::Malformed {
                line: idx + 1,
                reason: format!("bad password hash: {e}"),
            })?;

            entries.push(CredentialEntry {
                username: username.to_string(),
                role,
                password_hash: hash.to_string(),
            });
        }

        Ok(Self { entries })
    }

    /// Hash a password into the PHC string stored in the file.
    ///
    /// # Errors
    /// Returns error if hashing fails.
    pub fn hash_password(password: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut rand::rngs::OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| CredentialError::Hash(e.to_string()))
    }
}

impl CredentialVerifier for FileCredentials {
    type Error = CredentialError;

    fn verify(&self, username: &str, password: &str) -> Result<Option<Role>, Self::Error> {
        let Some(entry) = self.entries.iter().find(|e| e.username == username) else {
            tracing::debug!("credential check for unknown user");
            return Ok(None);
        };

        // Validated at load time; a parse failure here means the entries
        // were mutated since, treat it as a non-match.
        let Ok(parsed) = PasswordHash::new(&entry.password_hash) else {
            return Ok(None);
        };

        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(Some(entry.role)),
            Err(_) => Ok(None),
        }
    }
}
