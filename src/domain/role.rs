//! Clinical roles with decryption rights on a record.
//!
//! The set is closed: every role-keyed lookup in the crate (key paths,
//! wrapped-key fields) is an exhaustive match, so there is no "unknown
//! role" fallthrough to mishandle.

use serde::{Deserialize, Serialize};

/// A clinical role holding an asymmetric key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Attending doctor
    Doctor,
    /// Attending nurse
    Nurse,
}

impl Role {
    /// All roles, in the order their wrapped keys appear on a record.
    pub const ALL: [Role; 2] = [Role::Doctor, Role::Nurse];

    /// Stable lowercase name, used for key directory layout and storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Doctor => "doctor",
            Self::Nurse => "nurse",
        }
    }

    /// Parse a stored role name.
    ///
    /// # Errors
    /// Returns the unrecognized input on failure.
    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "doctor" => Ok(Self::Doctor),
            "nurse" => Ok(Self::Nurse),
            other => Err(format!("unrecognized role: {other}")),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
