//! Session registry: one live session per client cryptographic identity.
//!
//! Logins are authenticated twice over: the transport has already proven
//! possession of a client certificate (whose fingerprint arrives here), and
//! the credential collaborator checks username/password. The registry's own
//! policy is the cap — a fingerprint may own at most one live session,
//! independent of which username it logs in as. This bounds how many
//! devices holding a given certificate can be logged in simultaneously.
//!
//! Sessions never expire on their own; token lifetime is caller-managed
//! and ends at logout.
//!
//! # Mutex Behavior
//!
//! All registry state lives behind a single `Mutex` so the token map, the
//! active-fingerprint set and the token-to-fingerprint map always mutate
//! together: no reader can observe a token without its fingerprint marked
//! active, or vice versa. A poisoned mutex (from panic in another thread)
//! will cause panic; fail-fast is intentional here.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

use crate::domain::Role;
use crate::ports::CredentialVerifier;

/// Error type for session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Another session is live for the same certificate fingerprint.
    /// Reported regardless of whether the offered credentials are valid,
    /// and always distinct from `InvalidCredentials`.
    #[error("another session is already active for this client identity")]
    ConcurrentSessionDenied,

    #[error("invalid username or password")]
    InvalidCredentials,

    /// The transport supplied no client certificate identity.
    #[error("client certificate identity required")]
    IdentityRequired,

    #[error("credential source failure: {0}")]
    CredentialBackend(String),
}

/// Stable identifier for a client's cryptographic identity.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Accept the transport layer's peer identity string.
    ///
    /// # Errors
    /// Returns `SessionError::IdentityRequired` when the transport has no
    /// authenticated peer identity — requests without one never reach the
    /// login path silently.
    pub fn from_peer(peer: Option<&str>) -> Result<Self, SessionError> {
        match peer {
            Some(s) if !s.trim().is_empty() => Ok(Self(s.to_string())),
            _ => Err(SessionError::IdentityRequired),
        }
    }

    /// Derive a fingerprint from certificate DER bytes (SHA-256 hex).
    #[must_use]
    pub fn of_certificate(der: &[u8]) -> Self {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(der);
        Self(
            hasher
                .finalize()
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect(),
        )
    }
}

impl std::fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Enough to correlate in logs, not the whole identity.
        let prefix: String = self.0.chars().take(8).collect();
        write!(f, "Fingerprint({prefix}…)")
    }
}

/// Opaque, unguessable session token.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// 256 bits of OS entropy, base64url.
    fn mint() -> Self {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// The wire form handed to the client.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rebuild a token from its wire form (e.g. a request header).
    #[must_use]
    pub fn from_str_unchecked(s: &str) -> Self {
        Self(s.to_string())
    }
}

// Tokens are bearer secrets; Debug must not print them.
impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionToken(…)")
    }
}

/// The authenticated principal behind a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
    pub role: Role,
}

#[derive(Default)]
struct RegistryState {
    /// token → principal
    sessions: HashMap<SessionToken, Principal>,
    /// fingerprints with a live session
    active: HashSet<Fingerprint>,
    /// token → owning fingerprint, for release on logout
    owners: HashMap<SessionToken, Fingerprint>,
}

/// Registry owning all session state.
pub struct SessionRegistry<C>
where
    C: CredentialVerifier,
{
    verifier: Arc<C>,
    state: Mutex<RegistryState>,
}

impl<C> SessionRegistry<C>
where
    C: CredentialVerifier,
{
    /// Create a registry over a credential source.
    pub fn new(verifier: Arc<C>) -> Self {
        Self {
            verifier,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Authenticate and open a session bound to the client fingerprint.
    ///
    /// The fingerprint cap is checked before credentials, so a busy
    /// fingerprint is refused with `ConcurrentSessionDenied` no matter
    /// what credentials were offered. Credential verification runs outside
    /// the lock; the cap is re-checked inside the critical section that
    /// installs the session, so racing logins resolve to exactly one
    /// winner.
    ///
    /// # Errors
    /// `ConcurrentSessionDenied`, `InvalidCredentials`, or
    /// `CredentialBackend` when the credential source itself fails.
    pub fn login(
        &self,
        username: &str,
        password: &str,
        fingerprint: &Fingerprint,
    ) -> Result<SessionToken, SessionError> {
        {
            let state = self.state.lock().expect("Lock failed");
            if state.active.contains(fingerprint) {
                tracing::info!(?fingerprint, "login refused: identity already active");
                return Err(SessionError::ConcurrentSessionDenied);
            }
        }

        let role = self
            .verifier
            .verify(username, password)
            .map_err(|e| SessionError::CredentialBackend(e.to_string()))?
            .ok_or(SessionError::InvalidCredentials)?;

        let token = SessionToken::mint();

        {
            let mut state = self.state.lock().expect("Lock failed");
            // A racing login may have activated this fingerprint since the
            // pre-check; the insertion is the authoritative test.
            if !state.active.insert(fingerprint.clone()) {
                tracing::info!(?fingerprint, "login lost race: identity already active");
                return Err(SessionError::ConcurrentSessionDenied);
            }
            state.sessions.insert(
                token.clone(),
                Principal {
                    username: username.to_string(),
                    role,
                },
            );
            state.owners.insert(token.clone(), fingerprint.clone());
        }

        tracing::info!(%role, ?fingerprint, "session opened");
        Ok(token)
    }

    /// Close a session and release its fingerprint.
    ///
    /// Idempotent: an unknown (or already logged-out) token is a no-op, so
    /// double logouts and races are harmless.
    pub fn logout(&self, token: &SessionToken) {
        let mut state = self.state.lock().expect("Lock failed");
        if let Some(fingerprint) = state.owners.remove(token) {
            state.sessions.remove(token);
            state.active.remove(&fingerprint);
            tracing::info!(?fingerprint, "session closed");
        }
    }

    /// Look up the principal behind a token.
    ///
    /// Pure read; safe to call concurrently with login/logout and never
    /// observes a half-installed session.
    #[must_use]
    pub fn resolve(&self, token: &SessionToken) -> Option<Principal> {
        let state = self.state.lock().expect("Lock failed");
        state.sessions.get(token).cloned()
    }

    /// Number of live sessions.
    #[must_use]
    pub fn live_sessions(&self) -> usize {
        let state = self.state.lock().expect("Lock failed");
        debug_assert_eq!(state.sessions.len(), state.active.len());
        debug_assert_eq!(state.sessions.len(), state.owners.len());
        state.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::credential_file::FileCredentials;
    use std::thread;

    fn registry() -> SessionRegistry<FileCredentials> {
        let dr_hash = FileCredentials::hash_password("p1").expect("Should hash");
        let nurse_hash = FileCredentials::hash_password("p2").expect("Should hash");
        let creds = FileCredentials::parse(&format!(
            "drA:doctor:{dr_hash}\nnurseB:nurse:{nurse_hash}\n"
        ))
        .expect("Should parse");
        SessionRegistry::new(Arc::new(creds))
    }

    fn fp(s: &str) -> Fingerprint {
        Fingerprint::from_peer(Some(s)).expect("Should accept")
    }

    #[test]
    fn test_login_resolve_logout() {
        let registry = registry();
        let token = registry
            .login("drA", "p1", &fp("abc"))
            .expect("Should log in");

        let principal = registry.resolve(&token).expect("Should resolve");
        assert_eq!(principal.username, "drA");
        assert_eq!(principal.role, Role::Doctor);

        registry.logout(&token);
        assert!(registry.resolve(&token).is_none());
        assert_eq!(registry.live_sessions(), 0);
    }

    #[test]
    fn test_invalid_credentials() {
        let registry = registry();
        assert!(matches!(
            registry.login("drA", "wrong", &fp("abc")),
            Err(SessionError::InvalidCredentials)
        ));
        assert!(matches!(
            registry.login("ghost", "p1", &fp("abc")),
            Err(SessionError::InvalidCredentials)
        ));
        assert_eq!(registry.live_sessions(), 0);
    }

    #[test]
    fn test_one_session_per_fingerprint() {
        let registry = registry();
        let t1 = registry
            .login("drA", "p1", &fp("abc"))
            .expect("First login should succeed");

        // Same fingerprint, different (valid) credentials: still refused.
        assert!(matches!(
            registry.login("nurseB", "p2", &fp("abc")),
            Err(SessionError::ConcurrentSessionDenied)
        ));
        // Same fingerprint, invalid credentials: the cap answers first.
        assert!(matches!(
            registry.login("drA", "wrong", &fp("abc")),
            Err(SessionError::ConcurrentSessionDenied)
        ));

        registry.logout(&t1);
        let t2 = registry
            .login("nurseB", "p2", &fp("abc"))
            .expect("Login after logout should succeed");
        assert_eq!(
            registry.resolve(&t2).expect("Should resolve").role,
            Role::Nurse
        );
    }

    #[test]
    fn test_distinct_fingerprints_are_independent() {
        let registry = registry();
        let t1 = registry
            .login("drA", "p1", &fp("device-1"))
            .expect("Should log in");
        let t2 = registry
            .login("nurseB", "p2", &fp("device-2"))
            .expect("Should log in");

        assert_ne!(t1.as_str(), t2.as_str());
        assert_eq!(registry.live_sessions(), 2);
    }

    #[test]
    fn test_logout_unknown_token_is_noop() {
        let registry = registry();
        let t1 = registry
            .login("drA", "p1", &fp("abc"))
            .expect("Should log in");

        registry.logout(&SessionToken::from_str_unchecked("no-such-token"));

        // Double logout is also a no-op.
        registry.logout(&t1);
        registry.logout(&t1);
        assert_eq!(registry.live_sessions(), 0);
    }

    #[test]
    fn test_missing_identity_rejected() {
        assert!(matches!(
            Fingerprint::from_peer(None),
            Err(SessionError::IdentityRequired)
        ));
        assert!(matches!(
            Fingerprint::from_peer(Some("   ")),
            Err(SessionError::IdentityRequired)
        ));
    }

    #[test]
    fn test_certificate_fingerprint_is_stable() {
        let a = Fingerprint::of_certificate(b"der bytes");
        let b = Fingerprint::of_certificate(b"der bytes");
        assert_eq!(a, b);
        assert_ne!(a, Fingerprint::of_certificate(b"other der"));
    }

    #[test]
    fn test_racing_logins_one_winner() {
        let registry = Arc::new(registry());
        let fingerprint = fp("shared-device");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let fingerprint = fingerprint.clone();
                thread::spawn(move || registry.login("drA", "p1", &fingerprint))
            })
            .collect();

        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("Thread should finish"))
            .collect();

        let winners: Vec<_> = results.iter().filter(|r| r.is_ok()).collect();
        assert_eq!(winners.len(), 1);
        assert!(results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| matches!(r, Err(SessionError::ConcurrentSessionDenied))));
        assert_eq!(registry.live_sessions(), 1);
    }

    #[test]
    fn test_token_debug_redacted() {
        let registry = registry();
        let token = registry
            .login("drA", "p1", &fp("abc"))
            .expect("Should log in");
        let debug_output = format!("{token:?}");
        assert!(!debug_output.contains(token.as_str()));
    }
}
