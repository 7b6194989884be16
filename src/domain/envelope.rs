//! Envelope cipher for record payloads.
//!
//! Each record is encrypted under one fresh 256-bit AES-GCM key; that key is
//! then wrapped with RSA-OAEP under each role's public key, so either role's
//! private key recovers the same payload key.
//!
//! # Wire format
//!
//! Every sealed field is laid out as `IV (12 bytes) ‖ ciphertext‖tag`. This
//! byte layout is a compatibility contract: the encrypting and decrypting
//! sides may be different binaries.
//!
//! # Security
//!
//! - A fresh IV is drawn from OS entropy inside every `seal` call. Callers
//!   cannot supply one; the same key intentionally seals several fields of
//!   one record, and IV reuse under a shared key breaks GCM.
//! - `RecordKey` implements `Zeroize`/`ZeroizeOnDrop` and its `Debug`
//!   output never contains key bytes.

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES-GCM IV length in bytes (96 bits).
pub const IV_LEN: usize = 12;

/// Payload key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Errors from envelope operations.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// AEAD tag mismatch or malformed blob. Wrong key, wrong role and
    /// genuine corruption are indistinguishable by design; callers must
    /// treat this as "cannot prove access", not as a corrupted record.
    #[error("authentication failure: ciphertext rejected")]
    AuthenticationFailure,

    #[error("key wrapping failed: {0}")]
    KeyWrap(String),

    /// The wrapped key is empty or does not decrypt under this private key.
    #[error("wrapped key could not be recovered")]
    KeyUnwrapFailure,
}

/// Per-record symmetric payload key.
///
/// Generated fresh for every record and never reused across records.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct RecordKey([u8; KEY_LEN]);

impl RecordKey {
    /// Generate a fresh key from OS entropy.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let mut key = [0u8; KEY_LEN];
        if bytes.len() != KEY_LEN {
            return None;
        }
        key.copy_from_slice(bytes);
        Some(Self(key))
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

// Key bytes must never reach logs or error messages.
impl std::fmt::Debug for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordKey")
            .field("len", &KEY_LEN)
            .finish()
    }
}

/// Seal a plaintext under the record key.
///
/// Output is `IV ‖ ciphertext‖tag` with a fresh random IV per call.
///
/// # Errors
/// Returns `EnvelopeError::Encryption` if the AEAD rejects the input.
pub fn seal(plaintext: &[u8], key: &RecordKey) -> Result<Vec<u8>, EnvelopeError> {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    let nonce = Nonce::from_slice(&iv);

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| EnvelopeError::Encryption(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| EnvelopeError::Encryption(e.to_string()))?;

    let mut blob = Vec::with_capacity(IV_LEN + ciphertext.len());
    blob.extend_from_slice(&iv);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Open a sealed blob under the record key.
///
/// # Errors
/// Returns `EnvelopeError::AuthenticationFailure` if the blob is shorter
/// than an IV or the tag check fails.
pub fn open(blob: &[u8], key: &RecordKey) -> Result<Vec<u8>, EnvelopeError> {
    if blob.len() < IV_LEN {
        return Err(EnvelopeError::AuthenticationFailure);
    }
    let (iv, ciphertext) = blob.split_at(IV_LEN);
    let nonce = Nonce::from_slice(iv);

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|_| EnvelopeError::AuthenticationFailure)?;
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| EnvelopeError::AuthenticationFailure)
}

/// Wrap the record key under a role's public key.
///
/// RSA-OAEP with SHA-256 for both the hash and MGF1.
///
/// # Errors
/// Returns `EnvelopeError::KeyWrap` if the RSA operation fails.
pub fn wrap_key(key: &RecordKey, public: &RsaPublicKey) -> Result<Vec<u8>, EnvelopeError> {
    let mut rng = rand::rngs::OsRng;
    public
        .encrypt(&mut rng, Oaep::new::<Sha256>(), key.as_bytes())
        .map_err(|e| EnvelopeError::KeyWrap(e.to_string()))
}

/// Unwrap a record key with a role's private key.
///
/// # Errors
/// Returns `EnvelopeError::KeyUnwrapFailure` if `wrapped` is empty or the
/// private key does not match the wrapping public key (detected via the
/// OAEP padding check; no finer cause is reported).
pub fn unwrap_key(wrapped: &[u8], private: &RsaPrivateKey) -> Result<RecordKey, EnvelopeError> {
    if wrapped.is_empty() {
        return Err(EnvelopeError::KeyUnwrapFailure);
    }
    let mut bytes = private
        .decrypt(Oaep::new::<Sha256>(), wrapped)
        .map_err(|_| EnvelopeError::KeyUnwrapFailure)?;
    let key = RecordKey::from_bytes(&bytes).ok_or(EnvelopeError::KeyUnwrapFailure);
    bytes.zeroize();
    key
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::OnceLock;

    /// RSA key generation is expensive; tests share one pair per role.
    pub(crate) fn test_keypair() -> &'static (RsaPrivateKey, RsaPublicKey) {
        static KEYS: OnceLock<(RsaPrivateKey, RsaPublicKey)> = OnceLock::new();
        KEYS.get_or_init(|| {
            let private =
                RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048).expect("Should generate key");
            let public = RsaPublicKey::from(&private);
            (private, public)
        })
    }

    pub(crate) fn other_keypair() -> &'static (RsaPrivateKey, RsaPublicKey) {
        static KEYS: OnceLock<(RsaPrivateKey, RsaPublicKey)> = OnceLock::new();
        KEYS.get_or_init(|| {
            let private =
                RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048).expect("Should generate key");
            let public = RsaPublicKey::from(&private);
            (private, public)
        })
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let key = RecordKey::generate();
        let plaintext = b"persistent dry cough, mild fever";

        let blob = seal(plaintext, &key).expect("Should seal");
        let opened = open(&blob, &key).expect("Should open");

        assert_eq!(opened, plaintext);
        // Wire layout: IV(12) ‖ ciphertext(len(pt)) ‖ tag(16), nothing else.
        assert_eq!(blob.len(), IV_LEN + plaintext.len() + 16);
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let key = RecordKey::generate();
        let plaintext = b"same plaintext, same key";

        let first = seal(plaintext, &key).expect("Should seal");
        let second = seal(plaintext, &key).expect("Should seal");

        assert_ne!(first, second);
        assert_ne!(first[..IV_LEN], second[..IV_LEN]);
    }

    #[test]
    fn test_tamper_detected() {
        let key = RecordKey::generate();
        let mut blob = seal(b"diagnosis: stable", &key).expect("Should seal");

        // Flip one bit anywhere in the blob.
        for idx in [0, IV_LEN, blob.len() - 1] {
            blob[idx] ^= 0x01;
            let result = open(&blob, &key);
            assert!(matches!(result, Err(EnvelopeError::AuthenticationFailure)));
            blob[idx] ^= 0x01;
        }
    }

    #[test]
    fn test_wrong_key_rejected() {
        let key = RecordKey::generate();
        let blob = seal(b"payload", &key).expect("Should seal");

        let other = RecordKey::generate();
        assert!(matches!(
            open(&blob, &other),
            Err(EnvelopeError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_short_blob_rejected() {
        let key = RecordKey::generate();
        assert!(matches!(
            open(&[0u8; IV_LEN - 1], &key),
            Err(EnvelopeError::AuthenticationFailure)
        ));
        assert!(matches!(
            open(&[], &key),
            Err(EnvelopeError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_wrap_unwrap_roundtrip() {
        let (private, public) = test_keypair();
        let key = RecordKey::generate();

        let wrapped = wrap_key(&key, public).expect("Should wrap");
        let unwrapped = unwrap_key(&wrapped, private).expect("Should unwrap");

        assert_eq!(unwrapped.as_bytes(), key.as_bytes());
    }

    #[test]
    fn test_unwrap_with_wrong_private_key_fails() {
        let (_, public) = test_keypair();
        let (other_private, _) = other_keypair();
        let key = RecordKey::generate();

        let wrapped = wrap_key(&key, public).expect("Should wrap");
        assert!(matches!(
            unwrap_key(&wrapped, other_private),
            Err(EnvelopeError::KeyUnwrapFailure)
        ));
    }

    #[test]
    fn test_unwrap_empty_fails() {
        let (private, _) = test_keypair();
        assert!(matches!(
            unwrap_key(&[], private),
            Err(EnvelopeError::KeyUnwrapFailure)
        ));
    }

    #[test]
    fn test_record_key_debug_no_leak() {
        let key = RecordKey::generate();
        assert_eq!(format!("{key:?}"), "RecordKey { len: 32 }");
    }
}
