//! Record crypto service: seals and opens whole records.
//!
//! One fresh payload key per record, each field sealed with its own IV,
//! and the key wrapped once per role — so a record is stored once but both
//! roles can open it independently.
//!
//! # Key Memory Security
//!
//! Role keys are loaded from the key store just-in-time per call and
//! dropped when the operation completes; the service holds no key material
//! between requests, and concurrent calls share no mutable cipher state.

use std::sync::Arc;

use crate::domain::{
    envelope, AttachmentKind, DecryptedRecord, EnvelopeError, RecordCiphertext, RecordDraft,
    RecordKey, Role,
};
use crate::ports::KeyStore;

/// Error type for record crypto operations.
#[derive(Debug, thiserror::Error)]
pub enum RecordCryptoError {
    /// A role's key could not be loaded. On the encrypt side this aborts
    /// the whole record: a record wrapped for only one role must never
    /// exist.
    #[error("key material unavailable for {role}: {reason}")]
    KeyMaterialUnavailable { role: Role, reason: String },

    /// The record carries no wrapped key for the requesting role
    /// (legacy or partial data).
    #[error("record carries no access grant for {0}")]
    NoAccessGrant(Role),

    /// Envelope failures pass through unchanged; an AEAD rejection means
    /// "cannot prove access", and callers get nothing finer than that.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error("decrypted {0} is not valid text")]
    MalformedPlaintext(&'static str),
}

/// Service sealing and opening records against the role key store.
pub struct RecordCryptoService<K>
where
    K: KeyStore,
{
    keys: Arc<K>,
}

impl<K> RecordCryptoService<K>
where
    K: KeyStore,
{
    /// Create a new record crypto service.
    pub fn new(keys: Arc<K>) -> Self {
        Self { keys }
    }

    fn public_key(&self, role: Role) -> Result<rsa::RsaPublicKey, RecordCryptoError> {
        self.keys
            .load_public_key(role)
            .map_err(|e| RecordCryptoError::KeyMaterialUnavailable {
                role,
                reason: e.to_string(),
            })
    }

    fn private_key(&self, role: Role) -> Result<rsa::RsaPrivateKey, RecordCryptoError> {
        self.keys
            .load_private_key(role)
            .map_err(|e| RecordCryptoError::KeyMaterialUnavailable {
                role,
                reason: e.to_string(),
            })
    }

    /// Seal a record draft into its ciphertext bundle.
    ///
    /// Both role public keys are loaded before any ciphertext is produced,
    /// so a key-store failure can never leave a record that only one role
    /// can read. Of the supplied attachments, the first of each kind wins;
    /// absent kinds become empty fields.
    ///
    /// # Errors
    /// Returns `KeyMaterialUnavailable` if either role's public key cannot
    /// be loaded, or an envelope error if sealing fails.
    pub fn encrypt_record(
        &self,
        draft: &RecordDraft,
    ) -> Result<RecordCiphertext, RecordCryptoError> {
        let doctor_public = self.public_key(Role::Doctor)?;
        let nurse_public = self.public_key(Role::Nurse)?;

        tracing::debug!("sealing record payload");
        let key = RecordKey::generate();

        let mut sealed = RecordCiphertext {
            symptoms: envelope::seal(draft.symptoms.as_bytes(), &key)?,
            diagnosis: envelope::seal(draft.diagnosis.as_bytes(), &key)?,
            ..Default::default()
        };

        for kind in [AttachmentKind::Image, AttachmentKind::Video] {
            if let Some(attachment) = draft.attachments.iter().find(|a| a.kind == kind) {
                let blob = envelope::seal(&attachment.bytes, &key)?;
                match kind {
                    AttachmentKind::Image => sealed.image = blob,
                    AttachmentKind::Video => sealed.video = blob,
                }
            }
        }

        sealed.doctor_wrapped_key = envelope::wrap_key(&key, &doctor_public)?;
        sealed.nurse_wrapped_key = envelope::wrap_key(&key, &nurse_public)?;

        tracing::debug!(
            symptoms_bytes = sealed.symptoms.len(),
            diagnosis_bytes = sealed.diagnosis.len(),
            has_image = !sealed.image.is_empty(),
            has_video = !sealed.video.is_empty(),
            "record sealed for both roles"
        );
        Ok(sealed)
    }

    /// Open a record's ciphertext bundle for the requesting role.
    ///
    /// # Errors
    /// `KeyMaterialUnavailable` if the role's private key cannot be
    /// loaded; `NoAccessGrant` if the record has no wrapped key for the
    /// role; envelope errors pass through unchanged.
    pub fn decrypt_record(
        &self,
        sealed: &RecordCiphertext,
        role: Role,
    ) -> Result<DecryptedRecord, RecordCryptoError> {
        let private = self.private_key(role)?;

        let wrapped = sealed.wrapped_key_for(role);
        if wrapped.is_empty() {
            return Err(RecordCryptoError::NoAccessGrant(role));
        }

        let key = envelope::unwrap_key(wrapped, &private)?;

        let symptoms = String::from_utf8(envelope::open(&sealed.symptoms, &key)?)
            .map_err(|_| RecordCryptoError::MalformedPlaintext("symptoms"))?;
        let diagnosis = String::from_utf8(envelope::open(&sealed.diagnosis, &key)?)
            .map_err(|_| RecordCryptoError::MalformedPlaintext("diagnosis"))?;

        let mut image = None;
        let mut video = None;
        for kind in [AttachmentKind::Image, AttachmentKind::Video] {
            let blob = sealed.attachment(kind);
            if blob.is_empty() {
                continue;
            }
            let plaintext = envelope::open(blob, &key)?;
            match kind {
                AttachmentKind::Image => image = Some(plaintext),
                AttachmentKind::Video => video = Some(plaintext),
            }
        }

        tracing::debug!(%role, "record opened");
        Ok(DecryptedRecord {
            symptoms,
            diagnosis,
            image,
            video,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::pem_keystore::MemoryKeyStore;
    use crate::domain::envelope::tests::{other_keypair, test_keypair};
    use crate::domain::Attachment;

    fn full_keystore() -> Arc<MemoryKeyStore> {
        let (doctor_private, _) = test_keypair();
        let (nurse_private, _) = other_keypair();
        Arc::new(
            MemoryKeyStore::new()
                .with_keypair(Role::Doctor, doctor_private.clone())
                .with_keypair(Role::Nurse, nurse_private.clone()),
        )
    }

    fn sample_draft() -> RecordDraft {
        RecordDraft {
            symptoms: "persistent cough, fever 38.5C".to_string(),
            diagnosis: "suspected bronchitis".to_string(),
            attachments: vec![
                Attachment {
                    kind: AttachmentKind::Image,
                    bytes: b"xray bytes".to_vec(),
                },
                Attachment {
                    kind: AttachmentKind::Video,
                    bytes: b"ultrasound bytes".to_vec(),
                },
            ],
        }
    }

    #[test]
    fn test_both_roles_open_identical_plaintext() {
        let service = RecordCryptoService::new(full_keystore());
        let sealed = service
            .encrypt_record(&sample_draft())
            .expect("Should seal");

        let as_doctor = service
            .decrypt_record(&sealed, Role::Doctor)
            .expect("Doctor should open");
        let as_nurse = service
            .decrypt_record(&sealed, Role::Nurse)
            .expect("Nurse should open");

        assert_eq!(as_doctor, as_nurse);
        assert_eq!(as_doctor.symptoms, "persistent cough, fever 38.5C");
        assert_eq!(as_doctor.image.as_deref(), Some(b"xray bytes".as_slice()));
        assert_eq!(
            as_doctor.video.as_deref(),
            Some(b"ultrasound bytes".as_slice())
        );
    }

    #[test]
    fn test_fields_get_distinct_ivs() {
        let service = RecordCryptoService::new(full_keystore());
        let draft = RecordDraft {
            symptoms: "identical text".to_string(),
            diagnosis: "identical text".to_string(),
            attachments: Vec::new(),
        };

        let sealed = service.encrypt_record(&draft).expect("Should seal");
        // Same key, same plaintext, but the blobs must differ.
        assert_ne!(sealed.symptoms, sealed.diagnosis);
    }

    #[test]
    fn test_missing_role_key_aborts_encrypt() {
        let (doctor_private, _) = test_keypair();
        let store =
            Arc::new(MemoryKeyStore::new().with_keypair(Role::Doctor, doctor_private.clone()));
        let service = RecordCryptoService::new(store);

        let err = service
            .encrypt_record(&sample_draft())
            .expect_err("Should fail without nurse key");
        assert!(matches!(
            err,
            RecordCryptoError::KeyMaterialUnavailable {
                role: Role::Nurse,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_wrapped_key_is_no_access_grant() {
        let service = RecordCryptoService::new(full_keystore());
        let mut sealed = service
            .encrypt_record(&sample_draft())
            .expect("Should seal");
        sealed.nurse_wrapped_key.clear();

        assert!(matches!(
            service.decrypt_record(&sealed, Role::Nurse),
            Err(RecordCryptoError::NoAccessGrant(Role::Nurse))
        ));
        // The other grant is untouched.
        assert!(service.decrypt_record(&sealed, Role::Doctor).is_ok());
    }

    #[test]
    fn test_tampered_field_fails_authentication() {
        let service = RecordCryptoService::new(full_keystore());
        let mut sealed = service
            .encrypt_record(&sample_draft())
            .expect("Should seal");
        let last = sealed.diagnosis.len() - 1;
        sealed.diagnosis[last] ^= 0x01;

        assert!(matches!(
            service.decrypt_record(&sealed, Role::Doctor),
            Err(RecordCryptoError::Envelope(
                EnvelopeError::AuthenticationFailure
            ))
        ));
    }

    #[test]
    fn test_swapped_wrapped_keys_fail_unwrap() {
        let service = RecordCryptoService::new(full_keystore());
        let mut sealed = service
            .encrypt_record(&sample_draft())
            .expect("Should seal");
        // Nurse slot now holds the doctor-wrapped key.
        sealed.nurse_wrapped_key = sealed.doctor_wrapped_key.clone();

        assert!(matches!(
            service.decrypt_record(&sealed, Role::Nurse),
            Err(RecordCryptoError::Envelope(EnvelopeError::KeyUnwrapFailure))
        ));
    }

    #[test]
    fn test_first_attachment_of_kind_wins() {
        let service = RecordCryptoService::new(full_keystore());
        let draft = RecordDraft {
            symptoms: "s".to_string(),
            diagnosis: "d".to_string(),
            attachments: vec![
                Attachment {
                    kind: AttachmentKind::Image,
                    bytes: b"first image".to_vec(),
                },
                Attachment {
                    kind: AttachmentKind::Image,
                    bytes: b"second image".to_vec(),
                },
            ],
        };

        let sealed = service.encrypt_record(&draft).expect("Should seal");
        let opened = service
            .decrypt_record(&sealed, Role::Doctor)
            .expect("Should open");
        assert_eq!(opened.image.as_deref(), Some(b"first image".as_slice()));
        assert!(opened.video.is_none());
        assert!(sealed.video.is_empty());
    }
}
