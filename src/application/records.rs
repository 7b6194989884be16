//! Record workflow service: admit, update, search, open.
//!
//! Orchestrates the crypto service with the storage and media collaborators.
//! The sealed bundle is always computed before anything is persisted, so an
//! encryption-side failure aborts the whole write and no partial envelope
//! ever reaches storage. A persisted bundle is immutable; updates recompute
//! it wholesale.

use std::sync::Arc;

use crate::domain::{
    hash_patient_id, Admission, Attachment, AttachmentKind, DecryptedRecord, PatientRecord,
    RecordDraft, RecordId, Role, SearchQuery,
};
use crate::ports::{KeyStore, MediaStaging, RecordStore};
use crate::{application::RecordCryptoService, MedisealError};

/// Service running the record intake and retrieval flows.
pub struct RecordService<K, S, M>
where
    K: KeyStore,
    S: RecordStore,
    M: MediaStaging,
{
    crypto: RecordCryptoService<K>,
    store: Arc<S>,
    media: Arc<M>,
}

impl<K, S, M> RecordService<K, S, M>
where
    K: KeyStore,
    S: RecordStore,
    M: MediaStaging,
    S::Error: Into<crate::adapters::StorageError>,
    M::Error: Into<crate::adapters::MediaError>,
{
    /// Create a new record service.
    pub fn new(keys: Arc<K>, store: Arc<S>, media: Arc<M>) -> Self {
        Self {
            crypto: RecordCryptoService::new(keys),
            store,
            media,
        }
    }

    fn build_record(&self, admission: &Admission) -> Result<PatientRecord, MedisealError> {
        let attachments = self
            .media
            .take_staged()
            .map_err(|e| MedisealError::Media(e.into()))?;

        let draft = RecordDraft {
            symptoms: admission.symptoms.clone(),
            diagnosis: admission.diagnosis.clone(),
            attachments,
        };
        let sealed = self.crypto.encrypt_record(&draft)?;

        Ok(PatientRecord {
            id: None,
            patient_id_hash: hash_patient_id(&admission.patient_id),
            patient_name: admission.patient_name.clone(),
            date_of_birth: admission.date_of_birth,
            doctor_name: admission.doctor_name.clone(),
            nurse_name: admission.nurse_name.clone(),
            checked_in_at: chrono::Utc::now(),
            sealed,
        })
    }

    /// Admit a patient: seal the clinical payload and persist the record.
    ///
    /// # Errors
    /// Any crypto, staging or storage failure aborts the whole admit.
    pub fn admit(&self, admission: &Admission) -> Result<RecordId, MedisealError> {
        let record = self.build_record(admission)?;
        let id = self
            .store
            .insert(&record)
            .map_err(|e| MedisealError::Storage(e.into()))?;
        tracing::info!(record_id = id, "admitted patient record");
        Ok(id)
    }

    /// Replace an existing record with a freshly sealed bundle.
    ///
    /// # Errors
    /// Any crypto, staging or storage failure leaves the stored record
    /// untouched.
    pub fn update(&self, id: RecordId, admission: &Admission) -> Result<(), MedisealError> {
        let record = self.build_record(admission)?;
        self.store
            .update(id, &record)
            .map_err(|e| MedisealError::Storage(e.into()))?;
        tracing::info!(record_id = id, "replaced patient record");
        Ok(())
    }

    /// Search stored records; metadata only, payloads stay sealed.
    ///
    /// # Errors
    /// Returns error if the storage operation fails.
    pub fn search(&self, query: &SearchQuery) -> Result<Vec<PatientRecord>, MedisealError> {
        self.store
            .search(query)
            .map_err(|e| MedisealError::Storage(e.into()))
    }

    /// Fetch and open a record for the requesting role.
    ///
    /// # Errors
    /// Storage failures, a missing record, or any crypto failure
    /// (`NoAccessGrant`, unwrap or authentication errors pass through
    /// with their kind intact).
    pub fn open_record(
        &self,
        id: RecordId,
        role: Role,
    ) -> Result<DecryptedRecord, MedisealError> {
        let record = self
            .store
            .fetch(id)
            .map_err(|e| MedisealError::Storage(e.into()))?
            .ok_or_else(|| MedisealError::Storage(crate::adapters::StorageError::NotFound(id)))?;

        Ok(self.crypto.decrypt_record(&record.sealed, role)?)
    }

    /// Decrypt a record's media and publish it through the staging bridge.
    ///
    /// Returns how many attachments were published (0 when the record has
    /// none).
    ///
    /// # Errors
    /// Same failure modes as `open_record`, plus staging write failures.
    pub fn export_attachments(
        &self,
        id: RecordId,
        role: Role,
    ) -> Result<usize, MedisealError> {
        let opened = self.open_record(id, role)?;

        let mut published = 0;
        for kind in [AttachmentKind::Image, AttachmentKind::Video] {
            if let Some(bytes) = opened.attachment(kind) {
                self.media
                    .publish(
                        id,
                        &Attachment {
                            kind,
                            bytes: bytes.to_vec(),
                        },
                    )
                    .map_err(|e| MedisealError::Media(e.into()))?;
                published += 1;
            }
        }

        tracing::info!(record_id = id, published, "exported record attachments");
        Ok(published)
    }
}
