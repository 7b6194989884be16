//! SQLite adapter: implementation of `RecordStore`.
//!
//! Rows carry clear metadata plus the six sealed byte fields; the payload
//! key never exists unwrapped anywhere near this layer. The patient id is
//! stored only as its SHA-256 hash, so id search is an exact match on the
//! hash of the queried id.
//!
//! # Mutex Behavior
//!
//! The database connection is protected by `Mutex`. A poisoned mutex (from
//! panic in another thread) will cause panic. This fail-fast behavior is
//! intentional for data integrity in healthcare applications.

use std::path::Path;
use std::sync::Mutex;

use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

use crate::domain::{hash_patient_id, PatientRecord, RecordCiphertext, RecordId, SearchQuery};
use crate::ports::RecordStore;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("no record with id {0}")]
    NotFound(RecordId),
}

/// SQLite record store.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Open (or create) a database at the given path.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or initialized.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory database (for testing).
    ///
    /// # Errors
    /// Returns error if the database cannot be created.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock().expect("Lock failed");

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS hospital_records (
                record_id INTEGER PRIMARY KEY AUTOINCREMENT,
                patient_id_hash TEXT NOT NULL,
                patient_name TEXT NOT NULL,
                patient_dob TEXT NOT NULL,
                checked_in_at TEXT NOT NULL,
                doctor_name TEXT NOT NULL,
                nurse_name TEXT NOT NULL,
                encrypted_symptoms BLOB NOT NULL,
                encrypted_diagnosis BLOB NOT NULL,
                encrypted_image BLOB NOT NULL,
                encrypted_video BLOB NOT NULL,
                doctor_wrapped_key BLOB NOT NULL,
                nurse_wrapped_key BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_records_patient_hash
                ON hospital_records(patient_id_hash);
            ",
        )?;

        Ok(())
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<PatientRecord> {
        let id: RecordId = row.get("record_id")?;
        let dob_str: String = row.get("patient_dob")?;
        let checked_in_str: String = row.get("checked_in_at")?;

        let date_of_birth = NaiveDate::parse_from_str(&dob_str, "%Y-%m-%d").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let checked_in_at = chrono::DateTime::parse_from_rfc3339(&checked_in_str)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    4,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;

        Ok(PatientRecord {
            id: Some(id),
            patient_id_hash: row.get("patient_id_hash")?,
            patient_name: row.get("patient_name")?,
            date_of_birth,
            doctor_name: row.get("doctor_name")?,
            nurse_name: row.get("nurse_name")?,
            checked_in_at,
            sealed: RecordCiphertext {
                symptoms: row.get("encrypted_symptoms")?,
                diagnosis: row.get("encrypted_diagnosis")?,
                image: row.get("encrypted_image")?,
                video: row.get("encrypted_video")?,
                doctor_wrapped_key: row.get("doctor_wrapped_key")?,
                nurse_wrapped_key: row.get("nurse_wrapped_key")?,
            },
        })
    }
}

const SELECT_COLUMNS: &str = "record_id, patient_id_hash, patient_name, patient_dob, \
     checked_in_at, doctor_name, nurse_name, encrypted_symptoms, encrypted_diagnosis, \
     encrypted_image, encrypted_video, doctor_wrapped_key, nurse_wrapped_key";

impl RecordStore for SqliteRecordStore {
    type Error = StorageError;

    fn insert(&self, record: &PatientRecord) -> Result<RecordId, Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");

        conn.execute(
            r"
            INSERT INTO hospital_records (
                patient_id_hash, patient_name, patient_dob, checked_in_at,
                doctor_name, nurse_name,
                encrypted_symptoms, encrypted_diagnosis,
                encrypted_image, encrypted_video,
                doctor_wrapped_key, nurse_wrapped_key
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ",
            params![
                record.patient_id_hash,
                record.patient_name,
                record.date_of_birth.format("%Y-%m-%d").to_string(),
                record.checked_in_at.to_rfc3339(),
                record.doctor_name,
                record.nurse_name,
                record.sealed.symptoms,
                record.sealed.diagnosis,
                record.sealed.image,
                record.sealed.video,
                record.sealed.doctor_wrapped_key,
                record.sealed.nurse_wrapped_key,
            ],
        )?;

        let id = conn.last_insert_rowid();
        tracing::debug!(record_id = id, "inserted sealed record");
        Ok(id)
    }

    fn update(&self, id: RecordId, record: &PatientRecord) -> Result<(), Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");

        let changed = conn.execute(
            r"
            UPDATE hospital_records SET
                patient_id_hash = ?1,
                patient_name = ?2,
                patient_dob = ?3,
                checked_in_at = ?4,
                doctor_name = ?5,
                nurse_name = ?6,
                encrypted_symptoms = ?7,
                encrypted_diagnosis = ?8,
                encrypted_image = ?9,
                encrypted_video = ?10,
                doctor_wrapped_key = ?11,
                nurse_wrapped_key = ?12
            WHERE record_id = ?13
            ",
            params![
                record.patient_id_hash,
                record.patient_name,
                record.date_of_birth.format("%Y-%m-%d").to_string(),
                record.checked_in_at.to_rfc3339(),
                record.doctor_name,
                record.nurse_name,
                record.sealed.symptoms,
                record.sealed.diagnosis,
                record.sealed.image,
                record.sealed.video,
                record.sealed.doctor_wrapped_key,
                record.sealed.nurse_wrapped_key,
                id,
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::NotFound(id));
        }
        tracing::debug!(record_id = id, "replaced sealed record");
        Ok(())
    }

    fn fetch(&self, id: RecordId) -> Result<Option<PatientRecord>, Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");

        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM hospital_records WHERE record_id = ?1"
        ))?;

        match stmt.query_row(params![id], Self::map_row) {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn search(&self, query: &SearchQuery) -> Result<Vec<PatientRecord>, Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");

        let records = match query {
            SearchQuery::PatientId(patient_id) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SELECT_COLUMNS} FROM hospital_records WHERE patient_id_hash = ?1"
                ))?;
                let rows = stmt.query_map(params![hash_patient_id(patient_id)], Self::map_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            SearchQuery::Name(name) => {
                // Partial matches allowed; exact matches sort to the top.
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SELECT_COLUMNS} FROM hospital_records \
                     WHERE patient_name LIKE ?1 \
                     ORDER BY CASE WHEN patient_name = ?2 THEN 0 ELSE 1 END, patient_name"
                ))?;
                let rows = stmt.query_map(params![format!("%{name}%"), name], Self::map_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            SearchQuery::DateOfBirth(fragment) => {
                // Substring search so "2000" finds every date in that year.
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SELECT_COLUMNS} FROM hospital_records WHERE patient_dob LIKE ?1"
                ))?;
                let rows = stmt.query_map(params![format!("%{fragment}%")], Self::map_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            SearchQuery::All => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SELECT_COLUMNS} FROM hospital_records LIMIT 50"
                ))?;
                let rows = stmt.query_map([], Self::map_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(records)
    }
}
