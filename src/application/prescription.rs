//! Prescription service: Orchestrates the decrypt-and-extract pipeline.
//!
//! This service coordinates:
//! - Token decryption through the cipher port
//! - Medication extraction from the decrypted document
//!
//! Nothing is retained between calls; both inputs and every intermediate
//! value are dropped when a call returns.

use std::sync::Arc;

use crate::domain::{extract_medications, EncryptedPayload, MedicationRecord};
use crate::ports::DocumentCipher;
use crate::PharmacyError;

/// Service for reading medication prescriptions out of `.med` files.
pub struct PrescriptionService<C>
where
    C: DocumentCipher,
{
    cipher: Arc<C>,
}

impl<C> Clone for PrescriptionService<C>
where
    C: DocumentCipher,
{
    fn clone(&self) -> Self {
        Self {
            cipher: Arc::clone(&self.cipher),
        }
    }
}

impl<C> PrescriptionService<C>
where
    C: DocumentCipher,
{
    /// Create a new prescription service.
    pub fn new(cipher: Arc<C>) -> Self {
        Self { cipher }
    }

    /// Decrypt a payload and list the medications it prescribes.
    ///
    /// Performs the full pipeline:
    /// 1. Decrypt and parse the document
    /// 2. Extract medication records
    ///
    /// # Errors
    /// - `PharmacyError::Crypto` if the key, token, or document is invalid
    /// - `PharmacyError::NoRecordsFound` if the document prescribes nothing
    pub fn read_prescriptions(
        &self,
        payload: &EncryptedPayload,
        key: &[u8],
    ) -> Result<Vec<MedicationRecord>, PharmacyError> {
        tracing::info!("Reading prescription payload...");

        // Step 1: Decrypt document
        tracing::debug!("Step 1: Decrypting {:?}...", payload);
        let document = self.cipher.decrypt(&payload.token, key).map_err(|e| {
            tracing::warn!("Prescription decryption failed: {e}");
            e
        })?;

        // Step 2: Extract medications
        tracing::debug!("Step 2: Extracting medication records...");
        let records = extract_medications(&document);

        if records.is_empty() {
            tracing::info!("Document contains no medication prescription");
            return Err(PharmacyError::NoRecordsFound);
        }

        tracing::info!("Extracted {} medication record(s)", records.len());
        Ok(records)
    }

    /// Access the underlying cipher.
    #[must_use]
    pub fn cipher(&self) -> &C {
        &self.cipher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fernet::FernetCipher;
    use crate::domain::{CryptoError, DecryptedDocument};
    use serde_json::json;

    fn create_test_service() -> PrescriptionService<FernetCipher> {
        PrescriptionService::new(Arc::new(FernetCipher::new()))
    }

    fn seal(service: &PrescriptionService<FernetCipher>, raw: &str, key: &str) -> EncryptedPayload {
        let document = DecryptedDocument::from_plaintext(raw.as_bytes()).expect("Should parse");
        EncryptedPayload::new(
            service
                .cipher()
                .encrypt(&document, key.as_bytes())
                .expect("Should encrypt"),
        )
    }

    #[test]
    fn test_pipeline_extracts_records() {
        let service = create_test_service();
        let key = service.cipher().generate_key().expect("Should generate key");
        let raw = r#"{"extension":[{"valueCodeableConcept":{"text":"[{\"type\":\"Prescrição de medicamento\",\"details\":{\"medication\":\"Paracetamol\",\"dose\":\"500mg\",\"administration\":\"oral\"}}]"}}]}"#;
        let payload = seal(&service, raw, &key);

        let records = service
            .read_prescriptions(&payload, key.as_bytes())
            .expect("Should read");
        assert_eq!(
            serde_json::to_value(&records).expect("Should serialize"),
            json!([{"medication": "Paracetamol", "dose": "500mg", "administration": "oral"}])
        );
    }

    #[test]
    fn test_empty_document_reports_no_records() {
        let service = create_test_service();
        let key = service.cipher().generate_key().expect("Should generate key");
        let payload = seal(&service, "{}", &key);

        let err = service
            .read_prescriptions(&payload, key.as_bytes())
            .unwrap_err();
        assert!(matches!(err, PharmacyError::NoRecordsFound));
    }

    #[test]
    fn test_tampered_payload_reports_decryption_failure() {
        use base64::engine::general_purpose::URL_SAFE;
        use base64::Engine;

        let service = create_test_service();
        let key = service.cipher().generate_key().expect("Should generate key");
        let payload = seal(&service, r#"{"extension": []}"#, &key);

        let mut raw = URL_SAFE.decode(&payload.token).expect("Should decode");
        let last = raw.len() - 40;
        raw[last] ^= 0x80;
        let tampered = EncryptedPayload::new(URL_SAFE.encode(raw).into_bytes());

        let err = service
            .read_prescriptions(&tampered, key.as_bytes())
            .unwrap_err();
        assert!(matches!(
            err,
            PharmacyError::Crypto(CryptoError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_invalid_key_reported() {
        let service = create_test_service();
        let payload = EncryptedPayload::new(b"irrelevant".to_vec());

        let err = service
            .read_prescriptions(&payload, b"definitely-not-a-key")
            .unwrap_err();
        assert!(matches!(
            err,
            PharmacyError::Crypto(CryptoError::InvalidKeyFormat(_))
        ));
    }
}
