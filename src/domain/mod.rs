//! Domain layer: Core prescription types and logic.
//!
//! This module contains plain Rust types plus the extraction walk over
//! decrypted documents. Nothing here touches the network or a cipher library.

mod crypto;
mod document;
mod medication;

pub use crypto::{CryptoError, EncryptedPayload, SymmetricKey, SYMMETRIC_KEY_LEN};
pub use document::DecryptedDocument;
pub use medication::{
    extract_medications, Conduct, MedicationRecord, NOT_AVAILABLE, PRESCRIPTION_CONDUCT_TYPE,
};
