//! # Pharmacy Simulator
//!
//! Reads encrypted prescription files and lists the medications they contain.
//!
//! A submission is two uploads: a `.med` file (an encrypted JSON document)
//! and the `.key` file that opens it. The document is decrypted, its nested
//! clinical conducts are walked, and every medication prescription is
//! returned as a flat [`MedicationRecord`].
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core types (keys, documents, medication records) and extraction
//! - `ports`: Trait definitions for external operations
//! - `adapters`: Concrete implementations (Fernet cipher, warp web layer, log sanitizing)
//! - `application`: Use cases orchestrating domain and ports
//! - `config`: Environment-driven settings

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use domain::{DecryptedDocument, MedicationRecord};

/// Result type for pharmacy simulator operations
pub type Result<T> = std::result::Result<T, PharmacyError>;

/// Main error type for the pharmacy simulator
#[derive(Debug, thiserror::Error)]
pub enum PharmacyError {
    #[error("Cryptographic operation failed: {0}")]
    Crypto(#[from] domain::CryptoError),

    #[error("Invalid upload: {0}")]
    Upload(#[from] adapters::web::UploadError),

    #[error("No medication prescription found in the document")]
    NoRecordsFound,

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PharmacyError {
    /// Message shown to the person who submitted the files.
    #[must_use]
    pub fn status_message(&self) -> String {
        match self {
            Self::Crypto(e) => format!("Erro ao descriptografar: {e}"),
            Self::Upload(e) => e.status_message().to_string(),
            Self::NoRecordsFound => {
                "Nenhuma prescrição de medicamento encontrada no arquivo.".to_string()
            }
            Self::Config(_) | Self::Io(_) => "Erro interno do servidor.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CryptoError;

    #[test]
    fn test_status_messages() {
        let err = PharmacyError::from(CryptoError::DecryptionFailed("bad tag".to_string()));
        assert_eq!(
            err.status_message(),
            "Erro ao descriptografar: Decryption failed: bad tag"
        );

        assert!(PharmacyError::NoRecordsFound
            .status_message()
            .contains("Nenhuma prescrição"));

        let err = PharmacyError::from(adapters::web::UploadError::EmptyFilename);
        assert_eq!(err.status_message(), "Nenhum arquivo selecionado.");
    }
}
