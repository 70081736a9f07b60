//! Document cipher port: Trait for prescription encryption operations.
//!
//! This trait abstracts the symmetric token format from the application
//! logic, so the pipeline only sees bytes in and documents out.

use crate::domain::{CryptoError, DecryptedDocument, SymmetricKey};

/// Trait for the authenticated symmetric cipher protecting `.med` files.
///
/// Implementations provide:
/// - Key generation with a CSPRNG
/// - Sealing of a JSON document into a token
/// - Authenticated opening of a token back into a document
pub trait DocumentCipher: Send + Sync {
    /// Generate a fresh key, returned in its textual `.key` file form.
    ///
    /// # Errors
    /// Returns `CryptoError::Encryption` if the random source fails.
    fn generate_key(&self) -> Result<String, CryptoError>;

    /// Parse a key token as found in a `.key` file.
    ///
    /// # Errors
    /// Returns `CryptoError::InvalidKeyFormat` if the token is malformed.
    fn parse_key(&self, key: &[u8]) -> Result<SymmetricKey, CryptoError>;

    /// Encrypt a document into `.med` file contents.
    ///
    /// # Errors
    /// Returns `CryptoError::InvalidKeyFormat` for a malformed key and
    /// `CryptoError::Encryption` if sealing fails.
    fn encrypt(&self, document: &DecryptedDocument, key: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Decrypt `.med` file contents with the given key.
    ///
    /// # Errors
    /// - `CryptoError::InvalidKeyFormat` if the key is malformed
    /// - `CryptoError::DecryptionFailed` if the token is malformed, tampered
    ///   with, or sealed under a different key
    /// - `CryptoError::MalformedDocument` if the plaintext is not UTF-8 JSON
    fn decrypt(&self, payload: &[u8], key: &[u8]) -> Result<DecryptedDocument, CryptoError>;
}
