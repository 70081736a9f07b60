//! Cryptographic types for prescription files.
//!
//! Wrappers around the raw `.key` and `.med` contents with additional safety
//! guarantees.
//!
//! # Memory Security
//!
//! `SymmetricKey` implements `Zeroize` and `ZeroizeOnDrop` so key material is
//! erased when no longer needed. None of the types here print their bytes in
//! `Debug` output.

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Error type for cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),
}

/// Length of a decoded symmetric key: 16 signing bytes + 16 encryption bytes.
pub const SYMMETRIC_KEY_LEN: usize = 32;

/// Parsed symmetric key (the contents of a `.key` file).
///
/// # Security
///
/// - Implements `ZeroizeOnDrop`: key material is erased when dropped
/// - `Debug` implementation does NOT expose key bytes
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    inner: [u8; SYMMETRIC_KEY_LEN],

    /// Key fingerprint for identification (NOT secret)
    #[zeroize(skip)]
    pub fingerprint: String,
}

impl SymmetricKey {
    /// Create a key from its decoded 32 bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; SYMMETRIC_KEY_LEN]) -> Self {
        let fingerprint = compute_fingerprint(&bytes);
        Self {
            inner: bytes,
            fingerprint,
        }
    }

    /// Create a key from a slice, checking its length.
    ///
    /// # Errors
    /// Returns `CryptoError::InvalidKeyFormat` if the slice is not 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array: [u8; SYMMETRIC_KEY_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKeyFormat(format!(
                "expected {SYMMETRIC_KEY_LEN} key bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self::from_bytes(array))
    }

    /// HMAC signing half of the key.
    #[must_use]
    pub fn signing_key(&self) -> &[u8] {
        &self.inner[..16]
    }

    /// AES encryption half of the key.
    #[must_use]
    pub fn encryption_key(&self) -> &[u8] {
        &self.inner[16..]
    }
}

// Intentionally NOT deriving Debug to prevent accidental key leakage
impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

/// Encrypted prescription payload (the contents of a `.med` file).
#[derive(Clone)]
pub struct EncryptedPayload {
    /// Token bytes exactly as uploaded
    pub token: Vec<u8>,
}

impl EncryptedPayload {
    /// Wrap uploaded token bytes.
    pub fn new(token: Vec<u8>) -> Self {
        Self { token }
    }

    /// Get the size of the token in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.token.len()
    }
}

impl std::fmt::Debug for EncryptedPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedPayload")
            .field("size_bytes", &self.token.len())
            .finish()
    }
}

/// Compute a fingerprint for key identification using SHA-256.
///
/// Only the first 8 bytes of the digest are kept; the result is a hash of the
/// key, never raw key material.
fn compute_fingerprint(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};

    let result = Sha256::digest(bytes);
    result[..8].iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bytes() -> [u8; SYMMETRIC_KEY_LEN] {
        let mut bytes = [0u8; SYMMETRIC_KEY_LEN];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        bytes
    }

    #[test]
    fn test_key_debug_no_leak() {
        let key = SymmetricKey::from_bytes(sample_bytes());
        let debug_output = format!("{key:?}");

        assert!(!debug_output.contains("1, 2, 3"));
        assert!(debug_output.contains("fingerprint"));
    }

    #[test]
    fn test_key_halves() {
        let key = SymmetricKey::from_bytes(sample_bytes());
        assert_eq!(key.signing_key()[0], 0);
        assert_eq!(key.signing_key()[15], 15);
        assert_eq!(key.encryption_key()[0], 16);
        assert_eq!(key.encryption_key()[15], 31);
    }

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        let err = SymmetricKey::from_slice(&[0u8; 16]).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKeyFormat(_)));
    }

    #[test]
    fn test_fingerprint_uses_hash() {
        let fp = compute_fingerprint(&[0xde, 0xad, 0xbe, 0xef]);
        assert_ne!(fp, "deadbeef");
        assert_eq!(fp.len(), 16);
        assert_eq!(fp, compute_fingerprint(&[0xde, 0xad, 0xbe, 0xef]));
    }

    #[test]
    fn test_payload_debug_shows_size_only() {
        let payload = EncryptedPayload::new(b"gAAAAABsecret".to_vec());
        let debug_output = format!("{payload:?}");
        assert!(debug_output.contains("size_bytes: 13"));
        assert!(!debug_output.contains("gAAAA"));
    }
}
