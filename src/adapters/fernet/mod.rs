//! Fernet adapter: Implementation of DocumentCipher.
//!
//! `.med` files are Fernet tokens and `.key` files Fernet keys.
//!
//! # Token layout
//!
//! ```text
//! base64url( 0x80 | timestamp u64 BE | IV (16) | AES-128-CBC ciphertext | HMAC-SHA256 (32) )
//! ```
//!
//! The key is base64url of 32 bytes: the first half signs, the second half
//! encrypts. The HMAC covers every byte before it and is checked in constant
//! time before any block is decrypted.

use std::time::Duration;

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128Dec, Aes128Enc, Block as AesBlock};
use base64::alphabet;
use base64::engine::general_purpose::{self, GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::domain::{CryptoError, DecryptedDocument, SymmetricKey, SYMMETRIC_KEY_LEN};
use crate::ports::DocumentCipher;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_VERSION: u8 = 0x80;
const BLOCK_LEN: usize = 16;
const HEADER_LEN: usize = 1 + 8 + BLOCK_LEN;
const TAG_LEN: usize = 32;

/// Tokens stamped further than this into the future are rejected when a TTL
/// is enforced.
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// base64url decoder that accepts keys and tokens with or without padding.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Fernet cipher adapter.
#[derive(Debug, Clone, Default)]
pub struct FernetCipher {
    ttl: Option<Duration>,
}

impl FernetCipher {
    /// Create a cipher that accepts tokens of any age.
    #[must_use]
    pub fn new() -> Self {
        Self { ttl: None }
    }

    /// Create a cipher that rejects tokens older than `ttl`.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl: Some(ttl) }
    }

    /// Decode a `.key` file into a key. Surrounding whitespace is ignored.
    ///
    /// # Errors
    /// Returns `CryptoError::InvalidKeyFormat` if the input is not base64url
    /// of exactly 32 bytes.
    pub fn decode_key(key: &[u8]) -> Result<SymmetricKey, CryptoError> {
        let decoded = Zeroizing::new(URL_SAFE_LENIENT.decode(key.trim_ascii()).map_err(|e| {
            CryptoError::InvalidKeyFormat(format!("key is not URL-safe base64: {e}"))
        })?);

        if decoded.len() != SYMMETRIC_KEY_LEN {
            return Err(CryptoError::InvalidKeyFormat(format!(
                "Fernet key must be {SYMMETRIC_KEY_LEN} bytes, got {}",
                decoded.len()
            )));
        }
        SymmetricKey::from_slice(&decoded)
    }

    /// Seal raw plaintext under `key` with a random IV and the current time.
    ///
    /// # Errors
    /// Returns `CryptoError::Encryption` if the random source fails.
    pub fn seal(&self, plaintext: &[u8], key: &SymmetricKey) -> Result<Vec<u8>, CryptoError> {
        let mut iv = [0u8; BLOCK_LEN];
        OsRng
            .try_fill_bytes(&mut iv)
            .map_err(|e| CryptoError::Encryption(format!("IV generation failed: {e}")))?;
        let timestamp = chrono::Utc::now().timestamp().max(0) as u64;
        self.seal_at(plaintext, key, timestamp, iv)
    }

    /// Seal raw plaintext with an explicit timestamp and IV.
    ///
    /// Deterministic; only use a fixed IV for known-answer tests.
    ///
    /// # Errors
    /// Returns `CryptoError::Encryption` if the cipher cannot be keyed.
    pub fn seal_at(
        &self,
        plaintext: &[u8],
        key: &SymmetricKey,
        timestamp: u64,
        iv: [u8; BLOCK_LEN],
    ) -> Result<Vec<u8>, CryptoError> {
        let cipher = Aes128Enc::new_from_slice(key.encryption_key())
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        let pad = BLOCK_LEN - plaintext.len() % BLOCK_LEN;
        let mut padded = Zeroizing::new(Vec::with_capacity(plaintext.len() + pad));
        padded.extend_from_slice(plaintext);
        padded.resize(plaintext.len() + pad, pad as u8);

        let mut data = Vec::with_capacity(HEADER_LEN + padded.len() + TAG_LEN);
        data.push(TOKEN_VERSION);
        data.extend_from_slice(&timestamp.to_be_bytes());
        data.extend_from_slice(&iv);

        let mut previous = iv;
        for chunk in padded.chunks_exact(BLOCK_LEN) {
            let mut mixed = [0u8; BLOCK_LEN];
            xor_blocks(chunk, &previous, &mut mixed);
            let mut block = AesBlock::from(mixed);
            cipher.encrypt_block(&mut block);
            data.extend_from_slice(block.as_slice());
            previous.copy_from_slice(block.as_slice());
        }

        let mut mac = signer(key)?;
        mac.update(&data);
        data.extend_from_slice(&mac.finalize().into_bytes());

        Ok(general_purpose::URL_SAFE.encode(data).into_bytes())
    }

    /// Verify and decrypt a token, returning the raw plaintext.
    ///
    /// # Errors
    /// Returns `CryptoError::DecryptionFailed` if the token is malformed,
    /// expired, fails authentication, or has bad padding.
    pub fn open(
        &self,
        token: &[u8],
        key: &SymmetricKey,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        self.open_at(token, key, chrono::Utc::now().timestamp())
    }

    fn open_at(
        &self,
        token: &[u8],
        key: &SymmetricKey,
        now: i64,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let data = URL_SAFE_LENIENT
            .decode(token.trim_ascii())
            .map_err(|e| CryptoError::DecryptionFailed(format!("token is not valid base64: {e}")))?;

        if data.len() < HEADER_LEN + TAG_LEN {
            return Err(CryptoError::DecryptionFailed("token is too short".to_string()));
        }
        if data[0] != TOKEN_VERSION {
            return Err(CryptoError::DecryptionFailed(format!(
                "unsupported token version 0x{:02x}",
                data[0]
            )));
        }

        let (signed, tag) = data.split_at(data.len() - TAG_LEN);
        let mut mac = signer(key)?;
        mac.update(signed);
        mac.verify_slice(tag).map_err(|_| {
            CryptoError::DecryptionFailed(
                "authentication failed: wrong key or tampered file".to_string(),
            )
        })?;

        let mut timestamp = [0u8; 8];
        timestamp.copy_from_slice(&signed[1..9]);
        self.check_age(u64::from_be_bytes(timestamp), now)?;

        let iv = &signed[9..HEADER_LEN];
        let ciphertext = &signed[HEADER_LEN..];
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
            return Err(CryptoError::DecryptionFailed(
                "ciphertext is not a whole number of blocks".to_string(),
            ));
        }

        let cipher = Aes128Dec::new_from_slice(key.encryption_key())
            .map_err(|e| CryptoError::InvalidKeyFormat(e.to_string()))?;

        let mut plaintext = Zeroizing::new(Vec::with_capacity(ciphertext.len()));
        let mut previous = [0u8; BLOCK_LEN];
        previous.copy_from_slice(iv);
        for chunk in ciphertext.chunks_exact(BLOCK_LEN) {
            let mut block = *AesBlock::from_slice(chunk);
            cipher.decrypt_block(&mut block);
            let mut out = [0u8; BLOCK_LEN];
            xor_blocks(block.as_slice(), &previous, &mut out);
            plaintext.extend_from_slice(&out);
            previous.copy_from_slice(chunk);
        }

        strip_padding(&mut plaintext)?;
        Ok(plaintext)
    }

    fn check_age(&self, issued_at: u64, now: i64) -> Result<(), CryptoError> {
        let Some(ttl) = self.ttl else {
            return Ok(());
        };

        let issued_at = i64::try_from(issued_at).map_err(|_| {
            CryptoError::DecryptionFailed("token timestamp out of range".to_string())
        })?;
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);

        if issued_at.saturating_add(ttl) < now {
            return Err(CryptoError::DecryptionFailed("token has expired".to_string()));
        }
        if now.saturating_add(MAX_CLOCK_SKEW_SECS) < issued_at {
            return Err(CryptoError::DecryptionFailed(
                "token timestamp is in the future".to_string(),
            ));
        }
        Ok(())
    }
}

impl DocumentCipher for FernetCipher {
    fn generate_key(&self) -> Result<String, CryptoError> {
        let mut bytes = Zeroizing::new([0u8; SYMMETRIC_KEY_LEN]);
        OsRng
            .try_fill_bytes(bytes.as_mut_slice())
            .map_err(|e| CryptoError::Encryption(format!("key generation failed: {e}")))?;
        Ok(general_purpose::URL_SAFE.encode(bytes.as_slice()))
    }

    fn parse_key(&self, key: &[u8]) -> Result<SymmetricKey, CryptoError> {
        Self::decode_key(key)
    }

    fn encrypt(&self, document: &DecryptedDocument, key: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let key = Self::decode_key(key)?;
        let plaintext = Zeroizing::new(
            serde_json::to_vec(document.as_value())
                .map_err(|e| CryptoError::Encryption(e.to_string()))?,
        );
        let token = self.seal(&plaintext, &key)?;
        tracing::debug!(
            key = %key.fingerprint,
            token_bytes = token.len(),
            "sealed prescription document"
        );
        Ok(token)
    }

    fn decrypt(&self, payload: &[u8], key: &[u8]) -> Result<DecryptedDocument, CryptoError> {
        let key = Self::decode_key(key)?;
        tracing::debug!(
            key = %key.fingerprint,
            token_bytes = payload.len(),
            "opening prescription token"
        );

        let plaintext = self.open(payload, &key)?;
        DecryptedDocument::from_plaintext(&plaintext).map_err(CryptoError::MalformedDocument)
    }
}

fn signer(key: &SymmetricKey) -> Result<HmacSha256, CryptoError> {
    <HmacSha256 as Mac>::new_from_slice(key.signing_key())
        .map_err(|e| CryptoError::InvalidKeyFormat(e.to_string()))
}

/// XOR two 16-byte blocks into `output`.
fn xor_blocks(block_a: &[u8], block_b: &[u8], output: &mut [u8; BLOCK_LEN]) {
    for (i, out) in output.iter_mut().enumerate() {
        *out = block_a[i] ^ block_b[i];
    }
}

/// Remove and validate PKCS#7 padding.
fn strip_padding(buf: &mut Vec<u8>) -> Result<(), CryptoError> {
    let bad_padding = || CryptoError::DecryptionFailed("invalid padding".to_string());

    let pad = usize::from(*buf.last().ok_or_else(bad_padding)?);
    if pad == 0 || pad > BLOCK_LEN || pad > buf.len() {
        return Err(bad_padding());
    }
    let body_len = buf.len() - pad;
    if buf[body_len..].iter().any(|&b| usize::from(b) != pad) {
        return Err(bad_padding());
    }
    buf.truncate(body_len);
    Ok(())
}
