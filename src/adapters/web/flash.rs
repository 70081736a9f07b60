//! Signed one-shot status messages carried across a redirect.
//!
//! Cookie value: `base64url(message) "." base64url(HMAC-SHA256(secret, message))`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::domain::CryptoError;

type HmacSha256 = Hmac<Sha256>;

/// Name of the cookie holding the pending message.
pub const FLASH_COOKIE: &str = "flash";

const COOKIE_ATTRIBUTES: &str = "Path=/; HttpOnly; SameSite=Lax";

/// Signs and verifies flash cookies with the configured secret.
#[derive(Clone)]
pub struct FlashSigner {
    mac: HmacSha256,
}

impl std::fmt::Debug for FlashSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlashSigner").finish_non_exhaustive()
    }
}

impl FlashSigner {
    /// Key a signer with `secret`.
    ///
    /// # Errors
    /// Returns `CryptoError::InvalidKeyFormat` if the MAC rejects the secret.
    pub fn new(secret: &[u8]) -> Result<Self, CryptoError> {
        let mac = <HmacSha256 as Mac>::new_from_slice(secret)
            .map_err(|e| CryptoError::InvalidKeyFormat(e.to_string()))?;
        Ok(Self { mac })
    }

    /// Encode and sign a message as a cookie value.
    #[must_use]
    pub fn sign(&self, message: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(message.as_bytes());
        let tag = mac.finalize().into_bytes();
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(message),
            URL_SAFE_NO_PAD.encode(tag)
        )
    }

    /// Recover the message from a cookie value; `None` if it was not signed
    /// with this secret.
    #[must_use]
    pub fn verify(&self, value: &str) -> Option<String> {
        let (encoded, tag) = value.split_once('.')?;
        let message = URL_SAFE_NO_PAD.decode(encoded).ok()?;
        let tag = URL_SAFE_NO_PAD.decode(tag).ok()?;

        let mut mac = self.mac.clone();
        mac.update(&message);
        mac.verify_slice(&tag).ok()?;

        String::from_utf8(message).ok()
    }

    /// `Set-Cookie` value carrying `message`.
    #[must_use]
    pub fn set_cookie(&self, message: &str) -> String {
        format!("{FLASH_COOKIE}={}; {COOKIE_ATTRIBUTES}", self.sign(message))
    }

    /// `Set-Cookie` value that removes a pending message.
    #[must_use]
    pub fn clear_cookie() -> String {
        format!("{FLASH_COOKIE}=; Max-Age=0; {COOKIE_ATTRIBUTES}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer(secret: &str) -> FlashSigner {
        FlashSigner::new(secret.as_bytes()).expect("Should key signer")
    }

    #[test]
    fn test_sign_then_verify() {
        let flash = signer("flash-test-secret-0001");
        let value = flash.sign("Nenhum arquivo selecionado.");
        assert_eq!(
            flash.verify(&value).as_deref(),
            Some("Nenhum arquivo selecionado.")
        );
    }

    #[test]
    fn test_verify_rejects_foreign_secret() {
        let value = signer("flash-test-secret-0001").sign("hello");
        assert!(signer("flash-test-secret-0002").verify(&value).is_none());
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let flash = signer("flash-test-secret-0001");
        let value = flash.sign("hello");
        let (_, tag) = value.split_once('.').expect("Has separator");
        let forged = format!("{}.{tag}", URL_SAFE_NO_PAD.encode("goodbye"));

        assert!(flash.verify(&forged).is_none());
        assert!(flash.verify("no-separator").is_none());
        assert!(flash.verify("!!.!!").is_none());
    }

    #[test]
    fn test_cookie_headers() {
        let flash = signer("flash-test-secret-0001");
        let cookie = flash.set_cookie("hello");
        assert!(cookie.starts_with("flash="));
        assert!(cookie.contains("HttpOnly"));
        assert!(FlashSigner::clear_cookie().contains("Max-Age=0"));
    }
}
