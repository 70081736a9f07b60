//! Decrypted prescription document.

use serde_json::Value;

/// JSON tree recovered from a `.med` file.
///
/// Only the `extension` array is interpreted; everything else is carried
/// through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct DecryptedDocument(Value);

impl DecryptedDocument {
    /// Wrap an already parsed JSON value.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Parse decrypted plaintext as UTF-8 JSON.
    ///
    /// # Errors
    /// Returns a description of the failing step (UTF-8 or JSON).
    pub fn from_plaintext(plaintext: &[u8]) -> Result<Self, String> {
        let text = std::str::from_utf8(plaintext)
            .map_err(|e| format!("plaintext is not valid UTF-8: {e}"))?;
        let value = serde_json::from_str(text).map_err(|e| format!("invalid JSON: {e}"))?;
        Ok(Self(value))
    }

    /// Nodes of the top-level `extension` array, in document order.
    ///
    /// Missing or non-array `extension` yields no nodes.
    pub fn extension_nodes(&self) -> impl Iterator<Item = &Value> {
        self.0
            .get("extension")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
    }

    /// Borrow the underlying JSON value.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}
