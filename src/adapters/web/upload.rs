//! Multipart upload reading and validation.

use std::collections::HashMap;

use bytes::BufMut;
use futures_util::TryStreamExt;
use warp::multipart::{FormData, Part};
use zeroize::Zeroizing;

use crate::domain::EncryptedPayload;

/// Form field carrying the encrypted payload.
pub const MED_FIELD: &str = "med_file";

/// Form field carrying the key token.
pub const KEY_FIELD: &str = "key_file";

/// File extensions accepted for either upload.
pub const ALLOWED_EXTENSIONS: [&str; 2] = ["med", "key"];

/// Reasons an upload is refused before decryption is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    #[error("both {MED_FIELD} and {KEY_FIELD} must be uploaded")]
    MissingUpload,

    #[error("an uploaded file has no filename")]
    EmptyFilename,

    #[error("only .med and .key files are accepted")]
    DisallowedExtension,
}

impl UploadError {
    /// Message shown to the person who submitted the form.
    #[must_use]
    pub fn status_message(&self) -> &'static str {
        match self {
            Self::MissingUpload => "Por favor, envie ambos os arquivos .med e .key.",
            Self::EmptyFilename => "Nenhum arquivo selecionado.",
            Self::DisallowedExtension => "Apenas arquivos .med e .key são permitidos.",
        }
    }
}

/// One file part of the submitted form.
pub struct UploadedFile {
    pub filename: String,
    pub contents: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadedFile")
            .field("filename", &self.filename)
            .field("size_bytes", &self.contents.len())
            .finish()
    }
}

/// Files of a submitted form, keyed by field name.
#[derive(Debug, Default)]
pub struct UploadForm {
    files: HashMap<String, UploadedFile>,
}

/// A validated submission, ready for decryption.
#[derive(Debug)]
pub struct PrescriptionUpload {
    pub payload: EncryptedPayload,
    pub key: Zeroizing<Vec<u8>>,
}

impl UploadForm {
    /// Drain a multipart stream. The first part wins when a field repeats.
    ///
    /// Each part is read to the end before the next one is pulled; the
    /// multipart parser only allows one live part at a time.
    ///
    /// # Errors
    /// Returns the underlying error if the body is truncated, malformed, or
    /// exceeds the size limit.
    pub async fn read(form: FormData) -> Result<Self, warp::Error> {
        let parts: Vec<(String, Option<String>, Vec<u8>)> =
            form.and_then(read_part).try_collect().await?;

        let mut upload = Self::default();
        for (name, filename, contents) in parts {
            upload.insert(&name, filename.as_deref(), contents);
        }
        Ok(upload)
    }

    /// Add a part directly. Parts without a filename are plain form fields,
    /// not files, and are skipped.
    pub fn insert(&mut self, field: &str, filename: Option<&str>, contents: Vec<u8>) {
        let Some(filename) = filename else {
            return;
        };
        self.files.entry(field.to_string()).or_insert(UploadedFile {
            filename: filename.to_string(),
            contents: Zeroizing::new(contents),
        });
    }

    /// Check presence, filenames, and extensions, in that order.
    ///
    /// # Errors
    /// Returns the first [`UploadError`] that applies.
    pub fn validate(mut self) -> Result<PrescriptionUpload, UploadError> {
        let (Some(med), Some(key)) = (self.files.remove(MED_FIELD), self.files.remove(KEY_FIELD))
        else {
            return Err(UploadError::MissingUpload);
        };

        if med.filename.is_empty() || key.filename.is_empty() {
            return Err(UploadError::EmptyFilename);
        }

        if !(allowed_file(&med.filename) && allowed_file(&key.filename)) {
            return Err(UploadError::DisallowedExtension);
        }

        let payload = EncryptedPayload::new(med.contents.to_vec());
        Ok(PrescriptionUpload {
            payload,
            key: key.contents,
        })
    }
}

async fn read_part(part: Part) -> Result<(String, Option<String>, Vec<u8>), warp::Error> {
    let name = part.name().to_string();
    let filename = part.filename().map(str::to_string);
    let contents = part
        .stream()
        .try_fold(Vec::new(), |mut acc, buf| async move {
            acc.put(buf);
            Ok(acc)
        })
        .await?;
    Ok((name, filename, contents))
}

/// Whether `filename` ends in an accepted extension (case-insensitive).
#[must_use]
pub fn allowed_file(filename: &str) -> bool {
    filename.rsplit_once('.').is_some_and(|(_, ext)| {
        let ext = ext.to_ascii_lowercase();
        ALLOWED_EXTENSIONS.contains(&ext.as_str())
    })
}
