//! Local checks applied before any upload

use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
use crate::error::{Result, StudioError};
use crate::services::ImageIOService;
use std::path::Path;

/// MIME types the removal service accepts
pub const ACCEPTED_MIME_TYPES: &[&str] = &["image/png", "image/jpeg", "image/jpg", "image/webp"];

/// An image ready to be sent to the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    bytes: Vec<u8>,
    filename: String,
    mime: Option<String>,
}

impl ImageUpload {
    /// Upload from in-memory bytes with an optional declared MIME type
    #[must_use]
    pub fn from_bytes<S: Into<String>>(bytes: Vec<u8>, filename: S, mime: Option<&str>) -> Self {
        Self {
            bytes,
            filename: filename.into(),
            mime: mime.map(|m| m.trim().to_ascii_lowercase()).filter(|m| !m.is_empty()),
        }
    }

    /// Read an upload from disk; MIME is resolved from the extension or content later
    ///
    /// # Errors
    /// - File missing or unreadable
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let bytes = ImageIOService::read_file(path_ref)?;
        Ok(Self::from_bytes(bytes, ImageIOService::file_name(path_ref), None))
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Take ownership of the raw bytes
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Effective MIME type: declared, else by extension, else sniffed from content
    #[must_use]
    pub fn mime_type(&self) -> Option<String> {
        if let Some(declared) = &self.mime {
            return Some(declared.clone());
        }

        let by_extension = Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|ext| match ext.to_ascii_lowercase().as_str() {
                "png" => Some("image/png"),
                "jpg" | "jpeg" => Some("image/jpeg"),
                "webp" => Some("image/webp"),
                "txt" => Some("text/plain"),
                _ => None,
            });
        if let Some(mime) = by_extension {
            return Some(mime.to_string());
        }

        image::guess_format(&self.bytes)
            .ok()
            .map(|format| format.to_mime_type().to_string())
    }
}

/// Type and size gate for uploads
#[derive(Debug, Clone, Copy)]
pub struct UploadValidator {
    max_bytes: u64,
}

impl Default for UploadValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UPLOAD_BYTES)
    }
}

impl UploadValidator {
    #[must_use]
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    /// Accept or reject an upload, returning its resolved MIME type
    ///
    /// # Errors
    /// - Empty file
    /// - Unsupported or undeterminable type
    /// - Larger than the configured limit
    pub fn validate(&self, upload: &ImageUpload) -> Result<String> {
        if upload.is_empty() {
            return Err(StudioError::validation(format!(
                "'{}' is empty",
                upload.filename()
            )));
        }

        let mime = upload.mime_type().ok_or_else(|| {
            StudioError::validation(format!(
                "Cannot determine the type of '{}'. Please upload a PNG, JPEG or WebP image",
                upload.filename()
            ))
        })?;

        if !ACCEPTED_MIME_TYPES.contains(&mime.as_str()) {
            return Err(StudioError::validation(format!(
                "Unsupported file type '{}'. Please upload a PNG, JPEG or WebP image",
                mime
            )));
        }

        if upload.len() > self.max_bytes {
            return Err(StudioError::validation(format!(
                "'{}' is {} which exceeds the {} limit",
                upload.filename(),
                crate::store::format_size(upload.len()),
                crate::store::format_size(self.max_bytes)
            )));
        }

        Ok(mime)
    }
}
