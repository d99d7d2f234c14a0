use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;

pub const UPLOAD_ID_PREFIX: &str = "upload-";
pub const UPLOADED_IMAGE_LABEL: &str = "Uploaded Image";
pub const REFINED_PROMPT_PREFIX: &str = "Refined: ";

/// Encoded image bytes plus the MIME type they were produced with.
///
/// Bytes are shared, so cloning a payload (or an image holding one) never
/// copies pixel data.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    bytes: Arc<[u8]>,
    mime_type: String,
}

impl ImagePayload {
    pub fn new(bytes: impl Into<Arc<[u8]>>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Decodes a base64 string as returned by remote image APIs.
    pub fn from_base64(data: &str, mime_type: impl Into<String>) -> anyhow::Result<Self> {
        let bytes = BASE64.decode(data.trim().as_bytes())?;
        Ok(Self::new(bytes, mime_type))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    pub fn file_extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ImageId(String);

impl ImageId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_upload(&self) -> bool {
        self.0.starts_with(UPLOAD_ID_PREFIX)
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An image produced by generation, refinement, or upload. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    id: ImageId,
    payload: ImagePayload,
    prompt: String,
}

impl GeneratedImage {
    pub fn new(id: ImageId, payload: ImagePayload, prompt: impl Into<String>) -> Self {
        Self {
            id,
            payload,
            prompt: prompt.into(),
        }
    }

    pub fn id(&self) -> &ImageId {
        &self.id
    }

    pub fn payload(&self) -> &ImagePayload {
        &self.payload
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn mime_type(&self) -> &str {
        self.payload.mime_type()
    }

    pub fn is_upload(&self) -> bool {
        self.id.is_upload()
    }
}

pub fn extension_for_mime(mime_type: &str) -> &'static str {
    let lowered = mime_type.trim().to_ascii_lowercase();
    if lowered.contains("jpeg") || lowered.contains("jpg") {
        return "jpg";
    }
    if lowered.contains("webp") {
        return "webp";
    }
    if lowered.contains("gif") {
        return "gif";
    }
    "png"
}

pub fn mime_for_extension(extension: &str) -> Option<&'static str> {
    match extension.trim().to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_base64_encodes_standard_alphabet() {
        let payload = ImagePayload::new(b"abc".to_vec(), "image/png");
        assert_eq!(payload.to_base64(), "YWJj");
    }

    #[test]
    fn from_base64_rejects_garbage() {
        assert!(ImagePayload::from_base64("%%%", "image/png").is_err());
        let payload = ImagePayload::from_base64("YWJj\n", "image/jpeg").unwrap();
        assert_eq!(payload.bytes(), b"abc");
        assert_eq!(payload.file_extension(), "jpg");
    }

    #[test]
    fn clones_share_bytes() {
        let image = GeneratedImage::new(
            ImageId::new("2026-01-01T00:00:00.000Z"),
            ImagePayload::new(vec![1u8; 64], "image/jpeg"),
            "GT concept",
        );
        let copy = image.clone();
        assert!(std::ptr::eq(
            image.payload().bytes().as_ptr(),
            copy.payload().bytes().as_ptr()
        ));
    }

    #[test]
    fn upload_ids_are_recognized_by_prefix() {
        assert!(ImageId::new("upload-2026-01-01T00:00:00Z").is_upload());
        assert!(!ImageId::new("2026-01-01T00:00:00Z").is_upload());
    }
}
