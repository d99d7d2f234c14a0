use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use autodesign_contracts::images::{mime_for_extension, ImagePayload};

/// Reads an image file into bytes + MIME type. The format is sniffed from
/// the content first and the file extension second.
pub fn read_image_file(path: &Path) -> Result<ImagePayload> {
    let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    if bytes.is_empty() {
        bail!("{} is empty", path.display());
    }
    let sniffed = image::guess_format(&bytes)
        .ok()
        .map(|format| format.to_mime_type());
    let by_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(mime_for_extension);
    let Some(mime_type) = sniffed.or(by_extension) else {
        bail!("{} is not a recognized image format", path.display());
    };
    Ok(ImagePayload::new(bytes, mime_type))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::read_image_file;
    use crate::testing::tiny_png;

    #[test]
    fn sniffs_format_from_content() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("mislabeled.jpg");
        fs::write(&path, tiny_png()?)?;

        let payload = read_image_file(&path)?;
        assert_eq!(payload.mime_type(), "image/png");
        assert_eq!(payload.bytes(), fs::read(&path)?.as_slice());
        Ok(())
    }

    #[test]
    fn falls_back_to_extension() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("concept.webp");
        fs::write(&path, b"opaque bytes")?;
        assert_eq!(read_image_file(&path)?.mime_type(), "image/webp");
        Ok(())
    }

    #[test]
    fn rejects_missing_empty_and_unknown_files() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        assert!(read_image_file(&temp.path().join("missing.png")).is_err());

        let empty = temp.path().join("empty.png");
        fs::write(&empty, b"")?;
        assert!(read_image_file(&empty).is_err());

        let text = temp.path().join("notes.txt");
        fs::write(&text, b"hello")?;
        let err = read_image_file(&text).unwrap_err();
        assert!(err.to_string().contains("not a recognized image format"));
        Ok(())
    }
}
