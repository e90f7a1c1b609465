//! Staging attachments from files on disk.

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

use super::types::Attachment;

/// Largest file accepted as an attachment.
const MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

/// Errors raised while reading an attachment.
#[derive(Debug, Error)]
pub enum FileReadError {
    /// The file could not be read.
    #[error("could not read {name}: {source}")]
    Io {
        /// File name.
        name: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The file is larger than the attachment limit.
    #[error("{name} is too large ({size} bytes)")]
    TooLarge {
        /// File name.
        name: String,
        /// File size in bytes.
        size: u64,
    },
    /// The file is neither an image nor UTF-8 text.
    #[error("{0} is not a supported image or text file")]
    Unsupported(String),
}

/// Image MIME type for a file extension.
fn image_mime(extension: &str) -> Option<&'static str> {
    match extension {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Read a file into an attachment.
///
/// Images become `data:` URIs; any other file must be UTF-8 text.
///
/// # Errors
/// Returns an error if the file cannot be read, is too large, or is binary.
pub fn read_attachment(path: &Path) -> Result<Attachment, FileReadError> {
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

    let io_err = |source| FileReadError::Io {
        name: name.clone(),
        source,
    };

    let size = std::fs::metadata(path).map_err(io_err)?.len();
    if size > MAX_ATTACHMENT_BYTES {
        return Err(FileReadError::TooLarge { name, size });
    }

    let bytes = std::fs::read(path).map_err(io_err)?;
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if let Some(mime) = image_mime(&extension) {
        let data_uri = format!("data:{mime};base64,{}", STANDARD.encode(&bytes));
        return Ok(Attachment::image(name, data_uri));
    }

    match String::from_utf8(bytes) {
        Ok(text) => Ok(Attachment::text(name, text)),
        Err(_) => Err(FileReadError::Unsupported(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::types::AttachmentKind;

    #[test]
    fn test_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# Notes\nhello").unwrap();

        let attachment = read_attachment(&path).unwrap();
        assert_eq!(attachment.kind, AttachmentKind::Text);
        assert_eq!(attachment.name, "notes.md");
        assert_eq!(attachment.content, "# Notes\nhello");
    }

    #[test]
    fn test_image_file_becomes_data_uri() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixel.PNG");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        let attachment = read_attachment(&path).unwrap();
        assert_eq!(attachment.kind, AttachmentKind::Image);
        assert_eq!(attachment.content, "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn test_binary_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x81]).unwrap();

        assert!(matches!(
            read_attachment(&path),
            Err(FileReadError::Unsupported(name)) if name == "blob.bin"
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_attachment(&dir.path().join("absent.txt"));
        assert!(matches!(result, Err(FileReadError::Io { .. })));
    }
}
