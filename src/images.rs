//! Image intake: format detection, the uploaded-image list, and the two
//! asynchronous decodes (preview and payload) each accepted file goes through.

use std::path::{Path, PathBuf};

use base64::Engine;
use tokio::sync::mpsc::UnboundedSender;

use crate::app::AppEvent;

/// Error shown when a selected file is not an image.
pub const NOT_AN_IMAGE: &str = "Please upload an image file";

/// Image formats accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    WebP,
    Gif,
}

impl ImageFormat {
    /// Detect the format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Detect the format from the file's magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            Some(Self::Png)
        } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            Some(Self::WebP)
        } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else {
            None
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
            Self::Gif => "image/gif",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::WebP => "WebP",
            Self::Gif => "GIF",
        }
    }
}

/// One attached image. `preview` and `payload` fill in asynchronously after
/// acceptance; `payload` may still be None when the user submits, in which
/// case the image is skipped for that request.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// Stable identifier keying decode completions. Never reused within a
    /// session, so a completion arriving after removal identifies nothing.
    pub id: u64,
    pub path: PathBuf,
    pub name: String,
    pub mime: String,
    pub preview: Option<PreviewInfo>,
    pub payload: Option<String>,
}

/// What the preview decode learned about the file.
#[derive(Debug, Clone, Copy)]
pub struct PreviewInfo {
    pub size_bytes: u64,
    pub format: Option<ImageFormat>,
}

impl UploadedImage {
    /// Build an entry for an accepted path. Returns None for non-image files.
    pub fn accept(id: u64, path: &Path) -> Option<Self> {
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ImageFormat::from_extension)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Some(Self {
            id,
            path: path.to_path_buf(),
            name,
            mime: format.mime_type().to_string(),
            preview: None,
            payload: None,
        })
    }
}

/// Spawn the preview decode: reads the head of the file and reports the
/// detected format and total size.
pub fn spawn_preview_decode(id: u64, path: PathBuf, tx: UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        let event = match preview_decode(&path).await {
            Ok(info) => AppEvent::PreviewReady { id, info },
            Err(e) => {
                tracing::warn!("Preview decode failed for {}: {}", path.display(), e);
                AppEvent::DecodeFailed { id, error: e.to_string() }
            }
        };
        let _ = tx.send(event);
    });
}

/// Spawn the payload decode: reads the whole file and base64-encodes it
/// (no data-URI prefix; the prefix is added at request-composition time).
pub fn spawn_payload_decode(id: u64, path: PathBuf, tx: UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        let event = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let payload = base64::engine::general_purpose::STANDARD.encode(&bytes);
                AppEvent::PayloadReady { id, payload }
            }
            Err(e) => {
                tracing::warn!("Payload decode failed for {}: {}", path.display(), e);
                AppEvent::DecodeFailed { id, error: e.to_string() }
            }
        };
        let _ = tx.send(event);
    });
}

async fn preview_decode(path: &Path) -> std::io::Result<PreviewInfo> {
    use tokio::io::AsyncReadExt;

    let size_bytes = tokio::fs::metadata(path).await?.len();
    let mut head = [0u8; 16];
    let mut file = tokio::fs::File::open(path).await?;
    let n = file.read(&mut head).await?;
    Ok(PreviewInfo {
        size_bytes,
        format: ImageFormat::from_magic_bytes(&head[..n]),
    })
}

/// Format a byte count for the image row.
pub fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;

    if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    const JPEG_MAGIC: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];
    const WEBP_MAGIC: [u8; 12] = *b"RIFF\x00\x00\x00\x00WEBP";

    #[test]
    fn test_format_from_magic_bytes() {
        assert_eq!(ImageFormat::from_magic_bytes(&PNG_MAGIC), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_magic_bytes(&JPEG_MAGIC), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_magic_bytes(&WEBP_MAGIC), Some(ImageFormat::WebP));
        assert_eq!(ImageFormat::from_magic_bytes(b"GIF89a"), Some(ImageFormat::Gif));
        assert_eq!(ImageFormat::from_magic_bytes(b"not an image"), None);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ImageFormat::from_extension("png"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_extension("JPG"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("jpeg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("webp"), Some(ImageFormat::WebP));
        assert_eq!(ImageFormat::from_extension("conf"), None);
    }

    #[test]
    fn test_accept_rejects_non_images() {
        assert!(UploadedImage::accept(1, Path::new("/tmp/photo.png")).is_some());
        assert!(UploadedImage::accept(2, Path::new("/tmp/notes.txt")).is_none());
        assert!(UploadedImage::accept(3, Path::new("/tmp/no-extension")).is_none());
    }

    #[test]
    fn test_accept_sets_mime_from_extension() {
        let img = UploadedImage::accept(1, Path::new("/tmp/photo.jpeg")).unwrap();
        assert_eq!(img.mime, "image/jpeg");
        assert_eq!(img.name, "photo.jpeg");
        assert!(img.payload.is_none());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KiB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MiB");
    }
}
