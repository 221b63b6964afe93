//! Attachment resolution and encoding
//!
//! Images, audio, video and PDF files are read and base64 encoded for the
//! generation providers. Anything else is skipped with a warning.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sdk::errors::{DevTeamErrorExt, EngineError};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::llm::MediaPart;

/// Resolve a client-supplied upload name inside `upload_dir`
///
/// Only the final path component is honoured. Returns `None` when the file
/// does not exist.
pub fn resolve_upload(upload_dir: &Path, reference: &str) -> Option<PathBuf> {
    let name = Path::new(reference.trim()).file_name()?;
    let path = upload_dir.join(name);
    if path.is_file() {
        Some(path)
    } else {
        warn!("Attachment '{}' not found in upload directory", reference);
        None
    }
}

/// Resolve a local file passed on the command line
pub fn resolve_local(path: &Path) -> Result<PathBuf> {
    path.canonicalize()
        .with_context(|| format!("Attachment not found: {}", path.display()))
}

fn mime_for(path: &Path) -> String {
    let is_pdf = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if is_pdf {
        return "application/pdf".to_string();
    }

    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}

/// MIME type of `path` if the providers accept it
fn supported_mime(path: &Path) -> Result<String, EngineError> {
    let mime = mime_for(path);
    let supported = mime == "application/pdf"
        || mime.starts_with("image/")
        || mime.starts_with("audio/")
        || mime.starts_with("video/");

    if supported {
        Ok(mime)
    } else {
        Err(EngineError::UnsupportedAttachment(format!(
            "{} ({})",
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            mime
        )))
    }
}

/// True if any attachment is a video
pub fn has_video(paths: &[PathBuf]) -> bool {
    paths.iter().any(|p| mime_for(p).starts_with("video/"))
}

/// Read and encode every supported attachment
///
/// Unreadable or unsupported files are logged and skipped.
pub async fn load_media(paths: &[PathBuf]) -> Vec<MediaPart> {
    let mut media = Vec::with_capacity(paths.len());

    for path in paths {
        let mime_type = match supported_mime(path) {
            Ok(mime) => mime,
            Err(e) => {
                warn!(hint = e.user_hint(), "{}, skipping", e);
                continue;
            }
        };

        match tokio::fs::read(path).await {
            Ok(bytes) => {
                debug!(path = %path.display(), mime = %mime_type, bytes = bytes.len(), "attachment encoded");
                media.push(MediaPart {
                    name: path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    mime_type,
                    data: STANDARD.encode(bytes),
                });
            }
            Err(e) => warn!("Failed to read attachment {}: {}", path.display(), e),
        }
    }

    media
}

/// Delete attachments that live inside `upload_dir`
///
/// Files the caller referenced from elsewhere on disk are left alone.
pub async fn remove_uploads(upload_dir: &Path, paths: &[PathBuf]) {
    for path in paths.iter().filter(|p| p.starts_with(upload_dir)) {
        log_removal(path, tokio::fs::remove_file(path).await);
    }
}

/// Blocking variant for contexts that cannot await
pub fn remove_uploads_blocking(upload_dir: &Path, paths: &[PathBuf]) {
    for path in paths.iter().filter(|p| p.starts_with(upload_dir)) {
        log_removal(path, std::fs::remove_file(path));
    }
}

fn log_removal(path: &Path, result: std::io::Result<()>) {
    match result {
        Ok(()) => info!("Removed uploaded attachment {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove attachment {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_upload_uses_file_name_only() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("mock.png"), b"png").unwrap();

        assert_eq!(
            resolve_upload(temp.path(), "../../mock.png"),
            Some(temp.path().join("mock.png"))
        );
        assert!(resolve_upload(temp.path(), "missing.png").is_none());
    }

    #[test]
    fn test_mime_detection() {
        assert_eq!(mime_for(Path::new("doc.PDF")), "application/pdf");
        assert_eq!(mime_for(Path::new("shot.png")), "image/png");
        assert!(has_video(&[PathBuf::from("demo.mp4")]));
        assert!(!has_video(&[PathBuf::from("shot.png")]));
    }

    #[test]
    fn test_unsupported_type_is_rejected() {
        assert_eq!(supported_mime(Path::new("clip.mp3")).unwrap(), "audio/mpeg");
        match supported_mime(Path::new("/tmp/notes.docx")) {
            Err(EngineError::UnsupportedAttachment(detail)) => {
                assert!(detail.starts_with("notes.docx"));
            }
            other => panic!("expected unsupported attachment, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_load_media_skips_unsupported() {
        let temp = TempDir::new().unwrap();
        let image = temp.path().join("mock.png");
        let text = temp.path().join("notes.txt");
        std::fs::write(&image, [0x89, b'P', b'N', b'G']).unwrap();
        std::fs::write(&text, "hello").unwrap();

        let media = load_media(&[image, text, temp.path().join("gone.jpg")]).await;
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].name, "mock.png");
        assert_eq!(media[0].mime_type, "image/png");
        assert_eq!(media[0].data, STANDARD.encode([0x89, b'P', b'N', b'G']));
    }

    #[tokio::test]
    async fn test_remove_uploads_only_inside_upload_dir() {
        let uploads = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        let uploaded = uploads.path().join("a.png");
        let local = elsewhere.path().join("b.png");
        std::fs::write(&uploaded, "a").unwrap();
        std::fs::write(&local, "b").unwrap();

        remove_uploads(uploads.path(), &[uploaded.clone(), local.clone()]).await;
        assert!(!uploaded.exists());
        assert!(local.exists());

        // Already gone is not an error
        remove_uploads_blocking(uploads.path(), &[uploaded]);
    }
}
