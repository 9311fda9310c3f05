//! Pure validation over stream URL strings and file paths. No network
//! probes — reachability is Stream Source's job.

use std::path::Path;

use vigil_models::SourceType;

use crate::error::{MediaError, MediaResult};
use crate::source::extension_allowed;

pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024 * 1024; // 10 GiB

/// Enforces scheme match (`rtsp://`, `http(s)://`) and, for `file`,
/// existence plus extension.
pub fn validate_stream_url(url: &str, kind: SourceType) -> MediaResult<()> {
    match kind {
        SourceType::Stream => {
            if url.starts_with("rtsp://") || url.starts_with("http://") || url.starts_with("https://") {
                Ok(())
            } else {
                Err(MediaError::InvalidStreamUrl(url.to_string()))
            }
        }
        SourceType::File => {
            let path = Path::new(url);
            if !path.exists() {
                return Err(MediaError::FileNotFound(path.to_path_buf()));
            }
            if !extension_allowed(path) {
                let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_string();
                return Err(MediaError::UnsupportedExtension(ext));
            }
            Ok(())
        }
    }
}

/// Rejects empty files, files over `MAX_UPLOAD_BYTES`, and bad extensions.
/// Stats the path only — no content inspection.
pub fn validate_file_upload(path: &Path, size_bytes: u64) -> MediaResult<()> {
    if !extension_allowed(path) {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_string();
        return Err(MediaError::UnsupportedExtension(ext));
    }
    if size_bytes == 0 {
        return Err(MediaError::EmptyFile(path.to_path_buf()));
    }
    if size_bytes > MAX_UPLOAD_BYTES {
        return Err(MediaError::FileTooLarge(size_bytes, MAX_UPLOAD_BYTES));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_requires_matching_scheme() {
        assert!(validate_stream_url("rtsp://cam.local/stream", SourceType::Stream).is_ok());
        assert!(validate_stream_url("https://cam.local/mjpeg", SourceType::Stream).is_ok());
        assert!(validate_stream_url("ftp://cam.local", SourceType::Stream).is_err());
    }

    #[test]
    fn file_upload_rejects_empty_and_oversized() {
        let path = Path::new("clip.mp4");
        assert!(validate_file_upload(path, 0).is_err());
        assert!(validate_file_upload(path, MAX_UPLOAD_BYTES + 1).is_err());
        assert!(validate_file_upload(path, 1024).is_ok());
    }

    #[test]
    fn file_upload_rejects_bad_extension() {
        let path = Path::new("clip.exe");
        assert!(validate_file_upload(path, 1024).is_err());
    }
}
