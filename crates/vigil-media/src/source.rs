//! Uniform `Open/ReadFrame/GetInfo/Close` capability over RTSP, HTTP-MJPEG,
//! and local file sources.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_file, probe_target, StreamInfo};

const RTSP_OPEN_TIMEOUT: Duration = Duration::from_secs(5);
const HTTP_OPEN_TIMEOUT: Duration = Duration::from_secs(10);
const FILE_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "flv", "wmv", "m4v"];

/// One decoded frame's position in the source, yielded by `read_frame`.
/// Pixel data is not carried here — inference reads frames directly from
/// the chunk file via the detection engine's own decode path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHandle {
    pub frame_number: u64,
}

#[async_trait]
pub trait StreamSource: Send {
    /// Commits to the source. On any failure, no native resources are left
    /// allocated. On success, a usable handle has been established.
    async fn open(&mut self) -> MediaResult<()>;

    /// Advances one frame. `Ok(None)` signals end-of-stream (file sources
    /// only; live sources end only via `close` or a read error).
    async fn read_frame(&mut self) -> MediaResult<Option<FrameHandle>>;

    fn get_info(&self) -> MediaResult<StreamInfo>;

    /// MUST release native resources even if called after a partial open.
    async fn close(&mut self) -> MediaResult<()>;
}

pub fn extension_allowed(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| FILE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Local file source. Supports random access via the Chunker's own
/// `-ss`/`-t` seeking; `read_frame` here only advances a logical cursor for
/// callers that enumerate frames one at a time.
pub struct FileSource {
    path: PathBuf,
    info: Option<StreamInfo>,
    cursor: u64,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            info: None,
            cursor: 0,
        }
    }
}

#[async_trait]
impl StreamSource for FileSource {
    async fn open(&mut self) -> MediaResult<()> {
        if !self.path.exists() {
            return Err(MediaError::FileNotFound(self.path.clone()));
        }
        let meta = tokio::fs::metadata(&self.path).await?;
        if !meta.is_file() {
            return Err(MediaError::NotARegularFile(self.path.clone()));
        }
        if !extension_allowed(&self.path) {
            let ext = self
                .path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_string();
            return Err(MediaError::UnsupportedExtension(ext));
        }
        self.info = Some(probe_file(&self.path).await?);
        self.cursor = 0;
        Ok(())
    }

    async fn read_frame(&mut self) -> MediaResult<Option<FrameHandle>> {
        let info = self.info.ok_or(MediaError::NotOpen)?;
        if self.cursor >= info.frame_count {
            return Ok(None);
        }
        let handle = FrameHandle {
            frame_number: self.cursor,
        };
        self.cursor += 1;
        Ok(Some(handle))
    }

    fn get_info(&self) -> MediaResult<StreamInfo> {
        self.info.ok_or(MediaError::NotOpen)
    }

    async fn close(&mut self) -> MediaResult<()> {
        self.info = None;
        Ok(())
    }
}

/// RTSP live source. `open` fails fast if the first frame cannot be probed
/// within `RTSP_OPEN_TIMEOUT`.
pub struct RtspSource {
    url: String,
    info: Option<StreamInfo>,
    cursor: u64,
}

impl RtspSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            info: None,
            cursor: 0,
        }
    }
}

#[async_trait]
impl StreamSource for RtspSource {
    async fn open(&mut self) -> MediaResult<()> {
        if !self.url.starts_with("rtsp://") {
            return Err(MediaError::InvalidStreamUrl(self.url.clone()));
        }
        let info = timeout(RTSP_OPEN_TIMEOUT, probe_target(&self.url))
            .await
            .map_err(|_| MediaError::OpenTimeout(RTSP_OPEN_TIMEOUT.as_millis() as u64))??;
        self.info = Some(info);
        self.cursor = 0;
        Ok(())
    }

    async fn read_frame(&mut self) -> MediaResult<Option<FrameHandle>> {
        self.info.ok_or(MediaError::NotOpen)?;
        let handle = FrameHandle {
            frame_number: self.cursor,
        };
        self.cursor += 1;
        Ok(Some(handle))
    }

    fn get_info(&self) -> MediaResult<StreamInfo> {
        self.info.ok_or(MediaError::NotOpen)
    }

    async fn close(&mut self) -> MediaResult<()> {
        self.info = None;
        Ok(())
    }
}

/// HTTP-MJPEG live source. `open` performs a reachability probe before
/// committing to a read pipeline.
pub struct HttpSource {
    url: String,
    info: Option<StreamInfo>,
    cursor: u64,
}

impl HttpSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            info: None,
            cursor: 0,
        }
    }

    async fn probe_reachable(&self) -> MediaResult<()> {
        let client = reqwest::Client::builder().timeout(HTTP_OPEN_TIMEOUT).build()?;
        let resp = client.head(&self.url).send().await?;
        if resp.status().is_success() || resp.status().is_redirection() {
            Ok(())
        } else {
            Err(MediaError::InvalidStreamUrl(format!(
                "{} returned {}",
                self.url,
                resp.status()
            )))
        }
    }
}

#[async_trait]
impl StreamSource for HttpSource {
    async fn open(&mut self) -> MediaResult<()> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(MediaError::InvalidStreamUrl(self.url.clone()));
        }
        timeout(HTTP_OPEN_TIMEOUT, self.probe_reachable())
            .await
            .map_err(|_| MediaError::OpenTimeout(HTTP_OPEN_TIMEOUT.as_millis() as u64))??;
        let info = timeout(HTTP_OPEN_TIMEOUT, probe_target(&self.url))
            .await
            .map_err(|_| MediaError::OpenTimeout(HTTP_OPEN_TIMEOUT.as_millis() as u64))??;
        self.info = Some(info);
        self.cursor = 0;
        Ok(())
    }

    async fn read_frame(&mut self) -> MediaResult<Option<FrameHandle>> {
        self.info.ok_or(MediaError::NotOpen)?;
        let handle = FrameHandle {
            frame_number: self.cursor,
        };
        self.cursor += 1;
        Ok(Some(handle))
    }

    fn get_info(&self) -> MediaResult<StreamInfo> {
        self.info.ok_or(MediaError::NotOpen)
    }

    async fn close(&mut self) -> MediaResult<()> {
        self.info = None;
        Ok(())
    }
}

/// Opens a stream for a one-shot reachability test (the
/// `test-stream` endpoint): Open → GetInfo → Close.
pub async fn test_stream(mut source: Box<dyn StreamSource>) -> MediaResult<StreamInfo> {
    source.open().await?;
    let info = source.get_info();
    let _ = source.close().await;
    info
}

/// Probes `ffmpeg` presence without starting a process — used at startup
/// to fail fast rather than on first job dispatch.
pub async fn check_ffmpeg_available() -> bool {
    Command::new("ffmpeg").arg("-version").output().await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_disallowed_extensions() {
        assert!(extension_allowed(Path::new("clip.mp4")));
        assert!(extension_allowed(Path::new("clip.MKV")));
        assert!(!extension_allowed(Path::new("clip.txt")));
        assert!(!extension_allowed(Path::new("clip")));
    }
}
