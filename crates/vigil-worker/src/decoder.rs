//! Decodes a source (local file or RTSP/HTTP URL) into fixed-size raw RGB24
//! frames by piping ffmpeg's rawvideo muxer to this process.
//!
//! `vigil_media::StreamSource::read_frame` deliberately hands back only a
//! frame's position, not its pixels, leaving the pixel decode path to
//! whatever calls into the detection engine. This is that decode path,
//! built the same way the chunker and clip extractor shell out to ffmpeg
//! (`which` for presence, `tokio::process::Command`, piped stdout) rather
//! than linking a libav binding.

use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tracing::debug;

use crate::error::{WorkerError, WorkerResult};

pub struct RawFrameDecoder {
    child: Child,
    stdout: ChildStdout,
    frame_bytes: usize,
}

impl RawFrameDecoder {
    /// Spawns ffmpeg against `source`, producing `width x height` RGB24
    /// frames on stdout in source order. RTSP sources are pinned to TCP
    /// transport, matching `RtspSource`'s reliability expectations.
    pub async fn spawn(source: &str, width: u32, height: u32) -> WorkerResult<Self> {
        which::which("ffmpeg").map_err(|_| WorkerError::FfmpegNotFound)?;

        let mut args: Vec<String> = vec!["-v".into(), "error".into()];
        if source.starts_with("rtsp://") {
            args.push("-rtsp_transport".into());
            args.push("tcp".into());
        }
        args.push("-i".into());
        args.push(source.to_string());
        args.extend(["-f".into(), "rawvideo".into(), "-pix_fmt".into(), "rgb24".into(), "-".into()]);

        debug!(source, width, height, "spawning frame decoder");

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| WorkerError::Decode(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| WorkerError::Decode("ffmpeg stdout not piped".to_string()))?;

        Ok(Self {
            child,
            stdout,
            frame_bytes: width as usize * height as usize * 3,
        })
    }

    /// Reads the next full frame, or `None` once ffmpeg's stdout is
    /// exhausted cleanly between frames (end of file/stream).
    pub async fn next_frame(&mut self) -> WorkerResult<Option<Vec<u8>>> {
        let mut buf = vec![0u8; self.frame_bytes];
        let mut read = 0;
        while read < self.frame_bytes {
            let n = self
                .stdout
                .read(&mut buf[read..])
                .await
                .map_err(|e| WorkerError::Decode(e.to_string()))?;
            if n == 0 {
                return if read == 0 {
                    Ok(None)
                } else {
                    Err(WorkerError::Decode("source ended mid-frame".to_string()))
                };
            }
            read += n;
        }
        Ok(Some(buf))
    }

    /// Kills the underlying ffmpeg process. Safe to call after EOF.
    pub async fn close(mut self) {
        let _ = self.child.kill().await;
    }
}
