//! Chunk: metadata for a bounded segment produced by the Chunker.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Chunk {
    pub chunk_index: u32,
    pub start_frame: u64,
    pub end_frame: u64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub path: PathBuf,
}

impl Chunk {
    pub fn frame_count(&self) -> u64 {
        self.end_frame.saturating_sub(self.start_frame)
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }
}
