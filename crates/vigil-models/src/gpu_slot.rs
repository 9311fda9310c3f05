//! GPUSlot: the GPU Registry's view of one accelerator.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::GpuId;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GpuSlot {
    pub id: GpuId,
    pub name: String,
    pub total_mem_bytes: u64,
    pub free_mem_bytes: u64,
    /// Utilization percentage, 0-100.
    pub utilization_pct: f32,
    pub temperature_c: f32,
    /// `false` means logically reserved by the orchestrator, independent of
    /// physical utilization.
    pub available: bool,
    pub last_probe_at: DateTime<Utc>,
}

impl GpuSlot {
    /// Whether this slot can be handed out for a job needing `min_free_bytes`.
    pub fn is_allocatable(&self, min_free_bytes: u64) -> bool {
        self.available && self.free_mem_bytes >= min_free_bytes && self.utilization_pct < 90.0
    }
}
