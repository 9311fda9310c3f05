//! Accelerator library abstraction. `GpuRegistry` is generic over a probe
//! so it degrades cleanly to CPU-only operation when no accelerator
//! library is linked or present on the host.

use vigil_models::GpuId;

/// A freshly-read hardware reading for one device.
#[derive(Debug, Clone, Copy)]
pub struct ProbedSlot {
    pub total_mem: u64,
    pub free_mem: u64,
    pub utilization: f32,
    pub temperature: f32,
}

/// Discovers devices and refreshes their readings. Implementations must
/// never panic on a missing or errored accelerator library — they report
/// zero devices instead, and the registry degrades the system to CPU
/// inference for workers configured to allow it.
pub trait GpuProbe: Send + Sync {
    /// Device ids present at process start. Called once by the registry.
    fn discover(&self) -> Vec<(GpuId, String, u64)>;

    /// Re-reads one device's live counters. `None` means the probe failed
    /// for this device this round; the registry marks the slot
    /// unavailable until the next successful probe.
    fn read(&self, id: &GpuId) -> Option<ProbedSlot>;
}

/// Used when no accelerator library is available. Reports zero devices;
/// every allocation request returns `None`, degrading the system to CPU
/// inference.
#[derive(Debug, Default)]
pub struct NullProbe;

impl GpuProbe for NullProbe {
    fn discover(&self) -> Vec<(GpuId, String, u64)> {
        Vec::new()
    }

    fn read(&self, _id: &GpuId) -> Option<ProbedSlot> {
        None
    }
}

#[cfg(feature = "gpu")]
pub mod nvml {
    use super::*;
    use nvml_wrapper::Nvml;
    use tracing::warn;

    /// Backed by `nvml-wrapper`; falls back to zero devices if NVML
    /// cannot be initialized (driver absent, no NVIDIA hardware).
    pub struct NvmlProbe {
        nvml: Option<Nvml>,
    }

    impl NvmlProbe {
        pub fn new() -> Self {
            match Nvml::init() {
                Ok(nvml) => Self { nvml: Some(nvml) },
                Err(err) => {
                    warn!(error = %err, "nvml init failed, degrading to CPU-only GPU registry");
                    Self { nvml: None }
                }
            }
        }
    }

    impl Default for NvmlProbe {
        fn default() -> Self {
            Self::new()
        }
    }

    impl GpuProbe for NvmlProbe {
        fn discover(&self) -> Vec<(GpuId, String, u64)> {
            let Some(nvml) = &self.nvml else {
                return Vec::new();
            };
            let count = match nvml.device_count() {
                Ok(c) => c,
                Err(err) => {
                    warn!(error = %err, "nvml device_count failed");
                    return Vec::new();
                }
            };
            (0..count)
                .filter_map(|index| {
                    let device = nvml.device_by_index(index).ok()?;
                    let name = device.name().unwrap_or_else(|_| format!("gpu-{index}"));
                    let mem = device.memory_info().ok()?;
                    Some((GpuId::new(format!("gpu-{index}")), name, mem.total))
                })
                .collect()
        }

        fn read(&self, id: &GpuId) -> Option<ProbedSlot> {
            let nvml = self.nvml.as_ref()?;
            let index: u32 = id.as_str().strip_prefix("gpu-")?.parse().ok()?;
            let device = nvml.device_by_index(index).ok()?;
            let mem = device.memory_info().ok()?;
            let utilization = device.utilization_rates().ok()?.gpu as f32;
            let temperature = device
                .temperature(nvml_wrapper::enum_wrappers::device::TemperatureSensor::Gpu)
                .ok()? as f32;
            Some(ProbedSlot {
                total_mem: mem.total,
                free_mem: mem.free,
                utilization,
                temperature,
            })
        }
    }
}
