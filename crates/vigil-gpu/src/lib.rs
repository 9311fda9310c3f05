//! GPU Registry: discovers, probes, and advisorily allocates GPUs for the
//! dispatcher under a free-memory/utilization policy.

pub mod error;
pub mod probe;
pub mod registry;

pub use error::{GpuError, GpuResult};
pub use probe::{GpuProbe, NullProbe, ProbedSlot};
pub use registry::GpuRegistry;

#[cfg(feature = "gpu")]
pub use probe::nvml::NvmlProbe;
