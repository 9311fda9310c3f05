//! Owns the `{gpu_id -> GPUSlot}` map populated at startup by probing the
//! local accelerator library.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use vigil_models::{GpuId, GpuSlot};

use crate::probe::{GpuProbe, NullProbe};

pub struct GpuRegistry {
    probe: Arc<dyn GpuProbe>,
    slots: RwLock<HashMap<GpuId, GpuSlot>>,
}

impl GpuRegistry {
    /// Probes the local accelerator library once at construction. If the
    /// probe discovers no devices, the registry stays empty and every
    /// `get_available` call returns `None` — the system degrades to CPU
    /// inference.
    pub fn new(probe: Arc<dyn GpuProbe>) -> Self {
        let mut slots = HashMap::new();
        for (id, name, total_mem) in probe.discover() {
            slots.insert(
                id.clone(),
                GpuSlot {
                    id,
                    name,
                    total_mem_bytes: total_mem,
                    free_mem_bytes: total_mem,
                    utilization_pct: 0.0,
                    temperature_c: 0.0,
                    available: true,
                    last_probe_at: Utc::now(),
                },
            );
        }
        Self {
            probe,
            slots: RwLock::new(slots),
        }
    }

    /// Degrades to CPU-only: zero devices, every allocation returns `None`.
    pub fn cpu_only() -> Self {
        Self::new(Arc::new(NullProbe))
    }

    pub async fn slot_count(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn available_count(&self) -> usize {
        self.slots.read().await.values().filter(|s| s.available).count()
    }

    /// Refreshes every slot's live counters, then selects the first slot
    /// where `available ∧ free_mem >= min_free_bytes ∧ utilization < 90%`.
    /// Refreshing always records `last_probe_at`, even for slots that do
    /// not end up selected, so allocation decisions elsewhere in the
    /// dispatcher see fresh data too.
    pub async fn get_available(&self, min_free_bytes: u64) -> Option<GpuId> {
        let mut slots = self.slots.write().await;
        for (id, slot) in slots.iter_mut() {
            match self.probe.read(id) {
                Some(reading) => {
                    slot.free_mem_bytes = reading.free_mem;
                    slot.total_mem_bytes = reading.total_mem;
                    slot.utilization_pct = reading.utilization;
                    slot.temperature_c = reading.temperature;
                    slot.last_probe_at = Utc::now();
                }
                None => {
                    debug!(gpu_id = %id, "probe failed, marking slot unavailable");
                    slot.available = false;
                    slot.last_probe_at = Utc::now();
                }
            }
        }

        slots
            .values()
            .find(|s| s.is_allocatable(min_free_bytes))
            .map(|s| s.id.clone())
    }

    /// Advisory only — the registry does not cgroup or fence GPUs;
    /// enforcement is cooperative with the orchestrator.
    pub async fn mark_busy(&self, id: &GpuId) {
        if let Some(slot) = self.slots.write().await.get_mut(id) {
            slot.available = false;
        }
    }

    pub async fn mark_available(&self, id: &GpuId) {
        if let Some(slot) = self.slots.write().await.get_mut(id) {
            slot.available = true;
        }
    }

    pub async fn snapshot(&self) -> Vec<GpuSlot> {
        self.slots.read().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbedSlot;

    struct FixedProbe {
        devices: Vec<(GpuId, String, u64)>,
        reading: Option<ProbedSlot>,
    }

    impl GpuProbe for FixedProbe {
        fn discover(&self) -> Vec<(GpuId, String, u64)> {
            self.devices.clone()
        }
        fn read(&self, _id: &GpuId) -> Option<ProbedSlot> {
            self.reading
        }
    }

    #[tokio::test]
    async fn no_probe_means_no_available_gpu() {
        let registry = GpuRegistry::cpu_only();
        assert_eq!(registry.slot_count().await, 0);
        assert!(registry.get_available(1).await.is_none());
    }

    #[tokio::test]
    async fn selects_slot_under_utilization_ceiling_with_enough_free_memory() {
        let gpu0 = GpuId::new("gpu-0");
        let probe = FixedProbe {
            devices: vec![(gpu0.clone(), "test-gpu".to_string(), 16_000_000_000)],
            reading: Some(ProbedSlot {
                total_mem: 16_000_000_000,
                free_mem: 8_000_000_000,
                utilization: 10.0,
                temperature: 50.0,
            }),
        };
        let registry = GpuRegistry::new(Arc::new(probe));
        let selected = registry.get_available(2_000_000_000).await;
        assert_eq!(selected, Some(gpu0));
    }

    #[tokio::test]
    async fn busy_slot_is_not_selected() {
        let gpu0 = GpuId::new("gpu-0");
        let probe = FixedProbe {
            devices: vec![(gpu0.clone(), "test-gpu".to_string(), 16_000_000_000)],
            reading: Some(ProbedSlot {
                total_mem: 16_000_000_000,
                free_mem: 8_000_000_000,
                utilization: 10.0,
                temperature: 50.0,
            }),
        };
        let registry = GpuRegistry::new(Arc::new(probe));
        registry.mark_busy(&gpu0).await;
        assert!(registry.get_available(2_000_000_000).await.is_none());
        registry.mark_available(&gpu0).await;
        assert!(registry.get_available(2_000_000_000).await.is_some());
    }
}
