//! System memory gauge

use innkeeper_core::degradation::{DegradationError, DegradationResult};
use innkeeper_core::MemoryGauge;
use parking_lot::Mutex;
use sysinfo::System;

/// Reports used system memory as a percentage of total memory
pub struct SysinfoMemoryGauge {
    system: Mutex<System>,
}

impl std::fmt::Debug for SysinfoMemoryGauge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysinfoMemoryGauge").finish_non_exhaustive()
    }
}

impl SysinfoMemoryGauge {
    pub fn new() -> Self {
        Self { system: Mutex::new(System::new()) }
    }
}

impl Default for SysinfoMemoryGauge {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGauge for SysinfoMemoryGauge {
    fn usage_percent(&self) -> DegradationResult<f64> {
        let mut system = self.system.lock();
        system.refresh_memory();

        let total = system.total_memory();
        if total == 0 {
            return Err(DegradationError::Gauge {
                message: "total memory reported as zero".to_string(),
            });
        }
        Ok(system.used_memory() as f64 / total as f64 * 100.0)
    }
}
