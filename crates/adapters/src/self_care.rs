// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Self-care admission gate: reject a submission before it ever reaches the
//! Store or Queue if the host is already under pressure.

use oj_core::SelfCareReason;
use std::time::Duration;
use sysinfo::{Disks, System};

const DISK_USAGE_THRESHOLD: f64 = 0.90;
const RAM_USAGE_THRESHOLD: f64 = 90.0;
const CPU_USAGE_THRESHOLD: f64 = 400.0;
const QUEUE_LENGTH_THRESHOLD: u64 = 50;
const CPU_SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

/// Raw host gauges, for the `/status/system` endpoint. Same sampling as
/// [`SelfCareGate::check`], just reported instead of compared.
#[derive(Debug, Clone, Copy)]
pub struct HostGauges {
    pub disk_usage_ratio: f64,
    pub ram_usage_percent: f64,
    pub cpu_usage_percent: f64,
}

/// Evaluates host gauges against the thresholds in order: storage, RAM,
/// CPU, then queue length, returning the first that trips.
pub struct SelfCareGate {
    data_dir: std::path::PathBuf,
}

impl SelfCareGate {
    pub fn new(data_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Blocking: samples CPU over [`CPU_SAMPLE_INTERVAL`]. Run via
    /// `spawn_blocking` from an async HTTP handler.
    pub fn check(&self, queue_length: u64) -> Result<(), SelfCareReason> {
        if self.disk_usage_ratio() > DISK_USAGE_THRESHOLD {
            return Err(SelfCareReason::Storage);
        }
        if self.ram_usage_percent() > RAM_USAGE_THRESHOLD {
            return Err(SelfCareReason::Ram);
        }
        if self.cpu_usage_percent() > CPU_USAGE_THRESHOLD {
            return Err(SelfCareReason::Cpu);
        }
        if queue_length > QUEUE_LENGTH_THRESHOLD {
            return Err(SelfCareReason::QueueFull);
        }
        Ok(())
    }

    /// Blocking: same 500ms CPU sample as `check`. Used by `/status/system`.
    pub fn gauges(&self) -> HostGauges {
        HostGauges {
            disk_usage_ratio: self.disk_usage_ratio(),
            ram_usage_percent: self.ram_usage_percent(),
            cpu_usage_percent: self.cpu_usage_percent(),
        }
    }

    fn disk_usage_ratio(&self) -> f64 {
        let disks = Disks::new_with_refreshed_list();
        let best = disks
            .list()
            .iter()
            .filter(|d| self.data_dir.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len());
        match best {
            Some(disk) => {
                let total = disk.total_space();
                if total == 0 {
                    return 0.0;
                }
                let used = total.saturating_sub(disk.available_space());
                used as f64 / total as f64
            }
            None => 0.0,
        }
    }

    fn ram_usage_percent(&self) -> f64 {
        let mut sys = System::new();
        sys.refresh_memory();
        let total = sys.total_memory();
        if total == 0 {
            return 0.0;
        }
        (sys.used_memory() as f64 / total as f64) * 100.0
    }

    fn cpu_usage_percent(&self) -> f64 {
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        std::thread::sleep(CPU_SAMPLE_INTERVAL);
        sys.refresh_cpu_usage();
        sys.cpus().iter().map(|c| c.cpu_usage() as f64).sum()
    }
}

#[cfg(test)]
#[path = "self_care_tests.rs"]
mod tests;
