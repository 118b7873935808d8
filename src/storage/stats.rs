//! Host resource sampling for the dashboard.
//!
//! Memory, load and disk figures come from `sysinfo`. Disk space is read from
//! the mounted filesystem holding the storage root. Any figure that cannot be
//! sampled is reported as zero rather than failing the listing that asked for it.

use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sysinfo::{Disks, System};
use utoipa::ToSchema;

/// Physical memory in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct MemoryStats {
    pub free: u64,
    pub total: u64,
}

/// Space on the filesystem containing the storage root, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct StorageStats {
    /// Space available to unprivileged users.
    pub free: u64,
    pub total: u64,
}

/// Host resource snapshot, accurate as of `sampled_at`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    pub memory: MemoryStats,
    /// 1, 5 and 15 minute load averages.
    #[schema(value_type = Vec<f64>)]
    pub cpu: [f64; 3],
    pub storage: StorageStats,
    pub sampled_at: DateTime<Utc>,
}

/// Sample memory, load average and disk space for `root`.
///
/// Blocking; call from `spawn_blocking` inside the runtime.
pub fn sample_system_stats(root: &Path) -> SystemStats {
    let storage = match disk_stats(root) {
        Ok(storage) => storage,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to get disk stats, reporting zero");
            StorageStats::default()
        }
    };

    SystemStats {
        memory: memory_stats(),
        cpu: load_average(),
        storage,
        sampled_at: Utc::now(),
    }
}

fn memory_stats() -> MemoryStats {
    let mut system = System::new();
    system.refresh_memory();

    MemoryStats {
        free: system.available_memory(),
        total: system.total_memory(),
    }
}

fn load_average() -> [f64; 3] {
    let load = System::load_average();
    [load.one, load.five, load.fifteen]
}

/// Space on the disk whose mount point is the longest prefix of `root`.
fn disk_stats(root: &Path) -> io::Result<StorageStats> {
    let root = std::fs::canonicalize(root)?;
    let disks = Disks::new_with_refreshed_list();

    let disk = disks
        .iter()
        .filter(|disk| root.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().components().count())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no mounted disk holds {}", root.display()),
            )
        })?;

    Ok(StorageStats {
        free: disk.available_space(),
        total: disk.total_space(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sample_existing_root() {
        let temp_dir = TempDir::new().unwrap();

        let stats = sample_system_stats(temp_dir.path());

        assert!(stats.storage.total >= stats.storage.free);
        assert!(stats.memory.total >= stats.memory.free);
        assert!(stats.cpu.iter().all(|load| *load >= 0.0));
    }

    #[test]
    fn test_disk_stats_failure_degrades_to_zero() {
        let temp_dir = TempDir::new().unwrap();

        let stats = sample_system_stats(&temp_dir.path().join("gone"));

        assert_eq!(stats.storage, StorageStats::default());
    }

    #[test]
    fn test_serialize_shape() {
        let stats = SystemStats {
            memory: MemoryStats { free: 1, total: 2 },
            cpu: [0.5, 0.25, 0.125],
            storage: StorageStats { free: 3, total: 4 },
            sampled_at: Utc::now(),
        };

        let json = serde_json::to_value(&stats).unwrap();

        assert_eq!(json["memory"]["free"], 1);
        assert_eq!(json["memory"]["total"], 2);
        assert_eq!(json["cpu"].as_array().unwrap().len(), 3);
        assert_eq!(json["storage"]["total"], 4);
        assert!(json["sampledAt"].is_string());
    }
}
