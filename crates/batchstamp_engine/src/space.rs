use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use sysinfo::Disks;

/// Known mount points, used to attribute files to a partition.
#[derive(Debug, Clone, Default)]
pub struct PartitionTable {
    /// Longest path first so nested mounts win.
    mounts: Vec<PathBuf>,
}

impl PartitionTable {
    pub fn new(mut mounts: Vec<PathBuf>) -> Self {
        mounts.sort();
        mounts.dedup();
        mounts.sort_by_key(|mount| std::cmp::Reverse(mount.components().count()));
        Self { mounts }
    }

    pub fn from_system() -> Self {
        let disks = Disks::new_with_refreshed_list();
        Self::new(
            disks
                .list()
                .iter()
                .map(|disk| disk.mount_point().to_path_buf())
                .collect(),
        )
    }

    pub fn partition_of(&self, path: &Path) -> Option<PathBuf> {
        let absolute = std::path::absolute(path).ok()?;
        self.mounts
            .iter()
            .find(|mount| absolute.starts_with(mount))
            .cloned()
    }
}

pub trait FreeSpaceProbe: Send + Sync {
    /// Available bytes for each requested partition that could be measured.
    fn available(&self, partitions: &[PathBuf]) -> BTreeMap<PathBuf, u64>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SysinfoProbe;

impl FreeSpaceProbe for SysinfoProbe {
    fn available(&self, partitions: &[PathBuf]) -> BTreeMap<PathBuf, u64> {
        let disks = Disks::new_with_refreshed_list();
        disks
            .list()
            .iter()
            .filter(|disk| partitions.iter().any(|p| p == disk.mount_point()))
            .map(|disk| (disk.mount_point().to_path_buf(), disk.available_space()))
            .collect()
    }
}
