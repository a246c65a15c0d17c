use std::path::Path;
use sysinfo::Disks;

pub struct DiskMonitor {
    disks: Disks,
    min_free_bytes: u64,
}

impl DiskMonitor {
    #[must_use]
    pub fn new(min_free_mb: u64) -> Self {
        Self {
            disks: Disks::new_with_refreshed_list(),
            min_free_bytes: min_free_mb.saturating_mul(1024 * 1024),
        }
    }

    /// 回傳路徑所在磁碟的可用空間，找不到對應磁碟時為 `None`
    pub fn available_space(&mut self, path: &Path) -> Option<u64> {
        self.disks.refresh(true);
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        // 取掛載點最長的那一個
        self.disks
            .list()
            .iter()
            .filter(|disk| path.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .map(sysinfo::Disk::available_space)
    }

    /// 空間不足時回傳目前的可用位元組數
    pub fn check(&mut self, path: &Path) -> Result<(), u64> {
        if self.min_free_bytes == 0 {
            return Ok(());
        }
        match self.available_space(path) {
            Some(available) if available < self.min_free_bytes => Err(available),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_zero_threshold_always_passes() {
        let temp_dir = TempDir::new().unwrap();
        let mut monitor = DiskMonitor::new(0);
        assert!(monitor.check(temp_dir.path()).is_ok());
    }

    #[test]
    fn test_huge_threshold_fails_when_disk_known() {
        let temp_dir = TempDir::new().unwrap();
        let mut monitor = DiskMonitor::new(u64::MAX / (1024 * 1024));
        if monitor.available_space(temp_dir.path()).is_some() {
            assert!(monitor.check(temp_dir.path()).is_err());
        }
    }
}
