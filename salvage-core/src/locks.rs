//! Per-path exclusion for operations that touch the same device or directory.
//!
//! Device paths are leased per whole disk: a partition and its parent disk share one
//! key, so formatting `/dev/sdb` excludes mounting `/dev/sdb1` and vice versa.
//! Directories are leased by their exact path.

use crate::errors::{Result, SalvageError};
use salvage_hal::{classify_device_name, device_name, DeviceClass};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Set of paths with an operation in flight. Cloning shares the set.
#[derive(Debug, Clone, Default)]
pub struct DeviceLocks {
    held: Arc<Mutex<HashSet<String>>>,
}

/// The key a path is leased under.
fn lease_key(path: &str) -> String {
    if !path.starts_with("/dev/") {
        return path.trim_end_matches('/').to_string();
    }
    let name = device_name(path);
    match classify_device_name(name) {
        DeviceClass::Disk => path.to_string(),
        DeviceClass::Partition { parent, .. } => {
            format!("{}{}", &path[..path.len() - name.len()], parent)
        }
    }
}

impl DeviceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.held.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claim `path`, failing immediately with `DeviceBusy` if it (or, for a device,
    /// its disk or any partition of it) is already claimed.
    pub fn acquire(&self, path: &str) -> Result<DeviceLease> {
        let key = lease_key(path);
        if !self.lock().insert(key.clone()) {
            return Err(SalvageError::DeviceBusy {
                path: path.to_string(),
            });
        }
        log::debug!("lease acquired: {} ({})", path, key);
        Ok(DeviceLease {
            locks: self.clone(),
            key,
        })
    }
}

/// RAII guard that releases its path when dropped.
#[derive(Debug)]
pub struct DeviceLease {
    locks: DeviceLocks,
    key: String,
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        self.locks.lock().remove(&self.key);
        log::debug!("lease released: {}", self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_lease_on_same_path_is_busy() {
        let locks = DeviceLocks::new();
        let _lease = locks.acquire("/dev/sdb").unwrap();
        let err = locks.acquire("/dev/sdb").unwrap_err();
        assert!(matches!(err, SalvageError::DeviceBusy { .. }));
        // Other disks are independent.
        let _other = locks.acquire("/dev/sdc").unwrap();
    }

    #[test]
    fn partition_and_parent_disk_exclude_each_other() {
        let locks = DeviceLocks::new();
        let part = locks.acquire("/dev/sdb1").unwrap();
        assert!(locks.acquire("/dev/sdb").is_err());
        assert!(locks.acquire("/dev/sdb2").is_err());
        drop(part);

        let _disk = locks.acquire("/dev/nvme0n1").unwrap();
        assert!(locks.acquire("/dev/nvme0n1p3").is_err());
        assert!(locks.acquire("/dev/nvme1n1p1").is_ok());
    }

    #[test]
    fn directories_are_keyed_by_exact_path() {
        let locks = DeviceLocks::new();
        let _lease = locks.acquire("/mnt/usb").unwrap();
        assert!(locks.acquire("/mnt/usb/").is_err());
        assert!(locks.acquire("/mnt/usb2").is_ok());
    }

    #[test]
    fn dropping_the_lease_frees_the_path() {
        let locks = DeviceLocks::new();
        {
            let _lease = locks.acquire("/dev/sdb1").unwrap();
            assert!(locks.acquire("/dev/sdb1").is_err());
        }
        assert!(locks.acquire("/dev/sdb1").is_ok());
    }

    #[test]
    fn leases_exclude_across_threads() {
        let locks = DeviceLocks::new();
        let lease = locks.acquire("/dev/sdd").unwrap();
        let shared = locks.clone();
        let busy = std::thread::spawn(move || shared.acquire("/dev/sdd1").is_err())
            .join()
            .unwrap();
        assert!(busy);
        drop(lease);
    }
}
