//! Device diagnostics: SMART passes, read-only fsck and the resulting report.
//!
//! The probes are best-effort. A missing tool, a timeout or unreadable output
//! downgrades the affected fields and adds a note instead of failing the analysis.

pub mod fsck;
pub mod smart;

pub use fsck::{FilesystemCheck, FsckOutcome};
pub use smart::SmartAttribute;

use crate::config::Config;
use crate::errors::{Result, SalvageError};
use crate::health;
use crate::inventory::DeviceInventory;
use crate::report::DeviceReport;
use crate::validate::{validate, PathKind};
use salvage_hal::{classify_device_name, device_name, CommandOutput, DeviceClass, SystemHal};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmartReport {
    /// `PASSED`, `FAILED`, or whatever other token the drive reported.
    pub overall_health: String,
    pub smart_supported: bool,
    pub attributes: BTreeMap<SmartAttribute, u64>,
    pub temperature: String,
    pub power_on_hours: String,
    pub error_log_summary: String,
    pub sata_phy_errors: Option<BTreeMap<String, u64>>,
    /// Probes that could not run or produced nothing usable.
    pub notes: Vec<String>,
}

impl Default for SmartReport {
    fn default() -> Self {
        Self {
            overall_health: smart::UNKNOWN_HEALTH.to_string(),
            smart_supported: false,
            attributes: BTreeMap::new(),
            temperature: smart::NOT_AVAILABLE.to_string(),
            power_on_hours: smart::NOT_AVAILABLE.to_string(),
            error_log_summary: smart::UNAVAILABLE.to_string(),
            sata_phy_errors: None,
            notes: Vec::new(),
        }
    }
}

/// Whole disk or partition, with the disk that carries SMART data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTarget {
    pub is_partition: bool,
    /// Disk to query with smartctl: the device itself or its parent.
    pub smart_device: String,
}

pub fn classify_device(device: &str) -> DeviceTarget {
    let name = device_name(device);
    match classify_device_name(name) {
        DeviceClass::Disk => DeviceTarget {
            is_partition: false,
            smart_device: device.to_string(),
        },
        DeviceClass::Partition { parent, .. } => {
            let dir = &device[..device.len() - name.len()];
            DeviceTarget {
                is_partition: true,
                smart_device: format!("{}{}", dir, parent),
            }
        }
    }
}

pub struct DiagnosticsEngine {
    hal: Arc<dyn SystemHal>,
    config: Config,
    inventory: DeviceInventory,
}

impl DiagnosticsEngine {
    pub fn new(hal: Arc<dyn SystemHal>, config: Config) -> Self {
        let inventory = DeviceInventory::new(hal.clone(), config.clone());
        Self {
            hal,
            config,
            inventory,
        }
    }

    pub fn analyze(&self, device: &str) -> Result<DeviceReport> {
        validate(device, PathKind::Device)?;
        let target = classify_device(device);
        log::info!(
            "analyzing {} (SMART source {})",
            device,
            target.smart_device
        );

        let basic_info = match self.inventory.describe(device) {
            Ok(info) => Some(info),
            Err(e) => {
                log::warn!("no basic info for {}: {}", device, e);
                None
            }
        };

        let smart = self.smart_report(&target.smart_device);
        let health = health::score(&smart);

        let filesystem = if target.is_partition {
            let known = basic_info.as_ref().and_then(|info| info.fstype.clone());
            Some(self.check_filesystem(device, known))
        } else {
            None
        };

        Ok(DeviceReport {
            device_path: device.to_string(),
            generated_at_unix_ms: unix_now_ms(),
            is_partition: target.is_partition,
            parent_disk: target.is_partition.then(|| target.smart_device.clone()),
            basic_info,
            smart,
            health,
            filesystem,
        })
    }

    /// One smartctl pass. Non-zero exits are normal: the status is a bitmask.
    fn smartctl(&self, args: &[&str], notes: &mut Vec<String>) -> Option<CommandOutput> {
        match self
            .hal
            .command_output("smartctl", args, self.config.timeouts.smart())
        {
            Ok(output) => {
                if let Some(code) = output.code.filter(|c| *c != 0) {
                    log::debug!("smartctl {:?} exit status {:#04x}", args, code);
                }
                Some(output)
            }
            Err(e) => {
                let err = SalvageError::from(e);
                log::warn!("smartctl {:?}: {}", args, err);
                notes.push(format!("smartctl {}: {}", args[..args.len() - 1].join(" "), err));
                None
            }
        }
    }

    pub fn smart_report(&self, disk: &str) -> SmartReport {
        let mut report = SmartReport::default();

        let Some(summary_output) = self.smartctl(&["-a", disk], &mut report.notes) else {
            return report;
        };
        let summary = smart::parse_summary(&summary_output.stdout);
        if summary.explicitly_unsupported {
            report.overall_health = "NOT SUPPORTED".to_string();
            return report;
        }
        let Some(token) = summary.overall_health else {
            report
                .notes
                .push("smartctl -a: no overall-health result".to_string());
            return report;
        };

        report.smart_supported = true;
        report.overall_health = token;
        report.attributes = summary.attributes;
        if let Some(celsius) = summary.temperature_c {
            report.temperature = smart::format_temperature(celsius);
        }
        if let Some(hours) = summary.power_on_hours {
            report.power_on_hours = smart::format_power_on_hours(hours);
        }

        if let Some(output) = self.smartctl(&["-l", "error", disk], &mut report.notes) {
            report.error_log_summary = smart::parse_error_log(&output.stdout);
        }
        if let Some(output) = self.smartctl(&["-x", disk], &mut report.notes) {
            report.sata_phy_errors = smart::parse_sata_phy(&output.stdout);
        }
        report
    }

    /// Run the read-only check for `device`. `fstype` is looked up when not known.
    pub fn check_filesystem(&self, device: &str, fstype: Option<String>) -> FilesystemCheck {
        let fstype = match fstype {
            Some(fs) => fs,
            None => match self.inventory.filesystem_type(device) {
                Ok(fs) => fs,
                Err(SalvageError::NoFilesystem { .. }) => return FilesystemCheck::not_run(),
                Err(e) => {
                    return FilesystemCheck {
                        fstype: None,
                        outcome: FsckOutcome::CheckFailed,
                        details: fsck::truncate_details(&e.to_string()),
                    }
                }
            },
        };

        let (program, args) = fsck::check_command(&fstype, device);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let (outcome, details) =
            match self
                .hal
                .command_output(program, &args, self.config.timeouts.fsck())
            {
                Ok(output) => {
                    let combined = output.combined();
                    (fsck::classify_fsck(output.code, &combined), combined)
                }
                Err(e) => {
                    let err = SalvageError::from(e);
                    log::warn!("{} on {}: {}", program, device, err);
                    (FsckOutcome::CheckFailed, err.to_string())
                }
            };
        log::info!("{} on {}: {}", program, device, outcome.label());

        FilesystemCheck {
            fstype: Some(fstype),
            outcome,
            details: fsck::truncate_details(&details),
        }
    }
}

fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_resolve_to_parent_disk() {
        let target = classify_device("/dev/sdb1");
        assert!(target.is_partition);
        assert_eq!(target.smart_device, "/dev/sdb");

        let target = classify_device("/dev/sda");
        assert!(!target.is_partition);
        assert_eq!(target.smart_device, "/dev/sda");
    }

    #[test]
    fn nvme_and_mmc_naming() {
        assert_eq!(
            classify_device("/dev/nvme0n1"),
            DeviceTarget {
                is_partition: false,
                smart_device: "/dev/nvme0n1".into()
            }
        );
        assert_eq!(classify_device("/dev/nvme0n1p3").smart_device, "/dev/nvme0n1");
        assert!(!classify_device("/dev/mmcblk0").is_partition);
        assert_eq!(classify_device("/dev/mmcblk0p1").smart_device, "/dev/mmcblk0");
    }

    #[test]
    fn optical_and_raid_devices_are_queried_directly() {
        for device in ["/dev/sr0", "/dev/md0", "/dev/zram0"] {
            let target = classify_device(device);
            assert!(!target.is_partition, "{device}");
            assert_eq!(target.smart_device, device);
        }
        assert_eq!(classify_device("/dev/md127p1").smart_device, "/dev/md127");
    }

    #[test]
    fn default_report_is_unsupported() {
        let report = SmartReport::default();
        assert!(!report.smart_supported);
        assert_eq!(report.error_log_summary, "unavailable");
        assert_eq!(report.temperature, "N/A");
    }
}
