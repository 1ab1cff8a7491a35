//! Diagnostics report and its JSON export.

use crate::diagnostics::{FilesystemCheck, SmartReport};
use crate::errors::{Result, SalvageError};
use crate::health::HealthAssessment;
use crate::inventory::DeviceDescriptor;
use crate::validate::{validate, PathKind};
use salvage_hal::device_name;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceReport {
    pub device_path: String,
    pub generated_at_unix_ms: u64,
    pub is_partition: bool,
    pub parent_disk: Option<String>,
    pub basic_info: Option<DeviceDescriptor>,
    /// SMART data of the disk itself, or of the parent disk for a partition.
    pub smart: SmartReport,
    pub health: HealthAssessment,
    /// Only present for partitions.
    pub filesystem: Option<FilesystemCheck>,
}

impl DeviceReport {
    pub fn file_name(&self) -> String {
        format!(
            "disk_properties_{}_{}.json",
            device_name(&self.device_path),
            self.generated_at_unix_ms
        )
    }
}

/// Write `report` as pretty JSON into `dir`, creating it if needed.
pub fn write_report(report: &DeviceReport, dir: &Path) -> Result<PathBuf> {
    validate(&dir.to_string_lossy(), PathKind::Log)?;
    std::fs::create_dir_all(dir)
        .map_err(|e| SalvageError::Filesystem(format!("cannot create {}: {}", dir.display(), e)))?;

    let path = dir.join(report.file_name());
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| SalvageError::Parse(format!("report: {}", e)))?;
    std::fs::write(&path, json)
        .map_err(|e| SalvageError::Filesystem(format!("cannot write {}: {}", path.display(), e)))?;
    log::info!("saved report for {} to {}", report.device_path, path.display());
    Ok(path)
}
