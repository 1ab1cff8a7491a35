//! Read-only filesystem checks on partitions.

use serde::Serialize;

/// Longest `details` text kept in a report.
pub const MAX_DETAILS_CHARS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FsckOutcome {
    NoErrors,
    MinorErrors,
    CheckFailed,
    SevereErrors,
    /// The partition has no filesystem to check.
    NotRun,
}

impl FsckOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            FsckOutcome::NoErrors => "no errors",
            FsckOutcome::MinorErrors => "minor errors",
            FsckOutcome::CheckFailed => "check failed",
            FsckOutcome::SevereErrors => "severe errors",
            FsckOutcome::NotRun => "not run",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilesystemCheck {
    /// `None` for unformatted partitions.
    pub fstype: Option<String>,
    pub outcome: FsckOutcome,
    pub details: String,
}

impl FilesystemCheck {
    pub fn not_run() -> Self {
        Self {
            fstype: None,
            outcome: FsckOutcome::NotRun,
            details: "unformatted".to_string(),
        }
    }
}

/// The read-only check command for a filesystem type.
pub fn check_command(fstype: &str, device: &str) -> (&'static str, Vec<String>) {
    match fstype {
        "ntfs" => ("ntfsfix", vec!["--no-action".into(), device.into()]),
        "exfat" => ("fsck.exfat", vec!["-n".into(), device.into()]),
        _ => ("fsck", vec!["-n".into(), device.into()]),
    }
}

/// Classify a finished check from its exit code and combined output.
pub fn classify_fsck(code: Option<i32>, output: &str) -> FsckOutcome {
    let text = output.to_lowercase();
    if code == Some(0) {
        if text.contains("clean") || text.contains("no errors") {
            FsckOutcome::NoErrors
        } else {
            FsckOutcome::MinorErrors
        }
    } else if text.contains("could not") || text.contains("failed") {
        FsckOutcome::CheckFailed
    } else {
        FsckOutcome::SevereErrors
    }
}

pub fn truncate_details(text: &str) -> String {
    text.chars().take(MAX_DETAILS_CHARS).collect()
}
