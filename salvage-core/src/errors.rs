use crate::validate::ValidationError;
use salvage_hal::HalError;
use serde::Serialize;
use thiserror::Error;

/// Result type alias for salvage operations
pub type Result<T> = std::result::Result<T, SalvageError>;

/// Coarse failure category reported to callers in an [`OperationResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    ToolNotFound,
    Execution,
    Filesystem,
    Parse,
}

impl FailureKind {
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::Validation => "validation error",
            FailureKind::ToolNotFound => "tool not found",
            FailureKind::Execution => "execution error",
            FailureKind::Filesystem => "filesystem error",
            FailureKind::Parse => "parse error",
        }
    }
}

#[derive(Error, Debug)]
pub enum SalvageError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Required tool not found: {tool}{hint}")]
    ToolNotFound { tool: String, hint: String },

    #[error("{program} failed (exit={code:?}): {detail}")]
    Execution {
        program: String,
        code: Option<i32>,
        detail: String,
    },

    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("No filesystem found on {device}")]
    NoFilesystem { device: String },

    #[error("{device} is already mounted at {at}")]
    AlreadyMounted { device: String, at: String },

    #[error("Path does not exist: {path}")]
    NotFound { path: String },

    #[error("Device is busy (another operation is running): {path}")]
    DeviceBusy { path: String },

    #[error("{0}")]
    Filesystem(String),

    #[error("Could not parse tool output: {0}")]
    Parse(String),
}

impl SalvageError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SalvageError::Validation(_) => FailureKind::Validation,
            SalvageError::ToolNotFound { .. } => FailureKind::ToolNotFound,
            SalvageError::Execution { .. } | SalvageError::Timeout { .. } => {
                FailureKind::Execution
            }
            SalvageError::NoFilesystem { .. }
            | SalvageError::AlreadyMounted { .. }
            | SalvageError::NotFound { .. }
            | SalvageError::DeviceBusy { .. }
            | SalvageError::Filesystem(_) => FailureKind::Filesystem,
            SalvageError::Parse(_) => FailureKind::Parse,
        }
    }

    pub(crate) fn tool_not_found(tool: &str) -> Self {
        SalvageError::ToolNotFound {
            tool: tool.to_string(),
            hint: install_hint(tool),
        }
    }
}

/// Package hint for the tools we know about.
fn install_hint(tool: &str) -> String {
    let package = match tool {
        "mkfs.ntfs" | "ntfsfix" | "ntfs-3g" => "ntfs-3g",
        "mkfs.exfat" | "fsck.exfat" => "exfatprogs",
        "mkfs.vfat" => "dosfstools",
        "mkfs.ext2" | "mkfs.ext3" | "mkfs.ext4" => "e2fsprogs",
        "smartctl" => "smartmontools",
        "lsblk" | "blkid" | "mount" => "util-linux",
        _ => return String::new(),
    };
    format!(" (install the '{}' package)", package)
}

impl From<HalError> for SalvageError {
    fn from(err: HalError) -> Self {
        match err {
            HalError::CommandNotFound(tool) => SalvageError::tool_not_found(&tool),
            HalError::CommandFailed {
                program,
                code,
                stderr,
            } => SalvageError::Execution {
                program,
                code,
                detail: stderr,
            },
            HalError::CommandTimeout {
                program,
                timeout_secs,
            } => SalvageError::Timeout {
                program,
                secs: timeout_secs,
            },
            HalError::SpawnFailed { program, reason } => SalvageError::Execution {
                program,
                code: None,
                detail: reason,
            },
            HalError::Io(e) => SalvageError::Filesystem(e.to_string()),
            HalError::Utf8(e) => SalvageError::Parse(e.to_string()),
            HalError::Parse(msg) => SalvageError::Parse(msg),
        }
    }
}

/// Uniform outcome of an orchestrated operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
    /// Set only by successful mounts.
    pub mount_point: Option<String>,
    pub failure: Option<FailureKind>,
}

impl OperationResult {
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            mount_point: None,
            failure: None,
        }
    }

    pub fn mounted(mount_point: impl Into<String>) -> Self {
        let mount_point = mount_point.into();
        Self {
            success: true,
            message: format!("mounted at {}", mount_point),
            mount_point: Some(mount_point),
            failure: None,
        }
    }

    /// The message always starts with the failure category.
    pub fn failed(err: &SalvageError) -> Self {
        let kind = err.kind();
        Self {
            success: false,
            message: format!("{}: {}", kind.label(), err),
            mount_point: None,
            failure: Some(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::ValidationReason;

    #[test]
    fn hal_errors_map_onto_failure_kinds() {
        let err: SalvageError = HalError::CommandNotFound("mkfs.exfat".into()).into();
        assert_eq!(err.kind(), FailureKind::ToolNotFound);
        assert!(err.to_string().contains("exfatprogs"));

        let err: SalvageError = HalError::CommandTimeout {
            program: "mount".into(),
            timeout_secs: 60,
        }
        .into();
        assert_eq!(err.kind(), FailureKind::Execution);

        let err: SalvageError = HalError::CommandFailed {
            program: "chmod".into(),
            code: Some(1),
            stderr: "Operation not permitted".into(),
        }
        .into();
        assert_eq!(err.kind(), FailureKind::Execution);
        assert!(err.to_string().contains("Operation not permitted"));
    }

    #[test]
    fn failed_result_names_category_and_subject() {
        let err = SalvageError::from(ValidationError::new(
            "/etc",
            ValidationReason::ProtectedDirectory,
        ));
        let result = OperationResult::failed(&err);
        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::Validation));
        assert!(result.message.starts_with("validation error: "));
        assert!(result.message.contains("protected system directory"));
        assert!(result.message.contains("/etc"));
    }

    #[test]
    fn mounted_result_carries_mount_point() {
        let result = OperationResult::mounted("/mnt/sdb1");
        assert!(result.success);
        assert_eq!(result.mount_point.as_deref(), Some("/mnt/sdb1"));
        assert_eq!(result.failure, None);
    }
}
