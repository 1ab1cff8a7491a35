//! Device operation guard.
//!
//! Every path that ends up as an argument to an external tool passes through
//! [`validate`] first. Nothing here ever reaches a shell; the checks exist so that a
//! hostile or mistyped path cannot end up targeting the running system.

use thiserror::Error;

/// Directories (and everything below them) that operations must never target.
/// `/` protects only itself.
pub const PROTECTED_DIRECTORIES: &[&str] = &[
    "/", "/boot", "/etc", "/usr", "/var", "/bin", "/sbin", "/lib", "/lib64", "/opt", "/root",
    "/proc", "/sys", "/dev", "/run",
];

/// Filesystem types accepted by `format`, lower-case.
pub const ALLOWED_FILESYSTEMS: &[&str] =
    &["ntfs", "exfat", "ext4", "ext3", "ext2", "fat32", "vfat", "refs"];

const SHELL_METACHARACTERS: &[char] = &[
    ';', '&', '|', '`', '$', '(', ')', '<', '>', '!', '?', '*',
];

/// `^/dev/[A-Za-z0-9]+$`
fn is_device_node(path: &str) -> bool {
    path.strip_prefix("/dev/")
        .is_some_and(|name| !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric()))
}

/// `^/[A-Za-z0-9/_-]*$`
fn is_plain_absolute(path: &str) -> bool {
    path.starts_with('/')
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '-'))
}

/// `^[A-Za-z0-9/_.-]+$`
fn is_plain_log_path(path: &str) -> bool {
    path.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '.' | '-'))
}

/// What a path is about to be used as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// A block device node such as `/dev/sdb1`.
    Device,
    /// A directory that will be mounted on or modified.
    MountPoint,
    /// A directory that will only be browsed.
    Directory,
    /// Where log files are written; may be relative.
    Log,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationReason {
    #[error("empty path")]
    EmptyPath,
    #[error("path traversal")]
    PathTraversal,
    #[error("shell metacharacter")]
    ShellMetacharacter,
    #[error("invalid device path")]
    InvalidDevicePath,
    #[error("invalid mount point")]
    InvalidMountPoint,
    #[error("invalid directory")]
    InvalidDirectory,
    #[error("invalid log directory")]
    InvalidLogDirectory,
    #[error("protected system directory")]
    ProtectedDirectory,
    #[error("unsupported filesystem type")]
    UnsupportedFilesystem,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}: {subject:?}")]
pub struct ValidationError {
    /// The offending value, verbatim.
    pub subject: String,
    pub reason: ValidationReason,
}

impl ValidationError {
    pub fn new(subject: impl Into<String>, reason: ValidationReason) -> Self {
        Self {
            subject: subject.into(),
            reason,
        }
    }
}

/// True when `path` is a protected directory or nested below one.
pub fn is_protected_directory(path: &str) -> bool {
    let trimmed = if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    };
    PROTECTED_DIRECTORIES.iter().any(|dir| {
        if *dir == "/" {
            return trimmed == "/";
        }
        trimmed == *dir || trimmed.starts_with(&format!("{}/", dir))
    })
}

pub fn validate(path: &str, kind: PathKind) -> Result<(), ValidationError> {
    let fail = |reason| Err(ValidationError::new(path, reason));

    if path.is_empty() {
        return fail(ValidationReason::EmptyPath);
    }
    if path.contains("..") {
        return fail(ValidationReason::PathTraversal);
    }
    if path
        .chars()
        .any(|c| SHELL_METACHARACTERS.contains(&c) || c.is_control())
    {
        return fail(ValidationReason::ShellMetacharacter);
    }
    if path.contains("//") {
        return fail(invalid_for(kind));
    }

    match kind {
        PathKind::Device => {
            if is_device_node(path) {
                Ok(())
            } else if !path.starts_with("/dev/") && is_protected_directory(path) {
                // `/etc` handed over as a device is a system directory, not a typo.
                fail(ValidationReason::ProtectedDirectory)
            } else {
                fail(ValidationReason::InvalidDevicePath)
            }
        }
        PathKind::MountPoint => {
            if !is_plain_absolute(path) {
                return fail(ValidationReason::InvalidMountPoint);
            }
            if is_protected_directory(path) {
                return fail(ValidationReason::ProtectedDirectory);
            }
            Ok(())
        }
        PathKind::Directory => {
            if is_plain_absolute(path) {
                Ok(())
            } else {
                fail(ValidationReason::InvalidDirectory)
            }
        }
        PathKind::Log => {
            if is_plain_log_path(path) {
                Ok(())
            } else {
                fail(ValidationReason::InvalidLogDirectory)
            }
        }
    }
}

fn invalid_for(kind: PathKind) -> ValidationReason {
    match kind {
        PathKind::Device => ValidationReason::InvalidDevicePath,
        PathKind::MountPoint => ValidationReason::InvalidMountPoint,
        PathKind::Directory => ValidationReason::InvalidDirectory,
        PathKind::Log => ValidationReason::InvalidLogDirectory,
    }
}

/// Check `fstype` against the allow-list, ignoring case. Returns the canonical name.
pub fn normalize_fstype(fstype: &str) -> Result<&'static str, ValidationError> {
    let lowered = fstype.trim().to_ascii_lowercase();
    ALLOWED_FILESYSTEMS
        .iter()
        .copied()
        .find(|allowed| *allowed == lowered)
        .ok_or_else(|| ValidationError::new(fstype, ValidationReason::UnsupportedFilesystem))
}
