//! Runtime configuration.
//!
//! Loaded read-only from TOML; every field has a default so an empty (or missing) file
//! yields a working setup.

use crate::errors::{Result, SalvageError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_FILE_MANAGERS: &[&str] = &[
    "xdg-open",
    "pcmanfm",
    "nautilus",
    "thunar",
    "dolphin",
    "nemo",
    "caja",
    "dbus-launch pcmanfm",
    "dbus-launch nautilus",
];

/// Per-tool process timeouts, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub probe_secs: u64,
    pub mount_secs: u64,
    pub format_secs: u64,
    pub chmod_secs: u64,
    pub smart_secs: u64,
    pub fsck_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            probe_secs: 10,
            mount_secs: 60,
            format_secs: 600,
            chmod_secs: 600,
            smart_secs: 60,
            fsck_secs: 300,
        }
    }
}

impl Timeouts {
    /// `lsblk` / `blkid`
    pub fn probe(&self) -> Duration {
        Duration::from_secs(self.probe_secs)
    }

    pub fn mount(&self) -> Duration {
        Duration::from_secs(self.mount_secs)
    }

    pub fn format(&self) -> Duration {
        Duration::from_secs(self.format_secs)
    }

    pub fn chmod(&self) -> Duration {
        Duration::from_secs(self.chmod_secs)
    }

    pub fn smart(&self) -> Duration {
        Duration::from_secs(self.smart_secs)
    }

    pub fn fsck(&self) -> Duration {
        Duration::from_secs(self.fsck_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `"auto"` walks `file_managers`; anything else is the only launcher tried.
    pub file_manager: String,
    pub file_managers: Vec<String>,
    pub default_format: String,
    /// Parent directory for mount points that were not given explicitly.
    pub mount_root: String,
    pub ntfs_driver: String,
    pub hide_system_mounts: bool,
    pub timeouts: Timeouts,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            file_manager: "auto".to_string(),
            file_managers: DEFAULT_FILE_MANAGERS.iter().map(|s| s.to_string()).collect(),
            default_format: "exfat".to_string(),
            mount_root: "/mnt".to_string(),
            ntfs_driver: "ntfs-3g".to_string(),
            hide_system_mounts: true,
            timeouts: Timeouts::default(),
        }
    }
}

impl Config {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| SalvageError::Parse(format!("config: {}", e)))
    }

    /// Read `path`; a missing file means defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(SalvageError::Filesystem(format!(
                "cannot read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// `$XDG_CONFIG_HOME/salvage/config.toml`, falling back to `~/.config`.
    pub fn default_path() -> Option<PathBuf> {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
        Some(base.join("salvage").join("config.toml"))
    }

    /// Launchers to try, in order.
    pub fn file_manager_candidates(&self) -> Vec<String> {
        if self.file_manager.is_empty() || self.file_manager == "auto" {
            self.file_managers.clone()
        } else {
            vec![self.file_manager.clone()]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_config_is_default() {
        let cfg = Config::from_toml_str("").unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.default_format, "exfat");
        assert_eq!(cfg.ntfs_driver, "ntfs-3g");
        assert_eq!(cfg.file_managers[0], "xdg-open");
        assert_eq!(cfg.file_managers.len(), 9);
        assert_eq!(cfg.timeouts.format(), Duration::from_secs(600));
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let cfg = Config::from_toml_str(
            r#"
mount_root = "/media/salvage"
ntfs_driver = "ntfs3"

[timeouts]
smart_secs = 120
"#,
        )
        .unwrap();
        assert_eq!(cfg.mount_root, "/media/salvage");
        assert_eq!(cfg.ntfs_driver, "ntfs3");
        assert_eq!(cfg.timeouts.smart_secs, 120);
        assert_eq!(cfg.timeouts.fsck_secs, 300);
        assert!(cfg.hide_system_mounts);
    }

    #[test]
    fn malformed_config_is_a_parse_error() {
        let err = Config::from_toml_str("hide_system_mounts = \"maybe\"").unwrap_err();
        assert!(matches!(err, SalvageError::Parse(_)));
    }

    #[test]
    fn load_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let cfg = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg, Config::default());

        let path = dir.path().join("config.toml");
        std::fs::write(&path, "file_manager = \"thunar\"\n").unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.file_manager_candidates(), vec!["thunar".to_string()]);
    }
}
