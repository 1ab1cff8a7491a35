//! Mount, format, permission and file-manager operations.
//!
//! Each operation runs `validate -> (lease) -> resolve tool -> execute` and stops at the
//! first failure. Nothing is retried and a failed format is not rolled back.

use crate::config::Config;
use crate::errors::{OperationResult, Result, SalvageError};
use crate::inventory::{is_system_mount, DeviceInventory};
use crate::locks::DeviceLocks;
use crate::validate::{normalize_fstype, validate, PathKind, ValidationError, ValidationReason};
use salvage_hal::procfs::mountinfo::{
    is_mounted_from_info, mount_points_of, mount_points_under_device, parse_mountinfo, MountEntry,
};
use salvage_hal::{device_name, SystemHal};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationRequest {
    Mount {
        device: String,
        mount_point: Option<String>,
    },
    Format {
        device: String,
        fstype: String,
    },
    SetPermissions {
        path: String,
    },
    OpenInManager {
        path: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

/// The formatting command for an allow-listed filesystem type.
pub fn format_command_spec(fstype: &str, device: &str) -> CommandSpec {
    let (program, flags): (String, &[&str]) = match fstype {
        "ntfs" => ("mkfs.ntfs".into(), &["-f"]),
        "ext2" | "ext3" | "ext4" => (format!("mkfs.{}", fstype), &["-F"]),
        "fat32" | "vfat" => ("mkfs.vfat".into(), &["-F", "32"]),
        other => (format!("mkfs.{}", other), &[]),
    };
    let mut args: Vec<String> = flags.iter().map(|s| s.to_string()).collect();
    args.push(device.to_string());
    CommandSpec { program, args }
}

/// `mount -t` driver for filesystems that need an explicit one.
fn mount_driver<'a>(fstype: &str, config: &'a Config) -> Option<&'a str> {
    match fstype {
        "ntfs" => Some(config.ntfs_driver.as_str()),
        "exfat" => Some("exfat"),
        _ => None,
    }
}

pub struct Orchestrator {
    hal: Arc<dyn SystemHal>,
    config: Config,
    inventory: DeviceInventory,
    locks: DeviceLocks,
}

impl Orchestrator {
    pub fn new(hal: Arc<dyn SystemHal>, config: Config) -> Self {
        let inventory = DeviceInventory::new(hal.clone(), config.clone());
        Self {
            hal,
            config,
            inventory,
            locks: DeviceLocks::new(),
        }
    }

    pub fn locks(&self) -> &DeviceLocks {
        &self.locks
    }

    pub fn inventory(&self) -> &DeviceInventory {
        &self.inventory
    }

    fn mount_table(&self) -> Result<Vec<MountEntry>> {
        let raw = self.hal.read_mountinfo()?;
        Ok(parse_mountinfo(&raw))
    }

    fn default_mount_point(&self, device: &str) -> String {
        let root = self.config.mount_root.trim_end_matches('/');
        format!("{}/{}", root, device_name(device))
    }

    /// Mount `device`, creating the mount point if needed. Returns the mount point.
    pub fn mount(&self, device: &str, mount_point: Option<&str>) -> Result<String> {
        validate(device, PathKind::Device)?;
        let _lease = self.locks.acquire(device)?;

        let mount_point = match mount_point {
            Some(mp) => mp.to_string(),
            None => self.default_mount_point(device),
        };
        validate(&mount_point, PathKind::MountPoint)?;
        let _target_lease = self.locks.acquire(&mount_point)?;

        let table = self.mount_table()?;
        if let Some(at) = mount_points_of(device, &table).first() {
            return Err(SalvageError::AlreadyMounted {
                device: device.to_string(),
                at: at.display().to_string(),
            });
        }
        if is_mounted_from_info(Path::new(&mount_point), &table) {
            return Err(SalvageError::Filesystem(format!(
                "{} is already a mount target",
                mount_point
            )));
        }

        let target = Path::new(&mount_point);
        if !self.hal.path_exists(target) {
            self.hal.create_dir_all(target).map_err(|e| {
                SalvageError::Filesystem(format!("cannot create {}: {}", mount_point, e))
            })?;
        }

        let fstype = self.inventory.filesystem_type(device)?;
        let mut args: Vec<&str> = Vec::new();
        if let Some(driver) = mount_driver(&fstype, &self.config) {
            args.extend(["-t", driver]);
        }
        args.extend([device, mount_point.as_str()]);

        log::info!("mounting {} ({}) at {}", device, fstype, mount_point);
        self.hal
            .command_status("mount", &args, self.config.timeouts.mount())?;
        Ok(mount_point)
    }

    /// Create a new `fstype` filesystem on `device`. Destroys existing data.
    pub fn format(&self, device: &str, fstype: &str) -> Result<()> {
        validate(device, PathKind::Device)?;
        let fstype = normalize_fstype(fstype)?;
        // Held across the mount check so nothing can mount the disk before mkfs runs.
        let _lease = self.locks.acquire(device)?;

        let table = self.mount_table()?;
        let mounts = mount_points_under_device(device, &table);
        if let Some(system) = mounts
            .iter()
            .find(|mp| is_system_mount(&mp.to_string_lossy()))
        {
            return Err(ValidationError::new(
                system.display().to_string(),
                ValidationReason::ProtectedDirectory,
            )
            .into());
        }
        if let Some(at) = mounts.first() {
            return Err(SalvageError::AlreadyMounted {
                device: device.to_string(),
                at: at.display().to_string(),
            });
        }

        let spec = format_command_spec(fstype, device);
        if self.hal.find_program(&spec.program).is_none() {
            return Err(SalvageError::tool_not_found(&spec.program));
        }

        log::warn!("formatting {} as {} ({})", device, fstype, spec.program);
        let args: Vec<&str> = spec.args.iter().map(String::as_str).collect();
        self.hal
            .command_status(&spec.program, &args, self.config.timeouts.format())?;
        log::info!("formatted {} as {}", device, fstype);
        Ok(())
    }

    /// Recursively open up `path` to everyone (`chmod -R 777`).
    pub fn set_permissions(&self, path: &str) -> Result<()> {
        validate(path, PathKind::MountPoint)?;
        if !self.hal.path_exists(Path::new(path)) {
            return Err(SalvageError::NotFound {
                path: path.to_string(),
            });
        }
        let _lease = self.locks.acquire(path)?;
        log::info!("setting permissions 777 on {}", path);
        self.hal
            .command_status("chmod", &["-R", "777", path], self.config.timeouts.chmod())?;
        Ok(())
    }

    /// Open `path` in the first file manager that launches. Returns its config entry.
    pub fn open_in_manager(&self, path: &str) -> Result<String> {
        validate(path, PathKind::Directory)?;
        if !self.hal.path_exists(Path::new(path)) {
            return Err(SalvageError::NotFound {
                path: path.to_string(),
            });
        }

        let candidates = self.config.file_manager_candidates();
        let mut failures: Vec<(String, String)> = Vec::new();
        let launched = candidates
            .iter()
            .filter_map(|entry| {
                let mut words = entry.split_whitespace();
                let program = words.next()?;
                Some((entry, program, words.collect::<Vec<_>>()))
            })
            .filter(|(_, program, _)| self.hal.find_program(program).is_some())
            .find_map(|(entry, program, mut args)| {
                args.push(path);
                match self.hal.spawn_detached(program, &args) {
                    Ok(()) => Some(entry.clone()),
                    Err(e) => {
                        log::warn!("{} failed to open {}: {}", entry, path, e);
                        failures.push((entry.clone(), e.to_string()));
                        None
                    }
                }
            });

        if let Some(entry) = launched {
            log::info!("opened {} with {}", path, entry);
            return Ok(entry);
        }
        match failures.pop() {
            Some((program, detail)) => Err(SalvageError::Execution {
                program,
                code: None,
                detail,
            }),
            None => Err(SalvageError::ToolNotFound {
                tool: "file manager".to_string(),
                hint: format!(" (tried: {})", candidates.join(", ")),
            }),
        }
    }

    pub fn execute(&self, request: OperationRequest) -> OperationResult {
        let outcome = match &request {
            OperationRequest::Mount {
                device,
                mount_point,
            } => self
                .mount(device, mount_point.as_deref())
                .map(OperationResult::mounted),
            OperationRequest::Format { device, fstype } => self
                .format(device, fstype)
                .map(|()| OperationResult::succeeded(format!("formatted {} as {}", device, fstype))),
            OperationRequest::SetPermissions { path } => self
                .set_permissions(path)
                .map(|()| OperationResult::succeeded(format!("permissions set on {}", path))),
            OperationRequest::OpenInManager { path } => self
                .open_in_manager(path)
                .map(|entry| OperationResult::succeeded(format!("opened {} with {}", path, entry))),
        };
        outcome.unwrap_or_else(|err| {
            log::error!("{:?} failed: {}", request, err);
            OperationResult::failed(&err)
        })
    }
}
