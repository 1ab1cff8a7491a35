//! Block device inventory built from `lsblk` and `blkid`.
//!
//! Descriptors are produced fresh on every query; nothing is cached.

use crate::config::Config;
use crate::errors::{Result, SalvageError};
use crate::validate::{is_protected_directory, validate, PathKind};
use salvage_hal::SystemHal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const LSBLK_COLUMNS: &str = "NAME,SIZE,TYPE,FSTYPE,MOUNTPOINT,MODEL,SERIAL,UUID,LABEL";

/// udisks mounts removable media here; it is user data even though `/run` is protected.
const REMOVABLE_MEDIA_ROOT: &str = "/run/media/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Disk,
    Partition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub name: String,
    pub path: String,
    /// Human-readable, as reported by lsblk (`"931.5G"`).
    pub size: String,
    pub kind: DeviceKind,
    pub fstype: Option<String>,
    pub mount_point: Option<String>,
    pub model: Option<String>,
    pub serial: Option<String>,
    pub uuid: Option<String>,
    pub label: Option<String>,
}

impl DeviceDescriptor {
    pub fn is_mounted(&self) -> bool {
        self.mount_point.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct LsblkOutput {
    #[serde(default)]
    blockdevices: Vec<LsblkDevice>,
}

#[derive(Debug, Deserialize)]
struct LsblkDevice {
    name: String,
    #[serde(default)]
    size: Option<serde_json::Value>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    fstype: Option<String>,
    #[serde(default)]
    mountpoint: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    serial: Option<String>,
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    children: Vec<LsblkDevice>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn size_text(value: Option<serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn flatten(devices: Vec<LsblkDevice>, out: &mut Vec<DeviceDescriptor>) {
    for mut dev in devices {
        let children = std::mem::take(&mut dev.children);
        let kind = match dev.kind.as_deref() {
            Some("disk") => Some(DeviceKind::Disk),
            Some("part") => Some(DeviceKind::Partition),
            _ => None,
        };
        let path = format!("/dev/{}", dev.name);
        let name_ok = !dev.name.is_empty() && dev.name.chars().all(|c| c.is_ascii_alphanumeric());
        match kind {
            Some(kind) if name_ok => out.push(DeviceDescriptor {
                name: dev.name,
                path,
                size: size_text(dev.size),
                kind,
                fstype: non_empty(dev.fstype),
                mount_point: non_empty(dev.mountpoint),
                model: non_empty(dev.model),
                serial: non_empty(dev.serial),
                uuid: non_empty(dev.uuid),
                label: non_empty(dev.label),
            }),
            Some(_) => log::warn!("skipping device with unexpected name {:?}", dev.name),
            None => {}
        }
        flatten(children, out);
    }
}

/// Parse `lsblk -J` output into a flat list of disks and partitions.
pub fn parse_lsblk(json: &str) -> Result<Vec<DeviceDescriptor>> {
    let parsed: LsblkOutput =
        serde_json::from_str(json).map_err(|e| SalvageError::Parse(format!("lsblk: {}", e)))?;
    let mut out = Vec::new();
    flatten(parsed.blockdevices, &mut out);
    Ok(out)
}

/// Extract `TYPE` from `blkid -o export` output.
pub fn parse_blkid_type(output: &str) -> Option<String> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("TYPE="))
        .map(|value| value.trim().trim_matches('"').to_string())
        .find(|value| !value.is_empty())
}

/// Mounts that belong to the running system rather than to a salvaged disk.
pub fn is_system_mount(mount_point: &str) -> bool {
    if mount_point == "[SWAP]" || mount_point == "/home" {
        return true;
    }
    if mount_point.starts_with(REMOVABLE_MEDIA_ROOT) {
        return false;
    }
    is_protected_directory(mount_point)
}

pub struct DeviceInventory {
    hal: Arc<dyn SystemHal>,
    config: Config,
}

impl DeviceInventory {
    pub fn new(hal: Arc<dyn SystemHal>, config: Config) -> Self {
        Self { hal, config }
    }

    fn run_lsblk(&self, device: Option<&str>) -> Result<Vec<DeviceDescriptor>> {
        let mut args = vec!["-J", "-o", LSBLK_COLUMNS];
        if let Some(device) = device {
            args.push(device);
        }
        let output = self
            .hal
            .command_output("lsblk", &args, self.config.timeouts.probe())?;
        if !output.success() {
            return Err(SalvageError::Execution {
                program: "lsblk".to_string(),
                code: output.code,
                detail: output.stderr.trim().to_string(),
            });
        }
        parse_lsblk(&output.stdout)
    }

    pub fn list_all(&self) -> Result<Vec<DeviceDescriptor>> {
        self.run_lsblk(None)
    }

    pub fn list_unmounted(&self) -> Result<Vec<DeviceDescriptor>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|d| !d.is_mounted())
            .collect())
    }

    pub fn list_mounted(&self) -> Result<Vec<DeviceDescriptor>> {
        let hide = self.config.hide_system_mounts;
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|d| match &d.mount_point {
                Some(mp) => !(hide && is_system_mount(mp)),
                None => false,
            })
            .collect())
    }

    /// Basic information about a single device.
    pub fn describe(&self, device: &str) -> Result<DeviceDescriptor> {
        validate(device, PathKind::Device)?;
        self.run_lsblk(Some(device))?
            .into_iter()
            .find(|d| d.path == device)
            .ok_or_else(|| SalvageError::NotFound {
                path: device.to_string(),
            })
    }

    pub fn filesystem_type(&self, device: &str) -> Result<String> {
        validate(device, PathKind::Device)?;
        let output = self.hal.command_output(
            "blkid",
            &["-o", "export", device],
            self.config.timeouts.probe(),
        )?;
        // blkid exits 2 when it finds nothing to identify.
        if output.code == Some(2) {
            return Err(SalvageError::NoFilesystem {
                device: device.to_string(),
            });
        }
        if !output.success() {
            return Err(SalvageError::Execution {
                program: "blkid".to_string(),
                code: output.code,
                detail: output.stderr.trim().to_string(),
            });
        }
        parse_blkid_type(&output.stdout).ok_or_else(|| SalvageError::NoFilesystem {
            device: device.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use salvage_hal::{FakeHal, FakeResponse};

    const SAMPLE: &str = r#"{
   "blockdevices": [
      {"name":"sda", "size":"931.5G", "type":"disk", "fstype":null, "mountpoint":null,
       "model":"WDC WD10EZEX ", "serial":"WD-123", "uuid":null, "label":null,
         "children": [
            {"name":"sda1", "size":"512M", "type":"part", "fstype":"vfat", "mountpoint":"/boot/efi", "uuid":"A1B2"},
            {"name":"sda2", "size":"931G", "type":"part", "fstype":"ext4", "mountpoint":"/"}
         ]
      },
      {"name":"sdb", "size":"14.9G", "type":"disk", "fstype":null, "mountpoint":null,
         "children": [
            {"name":"sdb1", "size":"14.9G", "type":"part", "fstype":"exfat", "mountpoint":null, "label":"USB"}
         ]
      },
      {"name":"sr0", "size":"1024M", "type":"rom", "fstype":null, "mountpoint":null}
   ]
}"#;

    #[test]
    fn parse_flattens_disks_and_partitions() {
        let devices = parse_lsblk(SAMPLE).unwrap();
        let paths: Vec<&str> = devices.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, ["/dev/sda", "/dev/sda1", "/dev/sda2", "/dev/sdb", "/dev/sdb1"]);
        assert_eq!(devices[0].model.as_deref(), Some("WDC WD10EZEX"));
        assert_eq!(devices[1].kind, DeviceKind::Partition);
        assert_eq!(devices[4].label.as_deref(), Some("USB"));
        assert_eq!(devices[4].mount_point, None);
    }

    #[test]
    fn parse_skips_names_outside_the_device_grammar() {
        let json = r#"{"blockdevices":[
            {"name":"sdc", "size":"1G", "type":"disk", "children":[
                {"name":"sdc1;x", "size":"1G", "type":"part"}
            ]}
        ]}"#;
        let devices = parse_lsblk(json).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].path, "/dev/sdc");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(parse_lsblk("not json"), Err(SalvageError::Parse(_))));
        assert!(parse_lsblk(r#"{"blockdevices":[]}"#).unwrap().is_empty());
    }

    #[test]
    fn numeric_sizes_are_kept() {
        let json = r#"{"blockdevices":[{"name":"sdd","size":1000204886016,"type":"disk"}]}"#;
        assert_eq!(parse_lsblk(json).unwrap()[0].size, "1000204886016");
    }

    #[test]
    fn blkid_type_is_not_confused_with_pttype() {
        let out = "DEVNAME=/dev/sdb1\nPTTYPE=\"dos\"\nSEC_TYPE=msdos\nTYPE=\"vfat\"\n";
        assert_eq!(parse_blkid_type(out).as_deref(), Some("vfat"));
        assert_eq!(parse_blkid_type("TYPE=ntfs\n").as_deref(), Some("ntfs"));
        assert_eq!(parse_blkid_type("PTTYPE=gpt\n"), None);
    }

    #[test]
    fn system_mounts() {
        for mp in ["/", "/boot/efi", "/home", "[SWAP]", "/var/lib/docker", "/run/user/1000"] {
            assert!(is_system_mount(mp), "{mp}");
        }
        for mp in ["/mnt/sdb1", "/media/usb", "/run/media/alice/USB", "/home/alice/disk"] {
            assert!(!is_system_mount(mp), "{mp}");
        }
    }

    fn inventory(hal: &FakeHal, config: Config) -> DeviceInventory {
        DeviceInventory::new(Arc::new(hal.clone()), config)
    }

    #[test]
    fn mounted_and_unmounted_views() {
        let hal = FakeHal::new();
        hal.respond("lsblk", &[], FakeResponse::ok(SAMPLE));

        let inv = inventory(&hal, Config::default());
        let unmounted: Vec<String> = inv.list_unmounted().unwrap().into_iter().map(|d| d.path).collect();
        assert_eq!(unmounted, ["/dev/sda", "/dev/sdb", "/dev/sdb1"]);
        assert!(inv.list_mounted().unwrap().is_empty());

        let config = Config {
            hide_system_mounts: false,
            ..Config::default()
        };
        let inv = inventory(&hal, config);
        assert_eq!(inv.list_mounted().unwrap().len(), 2);
    }

    #[test]
    fn filesystem_type_handles_blank_devices() {
        let hal = FakeHal::new();
        hal.respond("blkid", &[], FakeResponse::exit(2, "", ""));
        let inv = inventory(&hal, Config::default());
        let err = inv.filesystem_type("/dev/sdb1").unwrap_err();
        assert!(matches!(err, SalvageError::NoFilesystem { .. }));

        hal.respond("blkid", &[], FakeResponse::ok("TYPE=\"ntfs\"\n"));
        assert_eq!(inv.filesystem_type("/dev/sdb1").unwrap(), "ntfs");
        assert!(hal.has_operation(|op| op.args() == ["-o", "export", "/dev/sdb1"]));
    }

    #[test]
    fn describe_runs_lsblk_for_the_device() {
        let hal = FakeHal::new();
        hal.respond("lsblk", &[], FakeResponse::ok(SAMPLE));
        let inv = inventory(&hal, Config::default());
        let desc = inv.describe("/dev/sdb1").unwrap();
        assert_eq!(desc.fstype.as_deref(), Some("exfat"));
        assert!(hal.has_operation(|op| op.args().last().map(String::as_str) == Some("/dev/sdb1")));
        assert!(matches!(
            inv.describe("/dev/sdz").unwrap_err(),
            SalvageError::NotFound { .. }
        ));
    }

    #[test]
    fn missing_lsblk_is_tool_not_found() {
        let hal = FakeHal::new();
        hal.set_installed(&[]);
        let inv = inventory(&hal, Config::default());
        let err = inv.list_all().unwrap_err();
        assert_eq!(err.kind(), crate::errors::FailureKind::ToolNotFound);
    }
}
