//! Parsing helpers for `/proc/self/mountinfo`.

use crate::path::{classify_device_name, device_name, DeviceClass};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub mount_point: PathBuf,
    pub fstype: String,
    pub source: String,
}

pub fn parse_mountinfo(content: &str) -> Vec<MountEntry> {
    content
        .lines()
        .filter_map(|line| {
            // <id> <parent> <maj:min> <root> <mount point> <opts...> - <fstype> <source> <superopts>
            let (pre, post) = line.split_once(" - ")?;
            let pre_fields: Vec<&str> = pre.split_whitespace().collect();
            if pre_fields.len() < 5 {
                return None;
            }
            let mut post_fields = post.split_whitespace();
            let fstype = post_fields.next()?.to_string();
            let source = post_fields.next()?.to_string();
            Some(MountEntry {
                mount_point: PathBuf::from(unescape_mount_path(pre_fields[4])),
                fstype,
                source,
            })
        })
        .collect()
}

/// True when `path` is itself a mount target.
pub fn is_mounted_from_info(path: &Path, entries: &[MountEntry]) -> bool {
    let target = normalize_path(path);
    entries
        .iter()
        .any(|entry| normalize_path(&entry.mount_point) == target)
}

/// Mount points whose source is exactly `device`.
pub fn mount_points_of(device: &str, entries: &[MountEntry]) -> Vec<PathBuf> {
    let mut mounts: Vec<PathBuf> = entries
        .iter()
        .filter(|entry| entry.source == device)
        .map(|entry| entry.mount_point.clone())
        .collect();
    mounts.sort();
    mounts.dedup();
    mounts
}

/// Mount points backed by `device` or by any partition of it.
///
/// Unlike a plain prefix match, `/dev/sda1` does not claim `/dev/sda10`, and `/dev/sd`
/// does not claim `/dev/sda`.
pub fn mount_points_under_device(device: &str, entries: &[MountEntry]) -> Vec<PathBuf> {
    let disk_name = device_name(device);
    let dir = &device[..device.len() - disk_name.len()];
    let mut mounts: Vec<PathBuf> = entries
        .iter()
        .filter(|entry| {
            if entry.source == device {
                return true;
            }
            let Some(name) = entry.source.strip_prefix(dir) else {
                return false;
            };
            matches!(
                classify_device_name(name),
                DeviceClass::Partition { ref parent, .. } if parent == disk_name
            )
        })
        .map(|entry| entry.mount_point.clone())
        .collect();
    mounts.sort();
    mounts.dedup();
    mounts
}

pub fn unescape_mount_path(raw: &str) -> String {
    raw.replace("\\040", " ")
        .replace("\\011", "\t")
        .replace("\\012", "\n")
        .replace("\\134", "\\")
}

fn normalize_path(path: &Path) -> String {
    let s = path.to_string_lossy();
    if s.len() > 1 && s.ends_with('/') {
        s.trim_end_matches('/').to_string()
    } else {
        s.to_string()
    }
}
