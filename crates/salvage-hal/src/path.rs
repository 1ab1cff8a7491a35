//! Block device naming helpers. Handles nvme/mmcblk `p` postfixing.

/// Kernel name families whose whole-disk names already end in a digit, so their
/// partitions are separated by a `p` (`nvme0n1p3`, `mmcblk0p1`, `md0p1`).
const P_SEPARATED_PREFIXES: &[&str] = &["nvme", "mmcblk", "loop", "md", "nbd"];

/// Devices whose trailing digits are an instance number, never a partition.
const WHOLE_DEVICE_PREFIXES: &[&str] = &["sr", "zram", "ram"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceClass {
    Disk,
    Partition { parent: String, number: u32 },
}

/// Final path component of a device path (`/dev/sda1` -> `sda1`).
pub fn device_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Classify a kernel device name as a whole disk or a partition of a parent disk.
///
/// The generic rule is "a trailing run of digits marks a partition" (`sdb2` -> `sdb`).
/// nvme/mmcblk/loop/md names are matched on their `p<N>` suffix instead, so `nvme0n1`
/// stays a disk and `nvme0n1p3` resolves to `nvme0n1`. Optical drives and ram disks
/// (`sr0`, `zram0`) are always whole devices.
pub fn classify_device_name(name: &str) -> DeviceClass {
    if has_prefix(name, WHOLE_DEVICE_PREFIXES) {
        return DeviceClass::Disk;
    }
    if has_prefix(name, P_SEPARATED_PREFIXES) {
        return classify_p_separated(name);
    }

    let stem = name.trim_end_matches(|c: char| c.is_ascii_digit());
    if stem.is_empty() || stem.len() == name.len() {
        return DeviceClass::Disk;
    }
    match name[stem.len()..].parse::<u32>() {
        Ok(number) => DeviceClass::Partition {
            parent: stem.to_string(),
            number,
        },
        Err(_) => DeviceClass::Disk,
    }
}

fn classify_p_separated(name: &str) -> DeviceClass {
    let Some(idx) = name.rfind('p') else {
        return DeviceClass::Disk;
    };
    let (stem, suffix) = (&name[..idx], &name[idx + 1..]);
    let stem_ends_in_digit = stem.chars().last().is_some_and(|c| c.is_ascii_digit());
    if !stem_ends_in_digit || suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_digit()) {
        return DeviceClass::Disk;
    }
    match suffix.parse::<u32>() {
        Ok(number) => DeviceClass::Partition {
            parent: stem.to_string(),
            number,
        },
        Err(_) => DeviceClass::Disk,
    }
}

fn has_prefix(name: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|prefix| name.starts_with(prefix))
}
