//! salvage hardware/host abstraction layer.
//!
//! Everything that touches the outside world (spawning `lsblk`, `mount`, `mkfs.*`,
//! `smartctl`, reading `/proc/self/mountinfo`) goes through the traits defined here so
//! the orchestration and diagnostics layers can be exercised against [`FakeHal`].

pub mod error;
pub mod hal;
pub mod path;
pub mod procfs;

pub use error::{HalError, HalResult};
pub use hal::{
    CommandOutput, FakeHal, FakeResponse, FsOps, LinuxHal, Operation, ProcessOps, SystemHal,
};
pub use path::{classify_device_name, device_name, DeviceClass};
