//! HAL trait definitions and implementations.
//!
//! This module defines the traits the core uses to reach the host and provides
//! both real (LinuxHal) and fake (FakeHal) implementations.

pub mod fake_hal;
pub mod fs_ops;
pub mod linux_hal;
pub mod process_ops;

pub use fake_hal::{FakeHal, FakeResponse, Operation};
pub use fs_ops::FsOps;
pub use linux_hal::LinuxHal;
pub use process_ops::{CommandOutput, ProcessOps};

/// Complete HAL combining all host operation traits.
pub trait SystemHal: ProcessOps + FsOps + Send + Sync {}

/// Automatically implement SystemHal for any type implementing all required traits.
impl<T> SystemHal for T where T: ProcessOps + FsOps + Send + Sync {}
