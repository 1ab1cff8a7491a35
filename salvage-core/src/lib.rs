//! salvage core library.
//!
//! `salvage-core` validates device paths, inventories block devices, orchestrates
//! mount/format/permission/file-manager operations and turns `smartctl`/fsck output into
//! a health report. Every external process is launched through [`salvage_hal`].

pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod health;
pub mod inventory;
pub mod locks;
pub mod logging;
pub mod orchestrator;
pub mod report;
pub mod validate;

pub use config::{Config, Timeouts};
pub use diagnostics::{DiagnosticsEngine, FilesystemCheck, FsckOutcome, SmartAttribute, SmartReport};
pub use errors::{FailureKind, OperationResult, Result, SalvageError};
pub use health::{score, HealthAssessment, HealthStatus};
pub use inventory::{DeviceDescriptor, DeviceInventory, DeviceKind};
pub use locks::{DeviceLease, DeviceLocks};
pub use orchestrator::{OperationRequest, Orchestrator};
pub use report::{write_report, DeviceReport};
pub use validate::{is_protected_directory, validate, PathKind, ValidationError, ValidationReason};
