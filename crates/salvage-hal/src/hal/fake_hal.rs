//! Fake HAL implementation for testing.
//!
//! This implementation records all operations without executing them, and answers
//! commands from scripted responses so the orchestration and diagnostics layers can be
//! tested without root privileges or real hardware.

use super::{CommandOutput, FsOps, ProcessOps};
use crate::{HalError, HalResult};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Operation records for testing and verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Command {
        program: String,
        args: Vec<String>,
        timeout_secs: u64,
    },
    Spawn {
        program: String,
        args: Vec<String>,
    },
    Lookup {
        program: String,
    },
    CreateDir {
        path: PathBuf,
    },
}

impl Operation {
    /// True when this is a finished or detached run of `program` (lookups don't count).
    pub fn runs(&self, name: &str) -> bool {
        match self {
            Operation::Command { program, .. } | Operation::Spawn { program, .. } => {
                program == name
            }
            _ => false,
        }
    }

    pub fn args(&self) -> &[String] {
        match self {
            Operation::Command { args, .. } | Operation::Spawn { args, .. } => args,
            _ => &[],
        }
    }
}

/// Scripted reaction to a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeResponse {
    Output {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    NotFound,
    Timeout,
}

impl FakeResponse {
    /// Exit 0 with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        FakeResponse::Output {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn exit(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        FakeResponse::Output {
            code: Some(code),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct Scripted {
    program: String,
    args_prefix: Vec<String>,
    response: FakeResponse,
}

/// Shared state for FakeHal operations.
#[derive(Debug, Clone, Default)]
struct FakeHalState {
    /// All operations that were recorded
    operations: Vec<Operation>,
    responses: Vec<Scripted>,
    /// `None` means every program is installed.
    installed: Option<HashSet<String>>,
    existing_paths: HashSet<PathBuf>,
    mountinfo: String,
    failing_spawns: HashSet<String>,
}

/// Fake HAL implementation that records operations without executing them.
///
/// Unscripted commands succeed with empty output. When several scripted responses match
/// a command, the most recently registered one wins.
#[derive(Debug, Clone, Default)]
pub struct FakeHal {
    state: Arc<Mutex<FakeHalState>>,
}

impl FakeHal {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeHalState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Script the response for `program` invoked with arguments starting with `args_prefix`.
    pub fn respond(&self, program: &str, args_prefix: &[&str], response: FakeResponse) {
        self.lock().responses.push(Scripted {
            program: program.to_string(),
            args_prefix: args_prefix.iter().map(|s| s.to_string()).collect(),
            response,
        });
    }

    /// Restrict the set of programs that exist on the fake search path.
    pub fn set_installed(&self, programs: &[&str]) {
        self.lock().installed = Some(programs.iter().map(|s| s.to_string()).collect());
    }

    pub fn add_path(&self, path: impl Into<PathBuf>) {
        self.lock().existing_paths.insert(path.into());
    }

    pub fn set_mountinfo(&self, contents: impl Into<String>) {
        self.lock().mountinfo = contents.into();
    }

    /// Make detached launches of `program` fail immediately.
    pub fn fail_spawn(&self, program: &str) {
        self.lock().failing_spawns.insert(program.to_string());
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<Operation> {
        self.lock().operations.clone()
    }

    /// Get the number of operations recorded.
    pub fn operation_count(&self) -> usize {
        self.lock().operations.len()
    }

    /// Check if a specific operation was recorded.
    pub fn has_operation(&self, check: impl Fn(&Operation) -> bool) -> bool {
        self.lock().operations.iter().any(check)
    }

    /// Check whether `program` was ever run or launched.
    pub fn ran(&self, program: &str) -> bool {
        self.has_operation(|op| op.runs(program))
    }

    /// Clear all recorded operations. Scripted responses are kept.
    pub fn clear(&self) {
        self.lock().operations.clear();
    }

    fn record_operation(&self, op: Operation) {
        self.lock().operations.push(op);
    }

    fn is_installed(&self, program: &str) -> bool {
        match &self.lock().installed {
            Some(set) => set.contains(program),
            None => true,
        }
    }

    fn lookup_response(&self, program: &str, args: &[&str]) -> Option<FakeResponse> {
        self.lock()
            .responses
            .iter()
            .rev()
            .find(|s| {
                s.program == program
                    && s.args_prefix.len() <= args.len()
                    && s.args_prefix.iter().zip(args).all(|(a, b)| a == b)
            })
            .map(|s| s.response.clone())
    }
}

fn owned_args(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

impl ProcessOps for FakeHal {
    fn command_output(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> HalResult<CommandOutput> {
        self.record_operation(Operation::Command {
            program: program.to_string(),
            args: owned_args(args),
            timeout_secs: timeout.as_secs(),
        });
        if !self.is_installed(program) {
            return Err(HalError::CommandNotFound(program.to_string()));
        }
        match self.lookup_response(program, args) {
            Some(FakeResponse::Output {
                code,
                stdout,
                stderr,
            }) => Ok(CommandOutput {
                code,
                stdout,
                stderr,
            }),
            Some(FakeResponse::NotFound) => Err(HalError::CommandNotFound(program.to_string())),
            Some(FakeResponse::Timeout) => Err(HalError::CommandTimeout {
                program: program.to_string(),
                timeout_secs: timeout.as_secs(),
            }),
            None => Ok(CommandOutput {
                code: Some(0),
                ..CommandOutput::default()
            }),
        }
    }

    fn spawn_detached(&self, program: &str, args: &[&str]) -> HalResult<()> {
        self.record_operation(Operation::Spawn {
            program: program.to_string(),
            args: owned_args(args),
        });
        if !self.is_installed(program) {
            return Err(HalError::CommandNotFound(program.to_string()));
        }
        if self.lock().failing_spawns.contains(program) {
            return Err(HalError::CommandFailed {
                program: program.to_string(),
                code: Some(1),
                stderr: String::new(),
            });
        }
        Ok(())
    }

    fn find_program(&self, program: &str) -> Option<PathBuf> {
        self.record_operation(Operation::Lookup {
            program: program.to_string(),
        });
        self.is_installed(program)
            .then(|| PathBuf::from("/usr/bin").join(program))
    }
}

impl FsOps for FakeHal {
    fn path_exists(&self, path: &Path) -> bool {
        self.lock().existing_paths.contains(path)
    }

    fn create_dir_all(&self, path: &Path) -> HalResult<()> {
        self.record_operation(Operation::CreateDir {
            path: path.to_path_buf(),
        });
        self.lock().existing_paths.insert(path.to_path_buf());
        Ok(())
    }

    fn read_mountinfo(&self) -> HalResult<String> {
        Ok(self.lock().mountinfo.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_commands_in_order() {
        let hal = FakeHal::new();
        hal.command_output("lsblk", &["-J"], Duration::from_secs(10))
            .unwrap();
        hal.spawn_detached("xdg-open", &["/mnt/usb"]).unwrap();

        let ops = hal.operations();
        assert_eq!(ops.len(), 2);
        assert_eq!(
            ops[0],
            Operation::Command {
                program: "lsblk".into(),
                args: vec!["-J".into()],
                timeout_secs: 10,
            }
        );
        assert!(ops[1].runs("xdg-open"));
        assert_eq!(ops[1].args(), ["/mnt/usb".to_string()]);
    }

    #[test]
    fn latest_matching_response_wins() {
        let hal = FakeHal::new();
        hal.respond("smartctl", &[], FakeResponse::ok("generic"));
        hal.respond("smartctl", &["-a"], FakeResponse::ok("summary"));

        let out = hal
            .command_output("smartctl", &["-a", "/dev/sda"], Duration::from_secs(1))
            .unwrap();
        assert_eq!(out.stdout, "summary");
        let out = hal
            .command_output("smartctl", &["-x", "/dev/sda"], Duration::from_secs(1))
            .unwrap();
        assert_eq!(out.stdout, "generic");
    }

    #[test]
    fn uninstalled_program_is_not_found() {
        let hal = FakeHal::new();
        hal.set_installed(&["lsblk"]);
        assert!(hal.find_program("lsblk").is_some());
        assert!(hal.find_program("mkfs.refs").is_none());
        let err = hal
            .command_output("mkfs.refs", &[], Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, HalError::CommandNotFound(_)));
    }

    #[test]
    fn scripted_timeout_and_spawn_failure() {
        let hal = FakeHal::new();
        hal.respond("fsck", &[], FakeResponse::Timeout);
        hal.fail_spawn("nautilus");

        let err = hal
            .command_output("fsck", &["-n", "/dev/sdb1"], Duration::from_secs(300))
            .unwrap_err();
        assert!(matches!(err, HalError::CommandTimeout { timeout_secs: 300, .. }));
        assert!(hal.spawn_detached("nautilus", &["/mnt"]).is_err());
    }

    #[test]
    fn created_directories_exist_afterwards() {
        let hal = FakeHal::new();
        let dir = Path::new("/media/salvage/sdb1");
        assert!(!hal.path_exists(dir));
        hal.create_dir_all(dir).unwrap();
        assert!(hal.path_exists(dir));
        hal.clear();
        assert_eq!(hal.operation_count(), 0);
    }
}
