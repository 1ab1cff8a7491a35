//! Linux HAL implementation running real processes.

use super::{CommandOutput, FsOps, ProcessOps};
use crate::{HalError, HalResult};
use std::fs;
use std::io::Read;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Admin tools (`mkfs.*`, `blkid`, `smartctl`) usually live in sbin, which is often
/// missing from an unprivileged user's PATH.
const EXTRA_SEARCH_DIRS: &str = "/usr/local/sbin:/usr/sbin:/sbin";

/// How long a launched GUI program is watched for an immediate failure.
const LAUNCH_GRACE: Duration = Duration::from_millis(300);

const MOUNTINFO_PATH: &str = "/proc/self/mountinfo";

/// Real HAL implementation for Linux systems.
#[derive(Debug, Clone)]
pub struct LinuxHal {
    path_env: String,
}

impl Default for LinuxHal {
    fn default() -> Self {
        Self::new()
    }
}

impl LinuxHal {
    pub fn new() -> Self {
        let path_env = std::env::var("PATH").unwrap_or_default();
        Self::with_search_path(format!("{}:{}", path_env, EXTRA_SEARCH_DIRS))
    }

    /// Use an explicit colon-separated search path instead of `$PATH`.
    pub fn with_search_path(path_env: impl Into<String>) -> Self {
        Self {
            path_env: path_env.into(),
        }
    }
}

fn map_command_err(program: &str, err: std::io::Error) -> HalError {
    if err.kind() == std::io::ErrorKind::NotFound {
        return HalError::CommandNotFound(program.to_string());
    }
    HalError::SpawnFailed {
        program: program.to_string(),
        reason: err.to_string(),
    }
}

fn output_with_timeout(program: &str, cmd: &mut Command, timeout: Duration) -> HalResult<CommandOutput> {
    // Never let a tool sit waiting on a prompt (mkfs asks "Proceed anyway?").
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd.spawn().map_err(|e| map_command_err(program, e))?;

    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();

    // Drain pipes concurrently to avoid deadlocks on large output (smartctl -x).
    let stdout_handle = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout.take() {
            let _ = out.read_to_end(&mut buf);
        }
        buf
    });
    let stderr_handle = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr.take() {
            let _ = err.read_to_end(&mut buf);
        }
        buf
    });

    let status = match child.wait_timeout(timeout).map_err(HalError::Io)? {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            let _ = stdout_handle.join();
            let _ = stderr_handle.join();
            return Err(HalError::CommandTimeout {
                program: program.to_string(),
                timeout_secs: timeout.as_secs(),
            });
        }
    };

    let stdout = stdout_handle.join().unwrap_or_default();
    let stderr = stderr_handle.join().unwrap_or_default();
    Ok(CommandOutput {
        code: status.code(),
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    })
}

fn find_executable_in_path(binary: &str, path_env: &str) -> Option<PathBuf> {
    if binary.contains('/') {
        let candidate = PathBuf::from(binary);
        return is_executable(&candidate).then_some(candidate);
    }
    path_env
        .split(':')
        .filter(|dir| !dir.is_empty())
        .map(|dir| Path::new(dir).join(binary))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

impl ProcessOps for LinuxHal {
    fn command_output(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> HalResult<CommandOutput> {
        log::debug!("exec: {} {:?}", program, args);
        let resolved = find_executable_in_path(program, &self.path_env)
            .ok_or_else(|| HalError::CommandNotFound(program.to_string()))?;
        let mut cmd = Command::new(resolved);
        cmd.args(args);
        output_with_timeout(program, &mut cmd, timeout)
    }

    fn spawn_detached(&self, program: &str, args: &[&str]) -> HalResult<()> {
        log::debug!("launch: {} {:?}", program, args);
        let resolved = find_executable_in_path(program, &self.path_env)
            .ok_or_else(|| HalError::CommandNotFound(program.to_string()))?;
        let mut child = Command::new(resolved)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| map_command_err(program, e))?;

        match child.wait_timeout(LAUNCH_GRACE).map_err(HalError::Io)? {
            Some(status) if !status.success() => Err(HalError::CommandFailed {
                program: program.to_string(),
                code: status.code(),
                stderr: String::new(),
            }),
            Some(_) => Ok(()),
            None => {
                // Still running: hand the child to a reaper so it never lingers as a zombie.
                std::thread::spawn(move || {
                    let _ = child.wait();
                });
                Ok(())
            }
        }
    }

    fn find_program(&self, program: &str) -> Option<PathBuf> {
        find_executable_in_path(program, &self.path_env)
    }
}

impl FsOps for LinuxHal {
    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> HalResult<()> {
        fs::create_dir_all(path)?;
        Ok(())
    }

    fn read_mountinfo(&self) -> HalResult<String> {
        Ok(fs::read_to_string(MOUNTINFO_PATH)?)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[test]
    fn find_program_searches_configured_path_only() {
        let dir = tempdir().unwrap();
        write_script(dir.path(), "fake-tool", "exit 0");
        let hal = LinuxHal::with_search_path(dir.path().to_string_lossy().to_string());

        assert_eq!(hal.find_program("fake-tool"), Some(dir.path().join("fake-tool")));
        assert_eq!(hal.find_program("missing-tool"), None);
    }

    #[test]
    fn non_executable_files_are_not_programs() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("plain"), "data").unwrap();
        let hal = LinuxHal::with_search_path(dir.path().to_string_lossy().to_string());
        assert_eq!(hal.find_program("plain"), None);
    }

    #[test]
    fn missing_program_maps_to_command_not_found() {
        let dir = tempdir().unwrap();
        let hal = LinuxHal::with_search_path(dir.path().to_string_lossy().to_string());
        let err = hal
            .command_output("definitely-missing", &[], Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, HalError::CommandNotFound(ref p) if p == "definitely-missing"));
    }

    #[test]
    fn command_output_captures_streams_and_code() {
        let dir = tempdir().unwrap();
        write_script(dir.path(), "noisy", "echo out; echo err >&2; exit 3");
        let hal = LinuxHal::with_search_path(dir.path().to_string_lossy().to_string());

        let output = hal
            .command_output("noisy", &[], Duration::from_secs(5))
            .unwrap();
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert_eq!(output.combined(), "out\nerr\n");

        let err = hal
            .command_status("noisy", &[], Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, HalError::CommandFailed { code: Some(3), .. }));
    }

    #[test]
    fn arguments_are_not_shell_interpreted() {
        let dir = tempdir().unwrap();
        write_script(dir.path(), "echo-args", "printf '%s|' \"$@\"");
        let hal = LinuxHal::with_search_path(dir.path().to_string_lossy().to_string());

        let output = hal
            .command_output("echo-args", &["a; rm -rf /", "$(id)"], Duration::from_secs(5))
            .unwrap();
        assert_eq!(output.stdout, "a; rm -rf /|$(id)|");
    }

    #[test]
    fn hung_process_times_out() {
        let dir = tempdir().unwrap();
        write_script(dir.path(), "sleepy", "sleep 5");
        let hal = LinuxHal::with_search_path(dir.path().to_string_lossy().to_string());

        let err = hal
            .command_output("sleepy", &[], Duration::from_millis(200))
            .unwrap_err();
        assert!(matches!(err, HalError::CommandTimeout { .. }));
    }

    #[test]
    fn spawn_detached_reports_immediate_failure() {
        let dir = tempdir().unwrap();
        write_script(dir.path(), "broken-launcher", "exit 4");
        write_script(dir.path(), "good-launcher", "exit 0");
        let hal = LinuxHal::with_search_path(dir.path().to_string_lossy().to_string());

        assert!(hal.spawn_detached("broken-launcher", &["/tmp"]).is_err());
        assert!(hal.spawn_detached("good-launcher", &["/tmp"]).is_ok());
    }
}
