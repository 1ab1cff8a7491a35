//! Process execution helpers.
//!
//! External commands are considered "world-touching" and must go through the HAL so we can
//! test orchestration without spawning real processes. Arguments are always passed as a
//! discrete argv; nothing here ever goes through a shell.

use crate::{HalError, HalResult};
use std::path::PathBuf;
use std::time::Duration;

/// Captured result of a finished process. Output is decoded lossily; the tools we parse
/// emit ASCII but device models and labels occasionally do not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// stdout followed by stderr, the way fsck-style tools are usually read.
    pub fn combined(&self) -> String {
        let mut text = String::with_capacity(self.stdout.len() + self.stderr.len());
        text.push_str(&self.stdout);
        text.push_str(&self.stderr);
        text
    }
}

/// Process execution trait (external command runner).
pub trait ProcessOps {
    /// Run `program` to completion and capture its output regardless of exit status.
    fn command_output(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> HalResult<CommandOutput>;

    /// Launch `program` without waiting for it to finish (GUI launchers).
    fn spawn_detached(&self, program: &str, args: &[&str]) -> HalResult<()>;

    /// Resolve `program` on the search path without running it.
    fn find_program(&self, program: &str) -> Option<PathBuf>;

    /// Run `program` and require a zero exit status.
    fn command_status(&self, program: &str, args: &[&str], timeout: Duration) -> HalResult<()> {
        let output = self.command_output(program, args, timeout)?;
        if !output.success() {
            return Err(HalError::CommandFailed {
                program: program.to_string(),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}
