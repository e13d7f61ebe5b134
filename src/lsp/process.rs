// SPDX-License-Identifier: MIT
//! Process supervisor (component C) — spawning and signal escalation for
//! LSP server child processes.
//!
//! The graceful multi-step stop sequence lives on `Session` (it needs both
//! this process handle and the JSON-RPC channel); this module only owns
//! spawning and the raw signal-delivery primitives.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tracing::warn;

pub struct LspProcess {
    pub child: Child,
    pub pid: u32,
}

impl LspProcess {
    /// Spawn `command args...` with `cwd`, piped stdio, inheriting the
    /// parent environment. Fails if any of the three pipes is unavailable.
    pub fn spawn(command: &str, args: &[String], cwd: &str) -> Result<(Self, ChildStdin, ChildStdout)> {
        let mut child = tokio::process::Command::new(command)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning LSP server '{command}'"))?;

        let stdin = child.stdin.take().context("LSP child has no stdin pipe")?;
        let stdout = child.stdout.take().context("LSP child has no stdout pipe")?;
        if child.stderr.take().is_none() {
            anyhow::bail!("LSP child has no stderr pipe");
        }

        let pid = child.id().context("LSP child exited before its pid could be read")?;

        Ok((Self { child, pid }, stdin, stdout))
    }

    /// Non-blocking liveness probe. Grounded on the same `kill(pid, 0)`
    /// liveness check used elsewhere for child process supervision.
    #[cfg(unix)]
    pub fn is_alive(&self) -> bool {
        unsafe { libc::kill(self.pid as libc::pid_t, 0) == 0 }
    }

    #[cfg(not(unix))]
    pub fn is_alive(&self) -> bool {
        true
    }

    #[cfg(unix)]
    pub fn send_sigterm(&self) {
        unsafe {
            libc::kill(self.pid as libc::pid_t, libc::SIGTERM);
        }
    }

    #[cfg(unix)]
    pub fn send_sigkill(&self) {
        unsafe {
            libc::kill(self.pid as libc::pid_t, libc::SIGKILL);
        }
    }

    #[cfg(not(unix))]
    pub fn send_sigterm(&self) {
        warn!("signal escalation is unix-only; relying on kill_on_drop");
    }

    #[cfg(not(unix))]
    pub fn send_sigkill(&self) {
        warn!("signal escalation is unix-only; relying on kill_on_drop");
    }

    /// Wait for the child to exit, bounded by `timeout`. Returns `true` if
    /// it exited within the window.
    pub async fn wait_exit(&mut self, timeout: std::time::Duration) -> bool {
        tokio::time::timeout(timeout, self.child.wait()).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_true_exits_quickly() {
        let (mut proc, _stdin, _stdout) =
            LspProcess::spawn("true", &[], "/tmp").expect("spawn true");
        let exited = proc.wait_exit(std::time::Duration::from_secs(2)).await;
        assert!(exited);
    }

    #[test]
    fn spawn_missing_binary_fails() {
        let result = LspProcess::spawn("this-binary-does-not-exist-xyz", &[], "/tmp");
        assert!(result.is_err());
    }
}
