//! Shell execution for resolved commands
//!
//! Kept apart from resolution: the resolver only produces strings, and the
//! CLI decides whether to print (dry run) or hand them to this module.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{info, warn};

use crate::shell::Shell;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOpts {
    pub cwd: Option<PathBuf>,
    pub timeout_ms: u64,
}

impl Default for RunOpts {
    fn default() -> Self {
        Self {
            cwd: None,
            timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunResult {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl RunResult {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Run `command` with `<shell> -c`, capturing output.
///
/// Spawn failures are errors; a non-zero exit or a timeout is reported in
/// the result. A timed-out child is killed.
pub async fn run_command(command: &str, shell: Shell, opts: RunOpts) -> Result<RunResult> {
    let mut cmd = Command::new(shell.program());
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &opts.cwd {
        cmd.current_dir(cwd);
    }

    info!(command, shell = shell.program(), "executing");
    let child = cmd
        .spawn()
        .with_context(|| format!("failed to spawn {}", shell.program()))?;

    match timeout(Duration::from_millis(opts.timeout_ms), child.wait_with_output()).await {
        Ok(output) => {
            let output = output.context("failed to wait for command")?;
            Ok(RunResult {
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                timed_out: false,
            })
        }
        Err(_) => {
            warn!(command, timeout_ms = opts.timeout_ms, "command timed out");
            Ok(RunResult {
                code: None,
                stdout: String::new(),
                stderr: String::new(),
                timed_out: true,
            })
        }
    }
}
