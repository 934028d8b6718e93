// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Managed agent server
//!
//! When no server URL is configured, the remote runner launches the agent
//! server itself as a child process in the project directory and waits for
//! its TCP port to come up. Shutdown is SIGTERM first, SIGKILL if the
//! child has not exited after five seconds.

use crate::runner::RunnerError;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};

/// How often the port is probed while the server boots.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// How long to wait for the server before giving up.
const STARTUP_CAP: Duration = Duration::from_secs(30);

/// Grace period between SIGTERM and SIGKILL.
const TERM_GRACE: Duration = Duration::from_secs(5);

/// A child agent server owned by this process.
pub struct ManagedServer {
    child: Child,
    port: u16,
}

impl ManagedServer {
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Terminate the child: SIGTERM, then SIGKILL after the grace period.
    pub async fn shutdown(mut self) {
        #[cfg(unix)]
        if let Some(pid) = self.child.id() {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;
            if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                tracing::warn!(pid, error = %e, "SIGTERM failed");
            }
        }

        match tokio::time::timeout(TERM_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!(?status, "managed server exited");
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "waiting for managed server failed");
            }
            Err(_) => {
                tracing::warn!("managed server ignored SIGTERM, killing");
                let _ = self.child.start_kill();
                let _ = self.child.wait().await;
            }
        }
    }
}

/// Launch the server in the project directory and wait for its port.
pub async fn launch(
    command: &str,
    project_dir: &Path,
    port: u16,
) -> Result<ManagedServer, RunnerError> {
    let mut parts = command.split_whitespace();
    let binary = parts.next().ok_or_else(|| {
        RunnerError::ExecFailed("empty server command".to_string())
    })?;

    let mut cmd = Command::new(binary);
    cmd.args(parts)
        .arg("--port")
        .arg(port.to_string())
        .current_dir(project_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(RunnerError::Stream)?;
    tracing::info!(command, port, "launched managed agent server");

    let deadline = tokio::time::Instant::now() + STARTUP_CAP;
    loop {
        if TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
            return Ok(ManagedServer { child, port });
        }
        // A dead child will never open the port.
        if let Ok(Some(status)) = child.try_wait() {
            return Err(RunnerError::ExecFailed(format!(
                "managed server exited during startup: {status}"
            )));
        }
        if tokio::time::Instant::now() >= deadline {
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Err(RunnerError::ExecFailed(format!(
                "managed server did not open port {port} within {}s",
                STARTUP_CAP.as_secs()
            )));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
