//! Remote node lifecycle: launch and teardown.
//!
//! Node processes are spawned fire-and-forget through the configured shell
//! command templates; there is no acknowledgment protocol, only a fixed
//! settling delay before the head proceeds. Teardown mirrors launch with the
//! kill template.

use anyhow::Context;
use arcwall::partition::{kill_plan, launch_plan, NodeCommand};
use arcwall::CanvasConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::sleep;

pub struct ClusterLauncher {
    canvas: Arc<CanvasConfig>,
    executable: String,
    settle: Duration,
}

impl ClusterLauncher {
    pub fn new(canvas: Arc<CanvasConfig>, executable: String) -> Self {
        let settle = canvas.params.launcher_interval;
        Self {
            canvas,
            executable,
            settle,
        }
    }

    fn cwd() -> String {
        std::env::current_dir()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| ".".into())
    }

    fn spawn_detached(command: &NodeCommand) -> anyhow::Result<()> {
        Command::new("sh")
            .arg("-c")
            .arg(&command.command)
            .spawn()
            .with_context(|| {
                format!(
                    "failed to launch command for node '{}': {}",
                    command.hostname, command.command
                )
            })?;
        Ok(())
    }

    /// Launches every active remote node, then waits out the settling delay.
    ///
    /// A spawn failure is logged per node; if any node failed, the error is
    /// escalated so the run loop can stop the application cleanly.
    pub async fn launch_remote_nodes(&self) -> anyhow::Result<()> {
        let plan = launch_plan(&self.canvas, &self.executable, &Self::cwd());
        if plan.is_empty() {
            tracing::info!("no active remote nodes to launch");
            return Ok(());
        }

        let mut failures = 0usize;
        for command in &plan {
            tracing::info!(
                hostname = %command.hostname,
                port = command.port,
                command = %command.command,
                "launching remote node"
            );
            if let Err(e) = Self::spawn_detached(command) {
                tracing::error!(hostname = %command.hostname, error = %e, "node launch failed");
                failures += 1;
            }
        }

        // Best-effort synchronization point: give the nodes time to come up
        // before the renderer tries to connect. Not a barrier.
        tracing::info!(nodes = plan.len(), settle = ?self.settle, "waiting for nodes to settle");
        sleep(self.settle).await;

        if failures > 0 {
            anyhow::bail!("{failures} of {} remote nodes failed to launch", plan.len());
        }
        Ok(())
    }

    /// Runs the kill template against every active remote node.
    pub async fn kill_remote_nodes(&self) {
        let plan = kill_plan(&self.canvas, &self.executable, &Self::cwd());
        for command in &plan {
            tracing::info!(hostname = %command.hostname, command = %command.command, "killing remote node");
            if let Err(e) = Self::spawn_detached(command) {
                tracing::error!(hostname = %command.hostname, error = %e, "node kill failed");
            }
        }
    }

    /// Full cluster teardown: remote nodes first, then any locally running
    /// head instance, terminated by executable name.
    pub async fn kill_cluster(&self) {
        self.kill_remote_nodes().await;

        let name = std::path::Path::new(&self.executable)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.executable.clone());

        tracing::info!(process = %name, "terminating local head instance");
        match Command::new("killall").arg(&name).status().await {
            Ok(status) if status.success() => {}
            Ok(status) => tracing::warn!(process = %name, %status, "killall exited non-zero"),
            Err(e) => tracing::error!(process = %name, error = %e, "failed to run killall"),
        }
    }
}
