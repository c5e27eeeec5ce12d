//! Stopping and restarting the agents.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tokio::process::Command;
use tonic::Status;

use crate::session::{AgentConn, Dialer};
use gpupgrade_core::fanout::{collect_concurrently, run_concurrently, ErrorList};
use gpupgrade_core::grpc;

/// Stop the agent behind every connection.
///
/// An agent exits before it can reply to a stop request, so the request failing because the
/// transport closed is the success case. A normal reply means the agent is still running.
pub async fn stop_agents(conns: &[AgentConn], timeout: Duration) -> Result<(), ErrorList> {
    run_concurrently(conns.iter().cloned(), |mut conn| async move {
        let res = tokio::time::timeout(timeout, conn.client.stop_agent(grpc::StopAgentRequest {}))
            .await
            .map_err(|_| anyhow!("timed out after {:?} stopping agent on host {}", timeout, conn.host))?;
        match res {
            Ok(_) => Err(anyhow!("failed to stop agent on host {}: it replied and is still running", conn.host)),
            Err(status) if transport_closed(&status) => {
                tracing::info!(host = %conn.host, "agent stopped");
                Ok::<_, anyhow::Error>(())
            }
            Err(status) => {
                Err(anyhow::Error::new(status).context(format!("failed to stop agent on host {}", conn.host)))
            }
        }
    })
    .await
}

/// Check if the given status was produced by the transport closing, rather than sent by the agent.
///
/// Statuses sent by a peer are decoded from response headers and never carry a source error, so a
/// live agent answering with any code, `Unavailable` included, is not counted as stopped.
pub fn transport_closed(status: &Status) -> bool {
    std::error::Error::source(status).is_some() || status.message().starts_with("h2 protocol error")
}

/// A way of starting the agent on a remote host.
#[tonic::async_trait]
pub trait AgentLauncher: Send + Sync + 'static {
    async fn launch(&self, host: &str, port: u16, state_dir: &Path) -> Result<()>;
}

/// Starts agents over ssh, running this same executable in daemon mode.
#[derive(Clone, Debug)]
pub struct SshLauncher {
    exe: PathBuf,
}

impl SshLauncher {
    pub fn new(exe: impl Into<PathBuf>) -> Self {
        Self { exe: exe.into() }
    }

    /// A launcher of the currently running executable.
    pub fn current() -> Result<Self> {
        let exe = std::env::current_exe().context("error finding the path of the gpupgrade executable")?;
        Ok(Self::new(exe))
    }

    /// Build the command which starts the agent on the given host.
    pub fn command(&self, host: &str, port: u16, state_dir: &Path) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.arg(host)
            .arg(format!(
                "bash -c \"{} agent --daemonize --port {} --state-directory {}\"",
                self.exe.display(),
                port,
                state_dir.display()
            ))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[tonic::async_trait]
impl AgentLauncher for SshLauncher {
    async fn launch(&self, host: &str, port: u16, state_dir: &Path) -> Result<()> {
        let output = self
            .command(host, port, state_dir)
            .output()
            .await
            .with_context(|| format!("error running ssh to {}", host))?;
        if !output.status.success() {
            bail!("ssh to {} failed ({}): {}", host, output.status, String::from_utf8_lossy(&output.stderr).trim());
        }
        tracing::info!(%host, output = %String::from_utf8_lossy(&output.stdout).trim(), "agent started");
        Ok(())
    }
}

/// The outcome of restarting agents.
#[derive(Debug)]
pub struct Restarted {
    /// Hosts on which a new agent was started.
    pub hosts: Vec<String>,
    /// Every error hit while starting agents.
    pub errors: ErrorList,
}

/// Start an agent on every host whose agent can not be dialed.
pub async fn restart_agents(
    hosts: &[String], port: u16, state_dir: &Path, dialer: &dyn Dialer, timeout: Duration, launcher: &dyn AgentLauncher,
) -> Restarted {
    let outcome = collect_concurrently(hosts.iter().cloned(), |host| async move {
        match tokio::time::timeout(timeout, dialer.dial(&host, port)).await {
            Ok(Ok(conn)) => {
                conn.close(timeout).await;
                return Ok::<_, anyhow::Error>(false);
            }
            Ok(Err(err)) => tracing::info!(%host, error = ?err, "failed to dial agent, starting it"),
            Err(_) => tracing::info!(%host, ?timeout, "timed out dialing agent, starting it"),
        }
        launcher
            .launch(&host, port, state_dir)
            .await
            .with_context(|| format!("error starting agent on host {}", host))?;
        Ok(true)
    })
    .await;
    Restarted {
        hosts: outcome.successes.into_iter().filter(|(_, restarted)| *restarted).map(|(host, _)| host).collect(),
        errors: outcome.errors,
    }
}
