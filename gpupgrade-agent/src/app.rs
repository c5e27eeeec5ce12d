use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::stream::StreamExt;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::{BroadcastStream, SignalStream};
use tokio_stream::StreamMap;

use crate::server::AgentService;
use crate::upgrade::UpgradeTool;

/// Runtime configuration of an agent.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// The port on which the agent serves the hub.
    pub port: u16,
    /// The agent's state directory.
    pub state_dir: PathBuf,
}

/// The application object for when the agent is running.
pub struct App {
    /// The address on which the agent is listening.
    addr: SocketAddr,
    /// A channel used for triggering shutdown.
    shutdown_tx: broadcast::Sender<()>,
    /// A channel used for triggering shutdown.
    shutdown_rx: BroadcastStream<()>,
    /// The join handle of the gRPC server.
    server: JoinHandle<()>,
}

impl App {
    /// Create a new instance, binding the agent's port and spawning its gRPC server.
    pub async fn new(config: AgentConfig, upgrade: Arc<dyn UpgradeTool>) -> Result<Self> {
        tokio::fs::create_dir_all(&config.state_dir)
            .await
            .with_context(|| format!("error creating agent state directory {}", config.state_dir.display()))?;
        let listener = TcpListener::bind(("0.0.0.0", config.port))
            .await
            .with_context(|| format!("error binding agent to port {}", config.port))?;
        let addr = listener.local_addr().context("error reading agent listener address")?;

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let server = AgentService::new(config.state_dir, upgrade, shutdown_tx.clone()).spawn(listener);
        tracing::info!(%addr, "agent started");

        Ok(Self {
            addr,
            shutdown_rx: BroadcastStream::new(shutdown_rx),
            shutdown_tx,
            server,
        })
    }

    /// The address on which the agent is listening.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// A handle which stops the agent when sent a message.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }

    /// Run until a signal or a stop request arrives.
    ///
    /// The gRPC server is not drained: the caller is expected to exit the process, which closes
    /// every connection including the one carrying the stop request.
    pub async fn run(mut self) -> Result<()> {
        let mut signals = StreamMap::new();
        let sigterm = signal(SignalKind::terminate()).context("error building signal stream")?;
        signals.insert("sigterm", SignalStream::new(sigterm));
        let sigint = signal(SignalKind::interrupt()).context("error building signal stream")?;
        signals.insert("sigint", SignalStream::new(sigint));

        loop {
            tokio::select! {
                Some((_, sig)) = signals.next() => {
                    tracing::debug!(signal = ?sig, "signal received, beginning shutdown");
                    let _ = self.shutdown_tx.send(());
                    break;
                }
                _ = self.shutdown_rx.next() => break,
            }
        }

        tracing::debug!("agent is shutting down");
        self.server.abort();
        tracing::debug!("agent shutdown complete");
        Ok(())
    }
}
