use std::net::SocketAddr;

use anyhow::{Context, Result};
use futures::stream::StreamExt;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::SignalStream;
use tokio_stream::StreamMap;

use crate::server::{Hub, HubDeps};
use gpupgrade_core::config::Env;

/// The application object for when the hub is running.
pub struct App {
    hub: Hub,
    /// The address on which the hub is listening.
    addr: SocketAddr,
    /// The join handle of the gRPC server.
    server: JoinHandle<Result<()>>,
}

impl App {
    /// Create a new instance, loading the saved configuration and binding the hub's port.
    pub async fn new(env: Env, deps: HubDeps) -> Result<Self> {
        let hub = Hub::load(env, deps).await?;
        let port = hub.config().await.hub_port;
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("error binding hub to port {}", port))?;
        Self::from_listener(hub, listener)
    }

    /// Create a new instance serving `hub` on an already bound listener.
    pub fn from_listener(hub: Hub, listener: TcpListener) -> Result<Self> {
        let addr = listener.local_addr().context("error reading hub listener address")?;
        let server = tokio::spawn({
            let hub = hub.clone();
            async move { hub.serve(listener).await }
        });
        Ok(Self { hub, addr, server })
    }

    /// The address on which the hub is listening.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn hub(&self) -> Hub {
        self.hub.clone()
    }

    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }

    /// Run until a signal arrives or the hub is stopped by a request.
    pub async fn run(self) -> Result<()> {
        let mut signals = StreamMap::new();
        let sigterm = signal(SignalKind::terminate()).context("error building signal stream")?;
        signals.insert("sigterm", SignalStream::new(sigterm));
        let sigint = signal(SignalKind::interrupt()).context("error building signal stream")?;
        signals.insert("sigint", SignalStream::new(sigint));

        let Self { hub, mut server, .. } = self;
        let res = tokio::select! {
            Some((_, sig)) = signals.next() => {
                tracing::debug!(signal = ?sig, "signal received, beginning shutdown");
                hub.stop(true).await;
                (&mut server).await
            }
            res = &mut server => res,
        };

        tracing::debug!("hub shutdown complete");
        res.context("hub server task panicked")?
    }
}
