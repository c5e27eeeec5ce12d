//! The hub's gRPC server and lifecycle.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures::FutureExt;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic::{Request, Response, Status};

use crate::agents::{AgentLauncher, SshLauncher};
use crate::session::{AgentConn, AgentSession, Dialer, TcpDialer};
use gpupgrade_agent::{PgUpgrade, UpgradeTool};
use gpupgrade_core::config::{Configuration, Env, DIAL_TIMEOUT};
use gpupgrade_core::grpc;
use gpupgrade_core::{AppError, ConnectionError, RpcResult};

/// The collaborators through which the hub reaches outside of its own process.
pub struct HubDeps {
    pub dialer: Arc<dyn Dialer>,
    pub launcher: Arc<dyn AgentLauncher>,
    /// Upgrades the coordinator, which lives on the hub's own host.
    pub upgrade: Arc<dyn UpgradeTool>,
    pub dial_timeout: Duration,
}

impl HubDeps {
    /// The collaborators of a hub running in production.
    pub fn new() -> Result<Self> {
        Ok(Self {
            dialer: Arc::new(TcpDialer),
            launcher: Arc::new(SshLauncher::current()?),
            upgrade: Arc::new(PgUpgrade),
            dial_timeout: DIAL_TIMEOUT,
        })
    }
}

enum Lifecycle {
    Idle,
    Serving {
        /// Begins graceful shutdown of the server.
        shutdown: oneshot::Sender<()>,
        /// Resolves once the server has stopped serving.
        done: oneshot::Receiver<()>,
    },
    Stopped,
}

/// The hub: a long-lived gRPC server holding the upgrade configuration.
#[derive(Clone)]
pub struct Hub {
    pub(crate) inner: Arc<HubInner>,
}

pub(crate) struct HubInner {
    pub(crate) env: Env,
    /// The persisted configuration. Every write is saved before the lock is released.
    pub(crate) config: RwLock<Configuration>,
    pub(crate) session: AgentSession,
    pub(crate) launcher: Arc<dyn AgentLauncher>,
    pub(crate) upgrade: Arc<dyn UpgradeTool>,
    lifecycle: Mutex<Lifecycle>,
}

impl Hub {
    /// Create a new instance.
    pub fn new(config: Configuration, env: Env, deps: HubDeps) -> Self {
        Self {
            inner: Arc::new(HubInner {
                env,
                config: RwLock::new(config),
                session: AgentSession::new(deps.dialer, deps.dial_timeout),
                launcher: deps.launcher,
                upgrade: deps.upgrade,
                lifecycle: Mutex::new(Lifecycle::Idle),
            }),
        }
    }

    /// Load the hub from the configuration in the environment's state directory.
    pub async fn load(env: Env, deps: HubDeps) -> Result<Self> {
        let config = Configuration::load(&env.state_dir).await?;
        Ok(Self::new(config, env, deps))
    }

    /// A snapshot of the current configuration.
    pub async fn config(&self) -> Configuration {
        self.inner.config.read().await.clone()
    }

    /// Bind the configured hub port and serve until stopped.
    pub async fn start(&self) -> Result<()> {
        let port = self.inner.config.read().await.hub_port;
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("error binding hub to port {}", port))?;
        self.serve(listener).await
    }

    /// Serve on the given listener until stopped.
    ///
    /// Fails with `ConnectionError::HubStopped` without serving if the hub was already stopped.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();
        {
            let mut lifecycle = self.inner.lifecycle.lock().await;
            match &*lifecycle {
                Lifecycle::Stopped => return Err(ConnectionError::HubStopped.into()),
                Lifecycle::Serving { .. } => bail!("hub is already serving"),
                Lifecycle::Idle => (),
            }
            *lifecycle = Lifecycle::Serving {
                shutdown: shutdown_tx,
                done: done_rx,
            };
        }

        if let Ok(addr) = listener.local_addr() {
            tracing::info!(%addr, "hub started");
        }
        let res = Server::builder()
            .add_service(grpc::CliToHubServer::new(self.clone()))
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
                let _res = shutdown_rx.await;
            })
            .await
            .context("error from hub gRPC server");
        let _res = done_tx.send(());
        res
    }

    /// Stop serving, optionally closing every agent connection first.
    ///
    /// Blocks until the server has drained. Stopping a stopped hub does nothing, and a stopped hub
    /// can never serve again.
    pub async fn stop(&self, close_agent_conns: bool) {
        let mut lifecycle = self.inner.lifecycle.lock().await;
        if let Lifecycle::Stopped = &*lifecycle {
            return;
        }
        if close_agent_conns {
            self.inner.session.close().await;
        }
        if let Lifecycle::Serving { shutdown, done } = std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            let _res = shutdown.send(());
            let _res = done.await;
        }
        tracing::info!("hub stopped");
    }

    /// A ready connection to every agent, dialing them on first use.
    pub async fn agent_conns(&self) -> Result<Arc<Vec<AgentConn>>> {
        let (hosts, port) = {
            let config = self.inner.config.read().await;
            (config.agent_hosts(), config.agent_port)
        };
        self.inner.session.connections(&hosts, port).await
    }

    /// Apply `update` to the configuration and persist it before it becomes visible.
    pub(crate) async fn update_config<F>(&self, update: F) -> Result<Configuration>
    where
        F: FnOnce(&mut Configuration) -> Result<()>,
    {
        let mut config = self.inner.config.write().await;
        let mut next = config.clone();
        update(&mut next)?;
        next.save(&self.inner.env.state_dir).await?;
        *config = next.clone();
        Ok(next)
    }
}

/// Run a request handler, turning its error or panic into a status.
pub(crate) async fn guarded<T, F>(method: &'static str, handler: F) -> RpcResult<Response<T>>
where
    F: Future<Output = Result<T>>,
{
    match AssertUnwindSafe(handler).catch_unwind().await {
        Ok(Ok(reply)) => Ok(Response::new(reply)),
        Ok(Err(err)) => {
            tracing::error!(error = ?err, method, "error handling request");
            Err(AppError::grpc(err))
        }
        Err(panic) => {
            let msg = panic_message(panic.as_ref());
            tracing::error!(panic = %msg, method, "panic while handling request");
            Err(Status::internal(format!("hub panicked handling {}: {}", method, msg)))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".into()
    }
}

#[tonic::async_trait]
impl grpc::CliToHub for Hub {
    async fn initialize(
        &self, request: Request<grpc::InitializeRequest>,
    ) -> RpcResult<Response<grpc::InitializeResponse>> {
        guarded("initialize", self.initialize_source(request.into_inner())).await
    }

    async fn initialize_create_cluster(
        &self, request: Request<grpc::InitializeCreateClusterRequest>,
    ) -> RpcResult<Response<grpc::InitializeCreateClusterResponse>> {
        guarded("initialize_create_cluster", self.create_intermediate_cluster(request.into_inner())).await
    }

    async fn execute(&self, _: Request<grpc::ExecuteRequest>) -> RpcResult<Response<grpc::ExecuteResponse>> {
        guarded("execute", self.upgrade_intermediate()).await
    }

    async fn finalize(&self, _: Request<grpc::FinalizeRequest>) -> RpcResult<Response<grpc::FinalizeResponse>> {
        guarded("finalize", self.swap_data_directories()).await
    }

    async fn revert(&self, _: Request<grpc::RevertRequest>) -> RpcResult<Response<grpc::RevertResponse>> {
        guarded("revert", self.revert_to_source()).await
    }

    async fn stop_services(
        &self, _: Request<grpc::StopServicesRequest>,
    ) -> RpcResult<Response<grpc::StopServicesReply>> {
        guarded("stop_services", self.stop_services_then_hub()).await
    }

    async fn restart_agents(
        &self, _: Request<grpc::RestartAgentsRequest>,
    ) -> RpcResult<Response<grpc::RestartAgentsReply>> {
        guarded("restart_agents", async {
            let hosts = self.restart_down_agents().await?;
            Ok::<_, anyhow::Error>(grpc::RestartAgentsReply { agent_hosts: hosts })
        })
        .await
    }
}
