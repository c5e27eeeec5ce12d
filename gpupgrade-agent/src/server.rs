//! The agent's gRPC server.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic::{Request, Response};

use crate::dirs::{check_data_dir, check_disk_space, create_data_dir, delete_dir, rename_dir};
use crate::upgrade::{UpgradeTask, UpgradeTool};
use gpupgrade_core::config::Mode;
use gpupgrade_core::fanout::run_concurrently;
use gpupgrade_core::grpc;
use gpupgrade_core::topology::Segment;
use gpupgrade_core::{AppError, RpcResult};

/// The agent's implementation of the hub to agent protocol.
pub struct AgentService {
    /// The agent's state directory, under which tool logs are kept.
    state_dir: PathBuf,
    /// The tool used to upgrade segments.
    upgrade: Arc<dyn UpgradeTool>,
    /// A channel used for triggering shutdown.
    shutdown: broadcast::Sender<()>,
}

impl AgentService {
    /// Create a new instance.
    pub fn new(state_dir: PathBuf, upgrade: Arc<dyn UpgradeTool>, shutdown: broadcast::Sender<()>) -> Self {
        Self { state_dir, upgrade, shutdown }
    }

    /// Spawn the gRPC server on the given listener.
    pub fn spawn(self, listener: TcpListener) -> JoinHandle<()> {
        let mut shutdown_rx = self.shutdown.subscribe();
        let service = grpc::AgentServer::new(self);
        let fut = Server::builder()
            .add_service(service)
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
                let _res = shutdown_rx.recv().await;
            });
        tokio::spawn(async move {
            if let Err(err) = fut.await {
                tracing::error!(error = ?err, "error from agent gRPC server");
            }
        })
    }

    async fn upgrade_pairs(&self, req: grpc::UpgradePrimariesRequest) -> Result<()> {
        let mode = Mode::try_from(req.mode())?;
        let source_gphome = PathBuf::from(&req.source_gphome);
        let target_gphome = PathBuf::from(&req.target_gphome);
        let check_only = req.check_only;
        let verbose = req.verbose;
        let tasks = req
            .pairs
            .into_iter()
            .map(|pair| -> Result<UpgradeTask> {
                let missing = |what: &str| AppError::InvalidInput(format!("segment pair is missing its {}", what));
                let source = pair.source.ok_or_else(|| missing("source"))?;
                let target = pair.target.ok_or_else(|| missing("target"))?;
                let source = Segment::try_from(source)?;
                let target = Segment::try_from(target)?;
                Ok(UpgradeTask {
                    mode,
                    source_gphome: source_gphome.clone(),
                    target_gphome: target_gphome.clone(),
                    check_only,
                    verbose,
                    work_dir: self.state_dir.join("pg_upgrade").join(format!("seg{}", source.content_id)),
                    source,
                    target,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let upgrade = &self.upgrade;
        run_concurrently(tasks, |task| {
            let content_id = task.source.content_id;
            async move {
                upgrade
                    .upgrade(task)
                    .await
                    .with_context(|| format!("error upgrading primary for content {}", content_id))
            }
        })
        .await?;
        Ok(())
    }
}

#[tonic::async_trait]
impl grpc::Agent for AgentService {
    async fn stop_agent(&self, _: Request<grpc::StopAgentRequest>) -> RpcResult<Response<grpc::StopAgentReply>> {
        tracing::info!("stop requested by hub, shutting down");
        let _res = self.shutdown.send(());
        // Never replies; the process exits first.
        futures::future::pending::<()>().await;
        Ok(Response::new(grpc::StopAgentReply {}))
    }

    async fn check_environment(
        &self, request: Request<grpc::CheckEnvironmentRequest>,
    ) -> RpcResult<Response<grpc::CheckEnvironmentReply>> {
        let grpc::CheckEnvironmentRequest { data_dirs, disk_free_ratio } = request.into_inner();
        run_concurrently(data_dirs, |dir| async move {
            let dir = Path::new(&dir);
            check_data_dir(dir).await?;
            check_disk_space(dir, disk_free_ratio).await
        })
        .await
            .map_err(|errs| AppError::grpc(errs.into()))?;
        Ok(Response::new(grpc::CheckEnvironmentReply {}))
    }

    async fn create_data_directories(
        &self, request: Request<grpc::CreateDataDirectoriesRequest>,
    ) -> RpcResult<Response<grpc::CreateDataDirectoriesReply>> {
        let dirs = request.into_inner().data_dirs;
        run_concurrently(dirs, |dir| async move { create_data_dir(Path::new(&dir)).await })
            .await
            .map_err(|errs| AppError::grpc(errs.into()))?;
        Ok(Response::new(grpc::CreateDataDirectoriesReply {}))
    }

    async fn upgrade_primaries(
        &self, request: Request<grpc::UpgradePrimariesRequest>,
    ) -> RpcResult<Response<grpc::UpgradePrimariesReply>> {
        self.upgrade_pairs(request.into_inner()).await.map_err(AppError::grpc)?;
        Ok(Response::new(grpc::UpgradePrimariesReply {}))
    }

    async fn rename_directories(
        &self, request: Request<grpc::RenameDirectoriesRequest>,
    ) -> RpcResult<Response<grpc::RenameDirectoriesReply>> {
        // Pairs are applied in order, since later pairs may reuse paths freed by earlier ones.
        for pair in request.into_inner().pairs {
            rename_dir(Path::new(&pair.source), Path::new(&pair.target)).await.map_err(AppError::grpc)?;
        }
        Ok(Response::new(grpc::RenameDirectoriesReply {}))
    }

    async fn delete_directories(
        &self, request: Request<grpc::DeleteDirectoriesRequest>,
    ) -> RpcResult<Response<grpc::DeleteDirectoriesReply>> {
        let dirs = request.into_inner().dirs;
        run_concurrently(dirs, |dir| async move { delete_dir(Path::new(&dir)).await })
            .await
            .map_err(|errs| AppError::grpc(errs.into()))?;
        Ok(Response::new(grpc::DeleteDirectoriesReply {}))
    }
}
