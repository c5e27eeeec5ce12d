//! The hub's handlers of each upgrade phase.
//!
//! Each handler is safe to re-run after a failure: generated state is reused once persisted, and
//! every agent operation it fans out is idempotent.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::agents::{restart_agents, stop_agents, Restarted};
use crate::server::Hub;
use crate::session::AgentConn;
use gpupgrade_agent::dirs;
use gpupgrade_agent::UpgradeTask;
use gpupgrade_core::config::{Configuration, Mode};
use gpupgrade_core::fanout::run_concurrently;
use gpupgrade_core::grpc;
use gpupgrade_core::topology::{archive_data_dir, Cluster, Destination, Role, Segment};
use gpupgrade_core::AppError;

/// The time allowed for an agent to exit once asked to stop.
const STOP_TIMEOUT: Duration = Duration::from_secs(10);

impl Hub {
    /// Record the source cluster and the options of this upgrade.
    pub(crate) async fn initialize_source(
        &self, req: grpc::InitializeRequest,
    ) -> Result<grpc::InitializeResponse> {
        let mode = Mode::try_from(req.mode())?;
        let grpc::InitializeRequest {
            agent_port,
            source_gphome,
            target_gphome,
            source_port,
            use_hba_hostnames,
            ports,
            source_segments,
            source_version,
            target_version,
            disk_free_ratio,
            ..
        } = req;
        let agent_port = port(agent_port, "agent port")?;
        let ports = ports
            .into_iter()
            .map(|val| port(val, "intermediate port"))
            .collect::<Result<Vec<_>>>()?;
        if !(0.0..=1.0).contains(&disk_free_ratio) {
            let msg = format!("disk free ratio {} must be between 0.0 and 1.0", disk_free_ratio);
            return Err(AppError::InvalidInput(msg).into());
        }
        let segments = source_segments.into_iter().map(Segment::try_from).collect::<Result<Vec<_>, _>>()?;
        let source = Cluster::build(Destination::Source, PathBuf::from(source_gphome), source_version, segments)?;
        if source_port != 0 && source_port != u32::from(source.coordinator().port) {
            return Err(AppError::InvalidInput(format!(
                "source port {} does not match the coordinator port {}",
                source_port,
                source.coordinator().port
            ))
            .into());
        }

        let config = self
            .update_config(|config| {
                config.source = Some(source);
                config.agent_port = agent_port;
                config.mode = mode;
                config.use_hba_hostnames = use_hba_hostnames;
                config.target_gphome = PathBuf::from(target_gphome);
                config.target_version = target_version;
                config.intermediate_ports = ports;
                config.disk_free_ratio = disk_free_ratio;
                Ok(())
            })
            .await?;
        let source = config.source()?;
        tracing::info!(hosts = ?source.agent_hosts(), %mode, "source cluster recorded");
        Ok(grpc::InitializeResponse {
            source: Some(grpc::Cluster::from(source)),
        })
    }

    /// Derive the intermediate cluster, create its data directories and check that every pair of
    /// segments can be upgraded.
    pub(crate) async fn create_intermediate_cluster(
        &self, req: grpc::InitializeCreateClusterRequest,
    ) -> Result<grpc::InitializeCreateClusterResponse> {
        tracing::debug!(dynamic_library_path = %req.dynamic_library_path, "creating intermediate cluster");
        let pg_upgrade_verbose = req.pg_upgrade_verbose;
        let config = self
            .update_config(move |config| {
                config.pg_upgrade_verbose = pg_upgrade_verbose;
                Ok(())
            })
            .await?;
        let source = config.source()?.clone();
        let intermediate = match &config.intermediate {
            Some(intermediate) => intermediate.clone(),
            None => {
                let intermediate = source.intermediate_from(
                    &config.target_gphome,
                    config.target_version.clone(),
                    &config.intermediate_ports,
                    config.upgrade_id.as_str(),
                )?;
                let saved = intermediate.clone();
                self.update_config(move |config| {
                    config.intermediate = Some(saved);
                    Ok(())
                })
                .await?;
                intermediate
            }
        };

        let conns = self.agent_conns().await?;
        let disk_free_ratio = config.disk_free_ratio;
        dirs::check_data_dir(&source.coordinator().data_dir).await?;
        dirs::check_disk_space(&source.coordinator().data_dir, disk_free_ratio).await?;
        run_concurrently(conns.iter().cloned(), |mut conn| {
            let data_dirs = dir_strings(primaries_on(&source, &conn.host));
            async move {
                conn.client
                    .check_environment(grpc::CheckEnvironmentRequest { data_dirs, disk_free_ratio })
                    .await
                    .with_context(|| format!("error checking environment on host {}", conn.host))?;
                Ok(())
            }
        })
        .await?;

        dirs::create_data_dir(&intermediate.coordinator().data_dir).await?;
        run_concurrently(conns.iter().cloned(), |mut conn| {
            let data_dirs = dir_strings(primaries_on(&intermediate, &conn.host));
            async move {
                conn.client
                    .create_data_directories(grpc::CreateDataDirectoriesRequest { data_dirs })
                    .await
                    .with_context(|| format!("error creating data directories on host {}", conn.host))?;
                Ok(())
            }
        })
        .await?;

        self.upgrade_segments(&config, &source, &intermediate, &conns, true).await?;
        Ok(grpc::InitializeCreateClusterResponse {
            intermediate: Some(grpc::Cluster::from(&intermediate)),
            has_all_mirrors_and_standby: source.has_all_mirrors_and_standby(),
        })
    }

    /// Upgrade the coordinator and every primary into the intermediate cluster.
    pub(crate) async fn upgrade_intermediate(&self) -> Result<grpc::ExecuteResponse> {
        let config = self.config().await;
        let source = config.source()?;
        let intermediate = config.intermediate()?;
        let conns = self.agent_conns().await?;
        self.upgrade_segments(&config, source, intermediate, &conns, false).await?;
        Ok(grpc::ExecuteResponse {
            intermediate: Some(grpc::Cluster::from(intermediate)),
        })
    }

    /// Archive the source data directories and move the intermediate ones into their place.
    pub(crate) async fn swap_data_directories(&self) -> Result<grpc::FinalizeResponse> {
        let config = self.config().await;
        let source = config.source()?;
        let intermediate = config.intermediate()?;
        let upgrade_id = config.upgrade_id.as_str();
        let target = source.target_from(intermediate)?;
        let conns = self.agent_conns().await?;

        let coordinator = source.coordinator();
        dirs::rename_dir(&coordinator.data_dir, &archive_data_dir(&coordinator.data_dir, upgrade_id)).await?;
        dirs::rename_dir(&intermediate.coordinator().data_dir, &coordinator.data_dir).await?;
        run_concurrently(conns.iter().cloned(), |mut conn| {
            let pairs = swap_pairs(source, intermediate, &conn.host, upgrade_id);
            async move {
                let pairs = pairs?;
                conn.client
                    .rename_directories(grpc::RenameDirectoriesRequest { pairs })
                    .await
                    .with_context(|| format!("error swapping data directories on host {}", conn.host))?;
                Ok(())
            }
        })
        .await?;

        let log_archive_dir = self.inner.env.log_archive_dir(&config.upgrade_id);
        let saved = target.clone();
        let archive = log_archive_dir.clone();
        self.update_config(move |config| {
            config.target = Some(saved);
            config.log_archive_dir = archive;
            Ok(())
        })
        .await?;
        tracing::info!(log_archive_dir = %log_archive_dir.display(), "data directories swapped");
        Ok(grpc::FinalizeResponse {
            target: Some(grpc::Cluster::from(&target)),
            log_archive_directory: log_archive_dir.to_string_lossy().into_owned(),
        })
    }

    /// Delete the intermediate cluster, leaving the source as it was before the upgrade.
    pub(crate) async fn revert_to_source(&self) -> Result<grpc::RevertResponse> {
        let config = self.config().await;
        if config.target.is_some() {
            let msg = "can not revert once finalize has swapped data directories";
            return Err(AppError::InvalidInput(msg.into()).into());
        }
        let source = config.source()?;

        if let Some(intermediate) = &config.intermediate {
            let conns = self.agent_conns().await?;
            dirs::delete_dir(&intermediate.coordinator().data_dir).await?;
            run_concurrently(conns.iter().cloned(), |mut conn| {
                let dirs = dir_strings(primaries_on(intermediate, &conn.host));
                async move {
                    conn.client
                        .delete_directories(grpc::DeleteDirectoriesRequest { dirs })
                        .await
                        .with_context(|| {
                            format!("error deleting intermediate data directories on host {}", conn.host)
                        })?;
                    Ok(())
                }
            })
            .await?;
        }

        let log_archive_dir = self.inner.env.log_archive_dir(&config.upgrade_id);
        let archive = log_archive_dir.clone();
        self.update_config(move |config| {
            config.intermediate = None;
            config.log_archive_dir = archive;
            Ok(())
        })
        .await?;
        Ok(grpc::RevertResponse {
            source: Some(grpc::Cluster::from(source)),
            source_version: source.version().to_string(),
            log_archive_directory: log_archive_dir.to_string_lossy().into_owned(),
        })
    }

    /// Stop every agent, then stop the hub once this request has been answered.
    pub(crate) async fn stop_services_then_hub(&self) -> Result<grpc::StopServicesReply> {
        match self.agent_conns().await {
            Ok(conns) => {
                if let Err(errs) = stop_agents(&conns, STOP_TIMEOUT).await {
                    tracing::error!(error = %errs, "error stopping agents");
                }
            }
            Err(err) => tracing::error!(error = ?err, "error stopping agents"),
        }
        let hub = self.clone();
        tokio::spawn(async move { hub.stop(false).await });
        Ok(grpc::StopServicesReply {})
    }

    /// Start an agent on every host whose agent is unreachable, returning the restarted hosts.
    pub(crate) async fn restart_down_agents(&self) -> Result<Vec<String>> {
        let (hosts, port) = {
            let config = self.inner.config.read().await;
            (config.agent_hosts(), config.agent_port)
        };
        let session = &self.inner.session;
        let Restarted { hosts: started, errors } = restart_agents(
            &hosts,
            port,
            &self.inner.env.state_dir,
            session.dialer().as_ref(),
            session.timeout(),
            self.inner.launcher.as_ref(),
        )
        .await;
        session.reset().await;
        if !errors.is_empty() {
            return Err(anyhow::Error::new(errors))
                .with_context(|| format!("error restarting agents (restarted: [{}])", started.join(",")));
        }
        self.agent_conns().await?;
        Ok(started)
    }

    /// Upgrade, or check, the coordinator locally and every primary on its agent.
    async fn upgrade_segments(
        &self, config: &Configuration, source: &Cluster, intermediate: &Cluster, conns: &[AgentConn], check_only: bool,
    ) -> Result<()> {
        let verbose = config.pg_upgrade_verbose;
        let coordinator = source.coordinator();
        let task = UpgradeTask {
            mode: config.mode,
            source_gphome: source.gphome().to_path_buf(),
            target_gphome: intermediate.gphome().to_path_buf(),
            check_only,
            verbose,
            source: coordinator.clone(),
            target: intermediate.coordinator().clone(),
            work_dir: self.inner.env.state_dir.join("pg_upgrade").join(format!("seg{}", coordinator.content_id)),
        };
        self.inner.upgrade.upgrade(task).await.context("error upgrading coordinator")?;

        let mode = grpc::Mode::from(config.mode) as i32;
        let source_gphome = source.gphome().to_string_lossy().into_owned();
        let target_gphome = intermediate.gphome().to_string_lossy().into_owned();
        run_concurrently(conns.iter().cloned(), |mut conn| {
            let pairs = segment_pairs(source, intermediate, &conn.host);
            let (source_gphome, target_gphome) = (source_gphome.clone(), target_gphome.clone());
            async move {
                let req = grpc::UpgradePrimariesRequest {
                    mode,
                    source_gphome,
                    target_gphome,
                    check_only,
                    pairs: pairs?,
                    verbose,
                };
                conn.client
                    .upgrade_primaries(req)
                    .await
                    .with_context(|| format!("error upgrading primaries on host {}", conn.host))?;
                Ok(())
            }
        })
        .await?;
        Ok(())
    }
}

/// The non-coordinator primaries of `cluster` living on `host`.
fn primaries_on<'a>(cluster: &'a Cluster, host: &str) -> Vec<&'a Segment> {
    cluster.select_segments(|seg| seg.hostname == host && seg.is_primary() && !seg.is_coordinator())
}

fn dir_strings(segments: Vec<&Segment>) -> Vec<String> {
    segments.into_iter().map(|seg| seg.data_dir.to_string_lossy().into_owned()).collect()
}

/// The intermediate counterpart of the segment with the same content and role.
fn counterpart<'a>(intermediate: &'a Cluster, seg: &Segment) -> Result<&'a Segment> {
    intermediate
        .segment(seg.content_id, seg.role)
        .with_context(|| format!("intermediate cluster has no {} for content {}", seg.role, seg.content_id))
}

fn segment_pairs(source: &Cluster, intermediate: &Cluster, host: &str) -> Result<Vec<grpc::SegmentPair>> {
    primaries_on(source, host)
        .into_iter()
        .map(|seg| {
            Ok(grpc::SegmentPair {
                source: Some(grpc::Segment::from(seg)),
                target: Some(grpc::Segment::from(counterpart(intermediate, seg)?)),
            })
        })
        .collect()
}

/// Rename pairs which archive each source directory, then move its intermediate directory in.
fn swap_pairs(
    source: &Cluster, intermediate: &Cluster, host: &str, upgrade_id: &str,
) -> Result<Vec<grpc::DirectoryPair>> {
    let mut pairs = Vec::new();
    for seg in primaries_on(source, host) {
        let target = counterpart(intermediate, seg)?;
        debug_assert!(target.role == Role::Primary);
        pairs.push(grpc::DirectoryPair {
            source: seg.data_dir.to_string_lossy().into_owned(),
            target: archive_data_dir(&seg.data_dir, upgrade_id).to_string_lossy().into_owned(),
        });
        pairs.push(grpc::DirectoryPair {
            source: target.data_dir.to_string_lossy().into_owned(),
            target: seg.data_dir.to_string_lossy().into_owned(),
        });
    }
    Ok(pairs)
}

fn port(val: u32, what: &str) -> Result<u16> {
    u16::try_from(val).map_err(|_| AppError::InvalidInput(format!("invalid {} {}", what, val)).into())
}
