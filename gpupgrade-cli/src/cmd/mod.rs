//! The CLI's subcommands, and the substeps shared between phases.

pub mod apply;
pub mod execute;
pub mod finalize;
pub mod initialize;
pub mod revert;
pub mod services;

use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};

use crate::client;
use gpupgrade_agent::dirs;
use gpupgrade_core::config::{Configuration, Env};
use gpupgrade_core::grpc;
use gpupgrade_core::step::{Outcome, Phase, StatusStore, Step, StepOptions};

/// Begin a phase, prompting on the terminal unless running non-interactively.
pub(crate) async fn begin(phase: Phase, env: &Env, opts: StepOptions, confirmation: &str) -> Result<Step> {
    let mut input = BufReader::new(std::io::stdin());
    let store = StatusStore::new(&env.state_dir);
    Step::begin(phase, store, opts, confirmation, &mut input, Box::new(std::io::stdout())).await
}

/// Start the hub in the background, unless one already answers on its port.
pub(crate) async fn start_hub(env: &Env) -> Result<Outcome> {
    let config = Configuration::load(&env.state_dir).await?;
    if client::hub_is_running(config.hub_port).await {
        tracing::info!(port = config.hub_port, "hub already running");
        return Ok(Outcome::Skip);
    }
    let exe = std::env::current_exe().context("error finding the path of the gpupgrade executable")?;
    let output = tokio::process::Command::new(exe)
        .args(&["hub", "--daemonize"])
        .env("GPUPGRADE_HOME", &env.state_dir)
        .env("GPUPGRADE_LOG_DIR", &env.log_dir)
        .output()
        .await
        .context("error starting hub")?;
    if !output.status.success() {
        anyhow::bail!("error starting hub ({}): {}", output.status, String::from_utf8_lossy(&output.stderr).trim());
    }
    tracing::info!(output = %String::from_utf8_lossy(&output.stdout).trim(), "hub started");
    Ok(Outcome::Success)
}

/// Make sure a hub is serving before a substep talks to it.
///
/// Called from within the hub substeps themselves, so that a substep skipped on resume never
/// brings back a hub which an earlier run already stopped.
pub(crate) async fn ensure_hub(env: &Env) -> Result<()> {
    start_hub(env).await.map(|_| ())
}

/// Ask the hub to stop every agent and then itself. A hub which is already gone has nothing to stop.
pub(crate) async fn stop_hub_and_agents(env: &Env) -> Result<Outcome> {
    let config = Configuration::load(&env.state_dir).await?;
    if !client::hub_is_running(config.hub_port).await {
        return Ok(Outcome::Skip);
    }
    let mut hub = client::connect_hub(config.hub_port).await?;
    hub.stop_services(grpc::StopServicesRequest {}).await.context("error stopping hub and agents")?;
    Ok(Outcome::Success)
}

/// Move the log directory to its archive location.
pub(crate) async fn archive_log_dir(log_dir: &Path, archive_dir: &Path) -> Result<Outcome> {
    if !dirs::path_exists(log_dir).await? && !dirs::path_exists(archive_dir).await? {
        return Ok(Outcome::Skip);
    }
    dirs::rename_dir(log_dir, archive_dir).await?;
    Ok(Outcome::Success)
}

/// Remove the state directory. The status log lives there, so the step stops recording first.
pub(crate) async fn delete_state_dir(store: StatusStore, state_dir: &Path) -> Result<Outcome> {
    store.disable();
    dirs::delete_dir(state_dir).await?;
    Ok(Outcome::Success)
}

/// Render a cluster's coordinator for the operator.
pub(crate) fn describe(cluster: &Option<grpc::Cluster>) -> String {
    let cluster = match cluster {
        Some(cluster) => cluster,
        None => return "unknown".into(),
    };
    match cluster.segments.iter().find(|seg| seg.content_id == -1) {
        Some(coordinator) => format!(
            "{} (port {}, data directory {})",
            cluster.gphome, coordinator.port, coordinator.data_dir
        ),
        None => cluster.gphome.clone(),
    }
}
