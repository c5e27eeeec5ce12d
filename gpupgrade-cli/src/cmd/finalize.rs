//! Swap the upgraded cluster into the place of the source cluster.

use std::path::PathBuf;

use anyhow::{Context, Result};
use structopt::StructOpt;

use crate::client::connect_hub;
use crate::cmd;
use crate::migration::{apply_scripts, Psql, ScriptPhase};
use crate::Gpupgrade;
use gpupgrade_core::config::{Configuration, Env};
use gpupgrade_core::grpc;
use gpupgrade_core::step::{Outcome, Phase, StepOptions, Substep};

/// Swap the upgraded cluster into the place of the source cluster.
#[derive(StructOpt)]
#[structopt(name = "finalize")]
pub struct Finalize {
    /// A directory of generated data migration scripts to apply.
    #[structopt(long, parse(from_os_str))]
    pub(crate) input_dir: Option<PathBuf>,
    /// Do not prompt for confirmation.
    #[structopt(long)]
    pub(crate) non_interactive: bool,
}

impl Finalize {
    pub async fn run(&self, base: &Gpupgrade) -> Result<()> {
        let env = Env::new()?;
        let opts = StepOptions {
            verbose: base.verbose,
            non_interactive: self.non_interactive,
        };
        self.finalize(&env, opts).await
    }

    /// Run the phase against the given environment.
    ///
    /// The hub is only started by the substep which needs it, so resuming after the hub has been
    /// stopped leaves nothing running.
    pub(crate) async fn finalize(&self, env: &Env, opts: StepOptions) -> Result<()> {
        let config = Configuration::load(&env.state_dir).await?;
        let archive_dir = env.log_archive_dir(&config.upgrade_id);
        let confirmation = String::from(
            "\ngpupgrade finalize will swap the upgraded cluster into the place of the source cluster.\n\
             Once the data directories are swapped the source cluster can no longer be restored with \
             \"gpupgrade revert\".",
        );

        let mut step = cmd::begin(Phase::Finalize, env, opts, &confirmation).await?;
        let mut finalized = None;
        step.run_hub_substep(Substep::SwapDataDirectories, swap(env, config.hub_port, &mut finalized))
            .await;
        let run_scripts = self.input_dir.is_some() && !self.non_interactive;
        step.run_cli_substep_conditionally(
            Substep::ExecuteFinalizeDataMigrationScripts,
            run_scripts,
            self.apply_scripts(&config),
        )
        .await;
        step.run_cli_substep(Substep::StopHubAndAgents, cmd::stop_hub_and_agents(env)).await;
        step.run_cli_substep(Substep::ArchiveLogDirectories, cmd::archive_log_dir(&env.log_dir, &archive_dir))
            .await;
        let store = step.store().clone();
        step.run_cli_substep(Substep::DeleteStateDirectory, cmd::delete_state_dir(store, &env.state_dir))
            .await;

        let target = match finalized {
            Some(res) => res.target,
            None => config.target.as_ref().map(grpc::Cluster::from),
        };
        let message = format!(
            "Finalize completed successfully.\n\n\
             The target cluster is now running:\n  {}\n\n\
             The source cluster's data directories are archived next to the upgraded ones.\n\
             Logs are archived in {}.",
            cmd::describe(&target),
            archive_dir.display(),
        );
        step.complete(&message).await
    }

    /// Finalize scripts run against the upgraded cluster, which now answers on the source's port.
    async fn apply_scripts(&self, config: &Configuration) -> Result<Outcome> {
        let input_dir = match &self.input_dir {
            Some(dir) => dir,
            None => return Ok(Outcome::Skip),
        };
        let runner = Psql {
            gphome: config.target_gphome.clone(),
            port: config.source()?.coordinator().port,
        };
        let applied = apply_scripts(input_dir, ScriptPhase::Finalize, &runner).await?;
        tracing::info!(applied, "finalize data migration scripts applied");
        Ok(Outcome::Success)
    }
}

async fn swap(env: &Env, hub_port: u16, finalized: &mut Option<grpc::FinalizeResponse>) -> Result<Outcome> {
    cmd::ensure_hub(env).await?;
    let res = connect_hub(hub_port)
        .await?
        .finalize(grpc::FinalizeRequest {})
        .await
        .context("error swapping data directories")?;
    *finalized = Some(res.into_inner());
    Ok(Outcome::Success)
}
