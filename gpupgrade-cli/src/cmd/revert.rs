//! Return the source cluster to its state before the upgrade.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use structopt::StructOpt;

use crate::client::connect_hub;
use crate::cmd;
use crate::migration::{apply_scripts, Psql, ScriptPhase};
use crate::Gpupgrade;
use gpupgrade_agent::dirs;
use gpupgrade_core::config::{Configuration, Env, TemporaryConfig};
use gpupgrade_core::grpc;
use gpupgrade_core::step::{Outcome, Phase, StepOptions, Substep};

/// Return the source cluster to its state before the upgrade.
#[derive(StructOpt)]
#[structopt(name = "revert")]
pub struct Revert {
    /// A directory of generated data migration scripts to apply.
    #[structopt(long, parse(from_os_str))]
    pub(crate) input_dir: Option<PathBuf>,
    /// Do not prompt for confirmation.
    #[structopt(long)]
    pub(crate) non_interactive: bool,
}

impl Revert {
    pub async fn run(&self, base: &Gpupgrade) -> Result<()> {
        let env = Env::new()?;
        let opts = StepOptions {
            verbose: base.verbose,
            non_interactive: self.non_interactive,
        };
        self.revert(&env, opts).await
    }

    /// Run the phase against the given environment.
    pub(crate) async fn revert(&self, env: &Env, opts: StepOptions) -> Result<()> {
        if !dirs::path_exists(&env.state_dir).await? {
            bail!("no upgrade in progress in {}, nothing to revert", env.state_dir.display());
        }
        // Initialize may have failed before the hub's configuration was written.
        let config = match Configuration::exists(&env.state_dir).await? {
            true => Some(Configuration::load(&env.state_dir).await?),
            false => None,
        };
        let confirmation = String::from(
            "\ngpupgrade revert will delete the intermediate cluster and return the source cluster to its \
             original state.",
        );

        let mut step = cmd::begin(Phase::Revert, env, opts, &confirmation).await?;
        let mut reverted = None;
        let mut source_gphome = None;
        if let Some(config) = &config {
            step.run_hub_substep(Substep::DeleteIntermediateCluster, revert(env, config.hub_port, &mut reverted))
                .await;
            let run_scripts = self.input_dir.is_some() && !self.non_interactive;
            step.run_cli_substep_conditionally(
                Substep::ExecuteRevertDataMigrationScripts,
                run_scripts,
                self.apply_scripts(config),
            )
            .await;
            step.run_cli_substep(Substep::StopHubAndAgents, cmd::stop_hub_and_agents(env)).await;
            let archive_dir = env.log_archive_dir(&config.upgrade_id);
            step.run_cli_substep(Substep::ArchiveLogDirectories, cmd::archive_log_dir(&env.log_dir, &archive_dir))
                .await;
            source_gphome = config.source.as_ref().map(|source| source.gphome().display().to_string());
        } else if TemporaryConfig::exists(&env.state_dir).await? {
            source_gphome = Some(TemporaryConfig::load(&env.state_dir).await?.gphome.display().to_string());
        }
        let store = step.store().clone();
        step.run_cli_substep(Substep::DeleteStateDirectory, cmd::delete_state_dir(store, &env.state_dir))
            .await;

        let mut message = String::from("Revert completed successfully.");
        match &reverted {
            Some(res) => {
                message.push_str(&format!(
                    "\n\nThe source cluster is now running version {}:\n  {}\n\nLogs are archived in {}.",
                    res.source_version,
                    cmd::describe(&res.source),
                    res.log_archive_directory,
                ));
            }
            None => {
                if let Some(gphome) = source_gphome {
                    message.push_str(&format!("\n\nThe source cluster in {} is unchanged.", gphome));
                }
            }
        }
        message.push_str("\n\nTo restart the upgrade, run \"gpupgrade initialize\" again.");
        step.complete(&message).await
    }

    async fn apply_scripts(&self, config: &Configuration) -> Result<Outcome> {
        let input_dir = match &self.input_dir {
            Some(dir) => dir,
            None => return Ok(Outcome::Skip),
        };
        let source = config.source()?;
        let runner = Psql {
            gphome: source.gphome().to_path_buf(),
            port: source.coordinator().port,
        };
        let applied = apply_scripts(input_dir, ScriptPhase::Revert, &runner).await?;
        tracing::info!(applied, "revert data migration scripts applied");
        Ok(Outcome::Success)
    }
}

async fn revert(env: &Env, hub_port: u16, reverted: &mut Option<grpc::RevertResponse>) -> Result<Outcome> {
    cmd::ensure_hub(env).await?;
    let res = connect_hub(hub_port)
        .await?
        .revert(grpc::RevertRequest {})
        .await
        .context("error deleting intermediate cluster")?;
    *reverted = Some(res.into_inner());
    Ok(Outcome::Success)
}
