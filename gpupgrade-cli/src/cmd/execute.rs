//! Upgrade the source cluster into the intermediate cluster.

use anyhow::{Context, Result};
use structopt::StructOpt;

use crate::client::connect_hub;
use crate::cmd;
use crate::Gpupgrade;
use gpupgrade_core::config::{Configuration, Env};
use gpupgrade_core::grpc;
use gpupgrade_core::step::{Outcome, Phase, StepOptions, Substep};

/// Upgrade the source cluster into the intermediate cluster.
#[derive(StructOpt)]
#[structopt(name = "execute")]
pub struct Execute {
    /// Do not prompt for confirmation.
    #[structopt(long)]
    pub(crate) non_interactive: bool,
}

impl Execute {
    pub async fn run(&self, base: &Gpupgrade) -> Result<()> {
        let env = Env::new()?;
        let config = Configuration::load(&env.state_dir).await?;
        let opts = StepOptions {
            verbose: base.verbose,
            non_interactive: self.non_interactive,
        };
        let confirmation = format!(
            "\ngpupgrade execute will upgrade the source cluster into the intermediate cluster.\n\n\
             \x20 mode:                 {}\n\
             \x20 target installation:  {}",
            config.mode,
            config.target_gphome.display(),
        );

        let mut step = cmd::begin(Phase::Execute, &env, opts, &confirmation).await?;
        let mut upgraded = None;
        step.run_hub_substep(Substep::UpgradePrimaries, upgrade(&env, config.hub_port, &mut upgraded))
            .await;

        let intermediate = match upgraded {
            Some(res) => res.intermediate,
            None => config.intermediate.as_ref().map(grpc::Cluster::from),
        };
        let message = format!(
            "Execute completed successfully.\n\n\
             The intermediate cluster is upgraded and running:\n  {}\n\n\
             NEXT ACTIONS\n\
             ------------\n\
             To complete the upgrade, run \"gpupgrade finalize\".\n\n\
             To return the cluster to its original state, run \"gpupgrade revert\".",
            cmd::describe(&intermediate),
        );
        step.complete(&message).await
    }
}

async fn upgrade(env: &Env, hub_port: u16, upgraded: &mut Option<grpc::ExecuteResponse>) -> Result<Outcome> {
    cmd::ensure_hub(env).await?;
    let res = connect_hub(hub_port)
        .await?
        .execute(grpc::ExecuteRequest {})
        .await
        .context("error upgrading primaries")?;
    *upgraded = Some(res.into_inner());
    Ok(Outcome::Success)
}
