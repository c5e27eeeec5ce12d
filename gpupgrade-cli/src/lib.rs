//! The gpupgrade CLI.

mod client;
mod cmd;
mod daemon;
#[cfg(test)]
mod daemon_test;
mod migration;
mod segments;

use anyhow::{Context, Result};
use structopt::StructOpt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub use migration::{apply_scripts, Psql, ScriptPhase, ScriptRunner};

/// Upgrade a cluster to a new major version.
#[derive(StructOpt)]
#[structopt(name = "gpupgrade")]
pub struct Gpupgrade {
    #[structopt(subcommand)]
    action: Subcommands,
    /// Enable debug logging and print the details of every substep.
    #[structopt(short, long, global = true)]
    verbose: bool,
}

impl Gpupgrade {
    pub async fn run(self) -> Result<()> {
        // The services log everything by default, the phases only what goes wrong.
        let default = match &self.action {
            Subcommands::Hub(_) | Subcommands::Agent(_) => "info",
            _ => "warn",
        };
        let filter_layer = if self.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
        };
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .context("error initializing logging/tracing system")?;

        match &self.action {
            Subcommands::Initialize(inner) => inner.run(&self).await,
            Subcommands::Execute(inner) => inner.run(&self).await,
            Subcommands::Finalize(inner) => inner.run(&self).await,
            Subcommands::Revert(inner) => inner.run(&self).await,
            Subcommands::Apply(inner) => inner.run(&self).await,
            Subcommands::Hub(inner) => inner.run(&self).await,
            Subcommands::Agent(inner) => inner.run(&self).await,
        }
    }
}

#[derive(StructOpt)]
enum Subcommands {
    /// Prepare the source cluster for an upgrade and create the intermediate cluster.
    #[structopt(name = "initialize")]
    Initialize(cmd::initialize::Initialize),
    /// Upgrade the source cluster into the intermediate cluster.
    #[structopt(name = "execute")]
    Execute(cmd::execute::Execute),
    /// Swap the upgraded cluster into the place of the source cluster.
    #[structopt(name = "finalize")]
    Finalize(cmd::finalize::Finalize),
    /// Return the source cluster to its state before the upgrade.
    #[structopt(name = "revert")]
    Revert(cmd::revert::Revert),
    /// Apply the data migration scripts of one phase.
    #[structopt(name = "apply")]
    Apply(cmd::apply::Apply),
    /// Run the hub.
    #[structopt(name = "hub")]
    Hub(cmd::services::HubCmd),
    /// Run an agent.
    #[structopt(name = "agent")]
    Agent(cmd::services::AgentCmd),
}
