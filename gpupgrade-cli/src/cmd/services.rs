//! Running the hub and agent services.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use structopt::StructOpt;

use crate::daemon;
use crate::Gpupgrade;
use gpupgrade_agent::{AgentConfig, PgUpgrade};
use gpupgrade_core::config::{Configuration, Env};
use gpupgrade_hub::HubDeps;

/// Run the hub, serving the CLI on the configured hub port.
#[derive(StructOpt)]
#[structopt(name = "hub")]
pub struct HubCmd {
    /// Detach from the terminal once the hub is accepting connections.
    #[structopt(long)]
    daemonize: bool,
}

impl HubCmd {
    pub async fn run(&self, _base: &Gpupgrade) -> Result<()> {
        let env = Env::new()?;
        if self.daemonize {
            let port = Configuration::load(&env.state_dir).await?.hub_port;
            let pid = daemon::daemonize(port, &env.log_dir.join("hub.log")).await?;
            println!("Hub started on port {} with pid {}", port, pid);
            return Ok(());
        }
        gpupgrade_hub::App::new(env, HubDeps::new()?).await?.run().await
    }
}

/// Run an agent, serving the hub on the given port.
#[derive(StructOpt)]
#[structopt(name = "agent")]
pub struct AgentCmd {
    /// Detach from the terminal once the agent is accepting connections.
    #[structopt(long)]
    daemonize: bool,
    /// The port on which to serve the hub.
    #[structopt(long, default_value = "6416")]
    port: u16,
    /// The agent's state directory; defaults to the gpupgrade state directory.
    #[structopt(long, parse(from_os_str))]
    state_directory: Option<PathBuf>,
}

impl AgentCmd {
    pub async fn run(&self, _base: &Gpupgrade) -> Result<()> {
        let env = Env::new()?;
        if self.daemonize {
            let pid = daemon::daemonize(self.port, &env.log_dir.join("agent.log")).await?;
            println!("Agent started on port {} with pid {}", self.port, pid);
            return Ok(());
        }
        let config = AgentConfig {
            port: self.port,
            state_dir: self.state_directory.clone().unwrap_or(env.state_dir),
        };
        gpupgrade_agent::App::new(config, Arc::new(PgUpgrade)).await?.run().await
    }
}
