//! Apply the data migration scripts of one phase outside of a running phase.

use std::path::PathBuf;

use anyhow::Result;
use structopt::StructOpt;

use crate::migration::{apply_scripts, Psql, ScriptPhase};
use crate::Gpupgrade;
use gpupgrade_core::config::{Configuration, Env};

/// Apply the data migration scripts of one phase.
#[derive(StructOpt)]
#[structopt(name = "apply")]
pub struct Apply {
    /// The directory holding the generated scripts.
    #[structopt(long, parse(from_os_str))]
    input_dir: PathBuf,
    /// The phase whose scripts to apply: stats, initialize, finalize or revert.
    #[structopt(long)]
    phase: ScriptPhase,
    /// The installation whose psql runs the scripts; defaults to the source cluster's.
    #[structopt(long, parse(from_os_str))]
    gphome: Option<PathBuf>,
    /// The coordinator port to connect to; defaults to the source cluster's.
    #[structopt(long)]
    port: Option<u16>,
}

impl Apply {
    pub async fn run(&self, _base: &Gpupgrade) -> Result<()> {
        let runner = match (&self.gphome, self.port) {
            (Some(gphome), Some(port)) => Psql { gphome: gphome.clone(), port },
            (gphome, port) => {
                let env = Env::new()?;
                let config = Configuration::load(&env.state_dir).await?;
                let source = config.source()?;
                Psql {
                    gphome: gphome.clone().unwrap_or_else(|| source.gphome().to_path_buf()),
                    port: port.unwrap_or(source.coordinator().port),
                }
            }
        };
        let applied = apply_scripts(&self.input_dir, self.phase, &runner).await?;
        println!("Applied {} {} data migration scripts.", applied, self.phase);
        Ok(())
    }
}
