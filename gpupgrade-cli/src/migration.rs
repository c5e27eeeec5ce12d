//! Applying generated data migration scripts.
//!
//! Scripts live under `<input_dir>/current/<phase>/<database>/*.sql`. The databases of a phase are
//! migrated concurrently, while the scripts of one database are applied one at a time in lexical
//! order.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use tokio::process::Command;

use gpupgrade_core::fanout::run_concurrently;

/// The groups of generated data migration scripts.
///
/// Every group but `Stats` is applied during the upgrade phase of the same name. Statistics
/// scripts are applied during initialize, before the scripts which change the source cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptPhase {
    Stats,
    Initialize,
    Finalize,
    Revert,
}

impl fmt::Display for ScriptPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stats => "stats",
            Self::Initialize => "initialize",
            Self::Finalize => "finalize",
            Self::Revert => "revert",
        })
    }
}

impl FromStr for ScriptPhase {
    type Err = anyhow::Error;

    fn from_str(val: &str) -> Result<Self> {
        match val.to_lowercase().as_str() {
            "stats" => Ok(Self::Stats),
            "initialize" => Ok(Self::Initialize),
            "finalize" => Ok(Self::Finalize),
            "revert" => Ok(Self::Revert),
            _ => bail!("invalid phase {:?}, expected one of stats, initialize, finalize or revert", val),
        }
    }
}

/// A way of running one SQL script against a database.
#[tonic::async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run(&self, database: &str, script: &Path) -> Result<()>;
}

/// Runs scripts with `psql` from the given installation.
#[derive(Clone, Debug)]
pub struct Psql {
    pub gphome: PathBuf,
    pub port: u16,
}

impl Psql {
    pub fn command(&self, database: &str, script: &Path) -> Command {
        let mut cmd = Command::new(self.gphome.join("bin").join("psql"));
        cmd.args(&["-X", "-q", "-d", database, "-p"])
            .arg(self.port.to_string())
            .arg("-f")
            .arg(script);
        cmd
    }
}

#[tonic::async_trait]
impl ScriptRunner for Psql {
    async fn run(&self, database: &str, script: &Path) -> Result<()> {
        let output = self
            .command(database, script)
            .output()
            .await
            .with_context(|| format!("error running psql for {}", script.display()))?;
        if !output.status.success() {
            bail!("psql failed ({}): {}", output.status, String::from_utf8_lossy(&output.stderr).trim());
        }
        Ok(())
    }
}

/// The directory holding the scripts of the given phase.
pub fn phase_dir(input_dir: &Path, phase: ScriptPhase) -> PathBuf {
    input_dir.join("current").join(phase.to_string())
}

/// Apply every script of `phase`, returning the number of scripts applied.
///
/// A phase without scripts applies nothing.
pub async fn apply_scripts(input_dir: &Path, phase: ScriptPhase, runner: &dyn ScriptRunner) -> Result<usize> {
    let dir = phase_dir(input_dir, phase);
    if !gpupgrade_agent::dirs::path_exists(&dir).await? {
        tracing::info!(dir = %dir.display(), %phase, "no data migration scripts for phase");
        return Ok(0);
    }

    let mut databases = Vec::new();
    for database in sorted_entries(&dir).await? {
        if tokio::fs::metadata(&database).await?.is_dir() {
            let scripts: Vec<PathBuf> = sorted_entries(&database)
                .await?
                .into_iter()
                .filter(|path| path.extension().map_or(false, |ext| ext == "sql"))
                .collect();
            let name = database
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            databases.push((name, scripts));
        }
    }
    let total = databases.iter().map(|(_, scripts)| scripts.len()).sum();

    run_concurrently(databases, |(database, scripts)| async move {
        for script in &scripts {
            tracing::debug!(%database, script = %script.display(), "applying data migration script");
            runner
                .run(&database, script)
                .await
                .with_context(|| format!("error applying {} to database {}", script.display(), database))?;
        }
        Ok::<_, anyhow::Error>(())
    })
    .await?;
    Ok(total)
}

async fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("error reading directory {}", dir.display()))?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}
