//! Invocation of the external upgrade tool for one segment pair.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::process::Command;

use gpupgrade_core::config::Mode;
use gpupgrade_core::topology::Segment;

/// The upgrade of one source segment into its intermediate counterpart.
#[derive(Clone, Debug)]
pub struct UpgradeTask {
    pub mode: Mode,
    pub source_gphome: PathBuf,
    pub target_gphome: PathBuf,
    /// Only check that the pair can be upgraded, without changing either.
    pub check_only: bool,
    /// Have the tool log every step it takes.
    pub verbose: bool,
    pub source: Segment,
    pub target: Segment,
    /// The directory in which the tool runs and leaves its logs.
    pub work_dir: PathBuf,
}

/// A tool able to upgrade the data directory of a segment.
#[tonic::async_trait]
pub trait UpgradeTool: Send + Sync + 'static {
    async fn upgrade(&self, task: UpgradeTask) -> Result<()>;
}

/// Upgrades segments with `pg_upgrade` from the target installation.
#[derive(Clone, Debug, Default)]
pub struct PgUpgrade;

impl PgUpgrade {
    /// Build the command which upgrades the given task.
    pub fn command(task: &UpgradeTask) -> Command {
        let mut cmd = Command::new(task.target_gphome.join("bin").join("pg_upgrade"));
        cmd.current_dir(&task.work_dir)
            .arg("--old-bindir")
            .arg(task.source_gphome.join("bin"))
            .arg("--new-bindir")
            .arg(task.target_gphome.join("bin"))
            .arg("--old-datadir")
            .arg(&task.source.data_dir)
            .arg("--new-datadir")
            .arg(&task.target.data_dir)
            .arg("--old-port")
            .arg(task.source.port.to_string())
            .arg("--new-port")
            .arg(task.target.port.to_string())
            .arg("--old-gp-dbid")
            .arg(task.source.db_id.to_string())
            .arg("--new-gp-dbid")
            .arg(task.target.db_id.to_string());
        if task.mode == Mode::Link {
            cmd.arg("--link");
        }
        if task.check_only {
            cmd.arg("--check");
        }
        if task.verbose {
            cmd.arg("--verbose");
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[tonic::async_trait]
impl UpgradeTool for PgUpgrade {
    #[tracing::instrument(
        level = "debug",
        skip(self, task),
        fields(content_id = task.source.content_id, check_only = task.check_only)
    )]
    async fn upgrade(&self, task: UpgradeTask) -> Result<()> {
        tokio::fs::create_dir_all(&task.work_dir)
            .await
            .with_context(|| format!("error creating pg_upgrade directory {}", task.work_dir.display()))?;
        let output = Self::command(&task)
            .output()
            .await
            .with_context(|| format!("error running pg_upgrade for content {}", task.source.content_id))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if stderr.trim().is_empty() { stdout } else { stderr };
            bail!(
                "pg_upgrade for content {} on {} failed ({}): {}",
                task.source.content_id,
                task.source.hostname,
                output.status,
                detail.trim()
            );
        }
        tracing::debug!("pg_upgrade finished");
        Ok(())
    }
}
