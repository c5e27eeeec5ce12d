//! Host-local directory operations, shared by the agent's handlers and the hub's own host.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use tokio::process::Command;

/// Fail unless `dir` exists and is a directory.
pub async fn check_data_dir(dir: &Path) -> Result<()> {
    let meta = tokio::fs::metadata(dir)
        .await
        .with_context(|| format!("error checking data directory {}", dir.display()))?;
    if !meta.is_dir() {
        bail!("data directory {} is not a directory", dir.display());
    }
    Ok(())
}

/// Space on the filesystem holding a directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiskUsage {
    pub total_kb: u64,
    pub available_kb: u64,
}

impl DiskUsage {
    /// The fraction of the filesystem available to unprivileged users.
    pub fn free_ratio(&self) -> f64 {
        if self.total_kb == 0 {
            return 0.0;
        }
        self.available_kb as f64 / self.total_kb as f64
    }
}

/// Parse the POSIX output of `df -Pk` for a single path.
pub fn parse_df(output: &str) -> Result<DiskUsage> {
    let line = output
        .lines()
        .skip(1)
        .find(|line| !line.trim().is_empty())
        .context("df reported no filesystem")?;
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 6 {
        bail!("unexpected df output {:?}", line);
    }
    let total_kb = fields[1].parse().with_context(|| format!("invalid filesystem size in {:?}", line))?;
    let available_kb = fields[3].parse().with_context(|| format!("invalid available space in {:?}", line))?;
    Ok(DiskUsage { total_kb, available_kb })
}

/// Measure the filesystem holding `dir`.
pub async fn disk_usage(dir: &Path) -> Result<DiskUsage> {
    let output = Command::new("df")
        .arg("-Pk")
        .arg(dir)
        .output()
        .await
        .with_context(|| format!("error running df for {}", dir.display()))?;
    if !output.status.success() {
        bail!(
            "df failed for {} ({}): {}",
            dir.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    parse_df(&String::from_utf8_lossy(&output.stdout))
        .with_context(|| format!("error reading free space of {}", dir.display()))
}

/// Fail unless at least `ratio` of the filesystem holding `dir` is free. A ratio of zero checks nothing.
pub async fn check_disk_space(dir: &Path, ratio: f64) -> Result<()> {
    if ratio <= 0.0 {
        return Ok(());
    }
    let usage = disk_usage(dir).await?;
    let free = usage.free_ratio();
    if free < ratio {
        bail!(
            "insufficient disk space for {}: {:.1}% free, {:.1}% required",
            dir.display(),
            free * 100.0,
            ratio * 100.0
        );
    }
    tracing::debug!(dir = %dir.display(), free, "disk space checked");
    Ok(())
}

/// Create `dir` and its parents, restricting it to the owner.
pub async fn create_data_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("error creating data directory {}", dir.display()))?;
    tokio::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))
        .await
        .with_context(|| format!("error setting permissions of data directory {}", dir.display()))?;
    tracing::debug!(dir = %dir.display(), "data directory created");
    Ok(())
}

/// Rename `source` to `target`. A pair whose target already exists has already been applied.
pub async fn rename_dir(source: &Path, target: &Path) -> Result<()> {
    if path_exists(target).await? {
        tracing::debug!(source = %source.display(), target = %target.display(), "directory already renamed, skipping");
        return Ok(());
    }
    if !path_exists(source).await? {
        return Err(anyhow!("neither {} nor {} exist", source.display(), target.display()));
    }
    tokio::fs::rename(source, target)
        .await
        .with_context(|| format!("error renaming {} to {}", source.display(), target.display()))?;
    tracing::info!(source = %source.display(), target = %target.display(), "directory renamed");
    Ok(())
}

/// Remove `dir` recursively. A missing directory has already been deleted.
pub async fn delete_dir(dir: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {
            tracing::info!(dir = %dir.display(), "directory deleted");
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("error deleting directory {}", dir.display())),
    }
}

pub async fn path_exists(path: &Path) -> Result<bool> {
    match tokio::fs::metadata(path).await {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).with_context(|| format!("error checking path {}", path.display())),
    }
}
