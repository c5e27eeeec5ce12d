//! Discovery of the source cluster through its coordinator.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tokio::process::Command;

use gpupgrade_core::topology::{Role, Segment};

/// Every segment of the cluster, as `|` separated unaligned rows.
const SEGMENT_QUERY: &str =
    "SELECT dbid, content, role, port, hostname, datadir FROM gp_segment_configuration ORDER BY content, role DESC";

/// Read the segment configuration from the coordinator listening on `port`.
pub async fn query_segments(gphome: &Path, port: u16) -> Result<Vec<Segment>> {
    let psql = gphome.join("bin").join("psql");
    let output = Command::new(&psql)
        .args(&["-X", "-A", "-t", "-F", "|", "-d", "postgres", "-p"])
        .arg(port.to_string())
        .args(&["-c", SEGMENT_QUERY])
        .output()
        .await
        .with_context(|| format!("error running {}", psql.display()))?;
    if !output.status.success() {
        bail!(
            "error querying segment configuration on port {} ({}): {}",
            port,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    parse_segments(&String::from_utf8_lossy(&output.stdout))
}

/// Parse the rows produced by the segment query.
pub fn parse_segments(output: &str) -> Result<Vec<Segment>> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| parse_row(line).with_context(|| format!("error parsing segment row {:?}", line)))
        .collect()
}

fn parse_row(line: &str) -> Result<Segment> {
    let fields: Vec<&str> = line.split('|').collect();
    if fields.len() != 6 {
        bail!("expected 6 fields, found {}", fields.len());
    }
    let role = match fields[2] {
        "p" => Role::Primary,
        "m" => Role::Mirror,
        other => bail!("unknown role {:?}", other),
    };
    Ok(Segment {
        db_id: fields[0].parse().context("invalid dbid")?,
        content_id: fields[1].parse().context("invalid content ID")?,
        role,
        port: fields[3].parse().context("invalid port")?,
        hostname: fields[4].to_string(),
        data_dir: PathBuf::from(fields[5]),
    })
}

/// Read the version of the installation at `gphome`.
pub async fn query_version(gphome: &Path) -> Result<String> {
    let postgres = gphome.join("bin").join("postgres");
    let output = Command::new(&postgres)
        .arg("--gp-version")
        .output()
        .await
        .with_context(|| format!("error running {}", postgres.display()))?;
    if !output.status.success() {
        bail!("error reading version of {} ({})", gphome.display(), output.status);
    }
    parse_version(&String::from_utf8_lossy(&output.stdout))
}

/// Extract the version from output such as `postgres (Greenplum Database) 6.20.0 build commit:...`.
pub fn parse_version(output: &str) -> Result<String> {
    let rest = match output.find(')') {
        Some(idx) => &output[idx + 1..],
        None => output,
    };
    rest.split_whitespace()
        .find(|word| word.chars().next().map_or(false, |c| c.is_ascii_digit()))
        .map(str::to_string)
        .with_context(|| format!("no version found in {:?}", output.trim()))
}

/// The oldest major version which can be upgraded.
const MIN_SOURCE_MAJOR: u32 = 5;

/// Check that the installation at `target_gphome` can upgrade the one at `source_gphome`.
pub async fn check_versions(source_gphome: &Path, target_gphome: &Path) -> Result<()> {
    let source = query_version(source_gphome).await?;
    let target = query_version(target_gphome).await?;
    verify_compatible_versions(&source, &target)
}

/// Only a source of a supported major version upgrades, and only to the next major version.
pub fn verify_compatible_versions(source: &str, target: &str) -> Result<()> {
    let source_major = major_version(source)?;
    let target_major = major_version(target)?;
    if source_major < MIN_SOURCE_MAJOR {
        bail!(
            "source version {} is not supported, the source must be version {} or later",
            source,
            MIN_SOURCE_MAJOR
        );
    }
    if target_major != source_major + 1 {
        bail!(
            "can not upgrade from version {} to version {}, the target must be version {}",
            source,
            target,
            source_major + 1
        );
    }
    tracing::debug!(%source, %target, "versions are compatible");
    Ok(())
}

fn major_version(version: &str) -> Result<u32> {
    version
        .split('.')
        .next()
        .unwrap_or_default()
        .parse()
        .with_context(|| format!("invalid version {:?}", version))
}
