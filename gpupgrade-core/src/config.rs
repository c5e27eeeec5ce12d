//! Persisted configuration and runtime environment.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::topology::Cluster;

/// The default port of the hub.
pub const DEFAULT_HUB_PORT: u16 = 7527;
/// The default port of every agent.
pub const DEFAULT_AGENT_PORT: u16 = 6416;
/// The time allowed for a single dial of an agent or the hub.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(3);

/// The name of the hub's configuration file within the state directory.
pub const CONFIG_FILE: &str = "config.json";
/// The name of the CLI's bootstrap configuration file within the state directory.
pub const TEMPORARY_CONFIG_FILE: &str = "config.json.tmp";
/// The name of the substep status log within the state directory.
pub const STATUS_FILE: &str = "status.jsonl";

/// Whether the upgrade copies data files or hard-links them from the source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Copy,
    Link,
}

impl Default for Mode {
    fn default() -> Self {
        Self::Copy
    }
}

impl Mode {
    /// The fraction of each data directory's filesystem which must be free when none is given.
    ///
    /// A copy duplicates every data file, while a link only writes new catalogs.
    pub fn default_disk_free_ratio(self) -> f64 {
        match self {
            Self::Copy => 0.6,
            Self::Link => 0.2,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Copy => f.write_str("copy"),
            Self::Link => f.write_str("link"),
        }
    }
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(val: &str) -> Result<Self> {
        match val.to_lowercase().as_str() {
            "copy" => Ok(Self::Copy),
            "link" => Ok(Self::Link),
            _ => bail!("invalid mode {:?}, expected one of copy or link", val),
        }
    }
}

/// An identifier unique to one upgrade run.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpgradeId(String);

impl UpgradeId {
    /// Generate a new random upgrade ID: 8 random bytes, URL-safe base64 without padding.
    pub fn generate() -> Self {
        let bytes: [u8; 8] = rand::thread_rng().gen();
        Self(base64::encode_config(bytes, base64::URL_SAFE_NO_PAD))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UpgradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The hub's persisted state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// The directory under which logs are archived once the upgrade finishes or reverts.
    #[serde(default)]
    pub log_archive_dir: PathBuf,

    /// The cluster being upgraded.
    pub source: Option<Cluster>,
    /// The initialized target cluster which is upgraded from the source.
    #[serde(default)]
    pub intermediate: Option<Cluster>,
    /// The upgraded cluster, populated once finalize has swapped directories.
    #[serde(default)]
    pub target: Option<Cluster>,

    pub hub_port: u16,
    #[serde(default = "default_agent_port")]
    pub agent_port: u16,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub use_hba_hostnames: bool,
    pub upgrade_id: UpgradeId,

    /// The installation the source is upgraded to.
    #[serde(default)]
    pub target_gphome: PathBuf,
    /// The version of the target installation.
    #[serde(default)]
    pub target_version: String,
    /// Ports available to the intermediate cluster. Empty means consecutive source ports.
    #[serde(default)]
    pub intermediate_ports: Vec<u16>,
    /// The fraction of each data directory's filesystem which must be free before upgrading.
    #[serde(default)]
    pub disk_free_ratio: f64,
    /// Run pg_upgrade with --verbose.
    #[serde(default)]
    pub pg_upgrade_verbose: bool,
}

fn default_agent_port() -> u16 {
    DEFAULT_AGENT_PORT
}

impl Configuration {
    /// A configuration holding only what is needed to reach the hub and revert early.
    pub fn new(hub_port: u16, source_port: u16, source_gphome: impl Into<PathBuf>) -> Self {
        Self {
            log_archive_dir: PathBuf::new(),
            source: Some(Cluster::bootstrap(source_gphome, source_port)),
            intermediate: None,
            target: None,
            hub_port,
            agent_port: DEFAULT_AGENT_PORT,
            mode: Mode::default(),
            use_hba_hostnames: false,
            upgrade_id: UpgradeId::generate(),
            target_gphome: PathBuf::new(),
            target_version: String::new(),
            intermediate_ports: Vec::new(),
            disk_free_ratio: 0.0,
            pg_upgrade_verbose: false,
        }
    }

    /// The path of the configuration file within the given state directory.
    pub fn path(state_dir: &Path) -> PathBuf {
        state_dir.join(CONFIG_FILE)
    }

    /// Check if a configuration file exists in the given state directory.
    pub async fn exists(state_dir: &Path) -> Result<bool> {
        path_exists(&Self::path(state_dir)).await
    }

    /// Load the configuration from the given state directory.
    pub async fn load(state_dir: &Path) -> Result<Self> {
        let path = Self::path(state_dir);
        let data = tokio::fs::read(&path)
            .await
            .with_context(|| format!("error opening configuration file {}", path.display()))?;
        serde_json::from_slice(&data).with_context(|| format!("error decoding configuration file {}", path.display()))
    }

    /// Atomically persist the configuration to the given state directory.
    pub async fn save(&self, state_dir: &Path) -> Result<()> {
        let data = serde_json::to_vec_pretty(self).context("error encoding configuration")?;
        atomically_write(&Self::path(state_dir), &data).await
    }

    /// Create the configuration file if it does not already exist.
    ///
    /// Returns `true` if a new file was written.
    pub async fn bootstrap(state_dir: &Path, hub_port: u16, source_port: u16, source_gphome: &Path) -> Result<bool> {
        let path = Self::path(state_dir);
        if path_exists(&path).await? {
            tracing::info!(path = %path.display(), "configuration file already present, skipping");
            return Ok(false);
        }
        Self::new(hub_port, source_port, source_gphome).save(state_dir).await?;
        Ok(true)
    }

    /// The source cluster, or an error if initialize has not recorded it.
    pub fn source(&self) -> Result<&Cluster> {
        self.source.as_ref().context("source cluster is not yet known, run `gpupgrade initialize` first")
    }

    /// The intermediate cluster, or an error if it has not been created.
    pub fn intermediate(&self) -> Result<&Cluster> {
        self.intermediate
            .as_ref()
            .context("intermediate cluster has not been created, run `gpupgrade initialize` first")
    }

    /// The hosts on which agents run.
    pub fn agent_hosts(&self) -> Vec<String> {
        self.source.as_ref().map(Cluster::agent_hosts).unwrap_or_default()
    }
}

/// The bootstrap configuration written by the CLI before the hub exists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporaryConfig {
    #[serde(rename = "GPHome")]
    pub gphome: PathBuf,
    #[serde(rename = "Port")]
    pub port: u16,
}

impl TemporaryConfig {
    pub fn path(state_dir: &Path) -> PathBuf {
        state_dir.join(TEMPORARY_CONFIG_FILE)
    }

    pub async fn exists(state_dir: &Path) -> Result<bool> {
        path_exists(&Self::path(state_dir)).await
    }

    pub async fn load(state_dir: &Path) -> Result<Self> {
        let path = Self::path(state_dir);
        let data = tokio::fs::read(&path)
            .await
            .with_context(|| format!("error opening temporary configuration file {}", path.display()))?;
        serde_json::from_slice(&data)
            .with_context(|| format!("error decoding temporary configuration file {}", path.display()))
    }

    pub async fn save(&self, state_dir: &Path) -> Result<()> {
        let data = serde_json::to_vec_pretty(self).context("error encoding temporary configuration")?;
        atomically_write(&Self::path(state_dir), &data).await
    }

    /// Remove the temporary configuration, if present.
    pub async fn remove(state_dir: &Path) -> Result<()> {
        let path = Self::path(state_dir);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("error removing {}", path.display())),
        }
    }
}

/// Write the given data to `path` such that a partial file is never observable.
///
/// The data is written and synced to a sibling temporary file which is then renamed over `path`.
pub async fn atomically_write(path: &Path, data: &[u8]) -> Result<()> {
    let suffix: u32 = rand::thread_rng().gen();
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(".{:08x}", suffix));
    let tmp = PathBuf::from(tmp);

    let res = async {
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .with_context(|| format!("error creating {}", tmp.display()))?;
        file.write_all(data).await.with_context(|| format!("error writing {}", tmp.display()))?;
        file.sync_all().await.with_context(|| format!("error syncing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("error renaming {} to {}", tmp.display(), path.display()))
    }
    .await;
    if res.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    res
}

async fn path_exists(path: &Path) -> Result<bool> {
    match tokio::fs::metadata(path).await {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).with_context(|| format!("error checking path {}", path.display())),
    }
}

/// Environment variables, all prefixed with `GPUPGRADE_`.
#[derive(Clone, Debug, Default, Deserialize)]
struct EnvVars {
    /// Overrides the state directory.
    home: Option<PathBuf>,
    /// Overrides the log directory.
    log_dir: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct UserEnv {
    home: Option<PathBuf>,
}

/// The runtime environment of every gpupgrade process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Env {
    /// The directory holding the configuration and the substep status log.
    pub state_dir: PathBuf,
    /// The directory holding the logs of every gpupgrade process.
    pub log_dir: PathBuf,
}

impl Env {
    /// Build the runtime environment from the process environment.
    pub fn new() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Build the runtime environment from the given variables.
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Result<Self> {
        let vars: Vec<(String, String)> = vars.into_iter().collect();
        let overrides: EnvVars = envy::prefixed("GPUPGRADE_")
            .from_iter(vars.clone())
            .context("error reading GPUPGRADE_* environment")?;
        let user: UserEnv = envy::from_iter(vars).context("error reading HOME from environment")?;

        let home = || user.home.clone().context("HOME must be set when GPUPGRADE_HOME or GPUPGRADE_LOG_DIR are not");
        let state_dir = match overrides.home {
            Some(dir) => dir,
            None => home()?.join(".gpupgrade"),
        };
        let log_dir = match overrides.log_dir {
            Some(dir) => dir,
            None => home()?.join("gpAdminLogs").join("gpupgrade"),
        };
        Ok(Self { state_dir, log_dir })
    }

    /// The directory under which this run's logs are archived.
    pub fn log_archive_dir(&self, upgrade_id: &UpgradeId) -> PathBuf {
        let parent = self.log_dir.parent().unwrap_or(&self.log_dir);
        parent.join(format!("gpupgrade-{}", upgrade_id))
    }
}
