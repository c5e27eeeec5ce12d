//! Prepare the source cluster for an upgrade.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use structopt::StructOpt;

use crate::client::connect_hub;
use crate::cmd;
use crate::migration::{apply_scripts, Psql, ScriptPhase};
use crate::segments::{check_versions, query_segments, query_version};
use crate::Gpupgrade;
use gpupgrade_core::config::{Configuration, Env, Mode, TemporaryConfig};
use gpupgrade_core::grpc;
use gpupgrade_core::step::{Outcome, Phase, StepOptions, Substep};

/// Prepare the source cluster for an upgrade and create the intermediate cluster.
#[derive(StructOpt)]
#[structopt(name = "initialize")]
pub struct Initialize {
    /// The installation of the source cluster.
    #[structopt(long, parse(from_os_str))]
    pub(crate) source_gphome: PathBuf,
    /// The installation to upgrade to.
    #[structopt(long, parse(from_os_str))]
    pub(crate) target_gphome: PathBuf,
    /// The port of the source cluster's coordinator.
    #[structopt(long)]
    pub(crate) source_master_port: u16,
    /// Whether data files are copied or hard-linked into the upgraded cluster.
    #[structopt(long, default_value = "copy")]
    pub(crate) mode: Mode,
    /// The fraction of each data directory's filesystem which must be free, from 0.0 to 1.0.
    /// Defaults to 0.6 in copy mode and 0.2 in link mode.
    #[structopt(long)]
    pub(crate) disk_free_ratio: Option<f64>,
    /// The port on which the hub serves the CLI.
    #[structopt(long, default_value = "7527")]
    pub(crate) hub_port: u16,
    /// The port on which every agent serves the hub.
    #[structopt(long, default_value = "6416")]
    pub(crate) agent_port: u16,
    /// Ports for the intermediate cluster, such as `50432-50440,50450`.
    #[structopt(long)]
    pub(crate) temp_port_range: Option<PortList>,
    /// Use hostnames rather than addresses in the upgraded cluster's pg_hba.conf.
    #[structopt(long)]
    pub(crate) use_hba_hostnames: bool,
    /// The dynamic library path of the upgraded cluster.
    #[structopt(long, default_value = "")]
    pub(crate) dynamic_library_path: String,
    /// A directory of generated data migration scripts to apply.
    #[structopt(long, parse(from_os_str))]
    pub(crate) input_dir: Option<PathBuf>,
    /// Run pg_upgrade with --verbose. Requires --verbose.
    #[structopt(long)]
    pub(crate) pg_upgrade_verbose: bool,
    /// Do not check that the target installation can upgrade the source installation.
    #[structopt(long)]
    pub(crate) skip_version_check: bool,
    /// Do not prompt for confirmation.
    #[structopt(long)]
    pub(crate) non_interactive: bool,
}

impl Initialize {
    pub async fn run(&self, base: &Gpupgrade) -> Result<()> {
        let disk_free_ratio = self.check_flags(base.verbose)?;
        let env = Env::new()?;
        let opts = StepOptions {
            verbose: base.verbose,
            non_interactive: self.non_interactive,
        };
        tokio::fs::create_dir_all(&env.state_dir)
            .await
            .with_context(|| format!("error creating state directory {}", env.state_dir.display()))?;

        let mut step = cmd::begin(Phase::Initialize, &env, opts, &self.confirmation(disk_free_ratio)).await?;
        if !self.skip_version_check {
            step.run_internal_substep(check_versions(&self.source_gphome, &self.target_gphome)).await;
        }
        step.run_cli_substep(Substep::CreateStateDirectory, self.create_state_dir(&env)).await;
        step.run_cli_substep(Substep::StartHub, self.bootstrap_hub(&env)).await;
        step.run_hub_substep(Substep::SaveSourceClusterConfig, self.save_source(&env, disk_free_ratio))
            .await;
        step.run_hub_substep(Substep::StartAgents, self.start_agents(&env)).await;
        let run_scripts = self.input_dir.is_some() && !self.non_interactive;
        step.run_cli_substep_conditionally(
            Substep::ExecuteStatsDataMigrationScripts,
            run_scripts,
            self.apply_scripts(ScriptPhase::Stats),
        )
        .await;
        step.run_cli_substep_conditionally(
            Substep::ExecuteInitializeDataMigrationScripts,
            run_scripts,
            self.apply_scripts(ScriptPhase::Initialize),
        )
        .await;
        let mut created = None;
        step.run_hub_substep(Substep::CreateIntermediateCluster, self.create_cluster(&env, &mut created))
            .await;

        let mut message = String::from(
            "Initialize completed successfully.\n\n\
             NEXT ACTIONS\n\
             ------------\n\
             To proceed with the upgrade, run \"gpupgrade execute\"\n\
             followed by \"gpupgrade finalize\".\n\n\
             To return the cluster to its original state, run \"gpupgrade revert\".",
        );
        if let Some(created) = &created {
            if self.mode == Mode::Link && !created.has_all_mirrors_and_standby {
                message.push_str(
                    "\n\nWARNING: the source cluster does not have a mirror for every primary and a standby. \
                     In link mode, \"gpupgrade revert\" is only possible until \"gpupgrade execute\" starts.",
                );
            }
        }
        step.complete(&message).await
    }

    /// Validate flags which depend on each other, returning the disk free ratio to require.
    pub(crate) fn check_flags(&self, verbose: bool) -> Result<f64> {
        if self.pg_upgrade_verbose && !verbose {
            bail!("expected --verbose when using --pg-upgrade-verbose");
        }
        let ratio = self.disk_free_ratio.unwrap_or_else(|| self.mode.default_disk_free_ratio());
        if !(0.0..=1.0).contains(&ratio) {
            bail!("invalid argument {} for \"--disk-free-ratio\" flag: value must be between 0.0 and 1.0", ratio);
        }
        Ok(ratio)
    }

    fn confirmation(&self, disk_free_ratio: f64) -> String {
        format!(
            "\ngpupgrade initialize will perform a series of checks and create the intermediate cluster.\n\n\
             \x20 source installation:  {}\n\
             \x20 source port:          {}\n\
             \x20 target installation:  {}\n\
             \x20 mode:                 {}\n\
             \x20 disk free ratio:      {}\n\
             \x20 hub port:             {}\n\
             \x20 agent port:           {}",
            self.source_gphome.display(),
            self.source_master_port,
            self.target_gphome.display(),
            self.mode,
            disk_free_ratio,
            self.hub_port,
            self.agent_port,
        )
    }

    async fn create_state_dir(&self, env: &Env) -> Result<Outcome> {
        tokio::fs::create_dir_all(&env.state_dir)
            .await
            .with_context(|| format!("error creating state directory {}", env.state_dir.display()))?;
        if !Configuration::exists(&env.state_dir).await? {
            let bootstrap = TemporaryConfig {
                gphome: self.source_gphome.clone(),
                port: self.source_master_port,
            };
            bootstrap.save(&env.state_dir).await?;
        }
        Ok(Outcome::Success)
    }

    async fn bootstrap_hub(&self, env: &Env) -> Result<Outcome> {
        Configuration::bootstrap(&env.state_dir, self.hub_port, self.source_master_port, &self.source_gphome).await?;
        TemporaryConfig::remove(&env.state_dir).await?;
        cmd::start_hub(env).await
    }

    async fn save_source(&self, env: &Env, disk_free_ratio: f64) -> Result<Outcome> {
        cmd::ensure_hub(env).await?;
        let segments = query_segments(&self.source_gphome, self.source_master_port).await?;
        let source_version = query_version(&self.source_gphome).await?;
        let target_version = query_version(&self.target_gphome).await?;
        let ports = match &self.temp_port_range {
            Some(ports) => ports.0.iter().map(|port| u32::from(*port)).collect(),
            None => Vec::new(),
        };
        let req = grpc::InitializeRequest {
            agent_port: u32::from(self.agent_port),
            source_gphome: self.source_gphome.to_string_lossy().into_owned(),
            target_gphome: self.target_gphome.to_string_lossy().into_owned(),
            source_port: u32::from(self.source_master_port),
            mode: grpc::Mode::from(self.mode) as i32,
            use_hba_hostnames: self.use_hba_hostnames,
            ports,
            source_segments: segments.iter().map(grpc::Segment::from).collect(),
            source_version,
            target_version,
            disk_free_ratio,
        };
        connect_hub(self.hub_port)
            .await?
            .initialize(req)
            .await
            .context("error saving source cluster configuration")?;
        Ok(Outcome::Success)
    }

    async fn start_agents(&self, env: &Env) -> Result<Outcome> {
        cmd::ensure_hub(env).await?;
        let reply = connect_hub(self.hub_port)
            .await?
            .restart_agents(grpc::RestartAgentsRequest {})
            .await
            .context("error starting agents")?
            .into_inner();
        tracing::info!(hosts = ?reply.agent_hosts, "agents started");
        Ok(Outcome::Success)
    }

    async fn apply_scripts(&self, phase: ScriptPhase) -> Result<Outcome> {
        let input_dir = match &self.input_dir {
            Some(dir) => dir,
            None => return Ok(Outcome::Skip),
        };
        let runner = Psql {
            gphome: self.source_gphome.clone(),
            port: self.source_master_port,
        };
        let applied = apply_scripts(input_dir, phase, &runner).await?;
        tracing::info!(applied, %phase, "data migration scripts applied");
        Ok(Outcome::Success)
    }

    async fn create_cluster(
        &self, env: &Env, created: &mut Option<grpc::InitializeCreateClusterResponse>,
    ) -> Result<Outcome> {
        cmd::ensure_hub(env).await?;
        let req = grpc::InitializeCreateClusterRequest {
            dynamic_library_path: self.dynamic_library_path.clone(),
            pg_upgrade_verbose: self.pg_upgrade_verbose,
        };
        let res = connect_hub(self.hub_port)
            .await?
            .initialize_create_cluster(req)
            .await
            .context("error creating intermediate cluster")?;
        *created = Some(res.into_inner());
        Ok(Outcome::Success)
    }
}

/// A list of ports given as comma separated ports and inclusive ranges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortList(pub Vec<u16>);

impl FromStr for PortList {
    type Err = anyhow::Error;

    fn from_str(val: &str) -> Result<Self> {
        let mut ports = Vec::new();
        for part in val.split(',').map(str::trim).filter(|part| !part.is_empty()) {
            match part.split_once('-') {
                Some((start, end)) => {
                    let invalid = || format!("invalid port range {:?}", part);
                    let start: u16 = start.trim().parse().with_context(invalid)?;
                    let end: u16 = end.trim().parse().with_context(invalid)?;
                    if start > end {
                        bail!("invalid port range {:?}: start is after end", part);
                    }
                    ports.extend(start..=end);
                }
                None => ports.push(part.parse().with_context(|| format!("invalid port {:?}", part))?),
            }
        }
        if ports.is_empty() {
            bail!("no ports given");
        }
        Ok(Self(ports))
    }
}

