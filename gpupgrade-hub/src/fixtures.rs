//! Agents, dialers and hubs shared by the hub's tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tempfile::TempDir;
use tokio::sync::broadcast;

use crate::agents::AgentLauncher;
use crate::server::{Hub, HubDeps};
use crate::session::{dial_agent, AgentConn, Dialer};
use gpupgrade_agent::{AgentConfig, App as AgentApp, UpgradeTask, UpgradeTool};
use gpupgrade_core::config::{Configuration, Env};
use gpupgrade_core::grpc;
use gpupgrade_core::topology::{Role, Segment};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// An upgrade tool which records its tasks.
#[derive(Default)]
pub(crate) struct FakeUpgrade {
    pub tasks: Mutex<Vec<UpgradeTask>>,
}

#[tonic::async_trait]
impl UpgradeTool for FakeUpgrade {
    async fn upgrade(&self, task: UpgradeTask) -> Result<()> {
        lock(&self.tasks).push(task);
        Ok(())
    }
}

/// A real agent running on a runtime of its own thread, so that killing it closes its sockets.
pub(crate) struct ThreadAgent {
    pub port: u16,
    shutdown: broadcast::Sender<()>,
    thread: Option<std::thread::JoinHandle<Result<()>>>,
    _dir: TempDir,
}

impl ThreadAgent {
    pub fn start() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let state_dir = dir.path().join("state");
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let thread = std::thread::spawn(move || -> Result<()> {
            let rt = tokio::runtime::Builder::new_multi_thread().worker_threads(1).enable_all().build()?;
            rt.block_on(async move {
                let app = AgentApp::new(AgentConfig { port: 0, state_dir }, Arc::new(FakeUpgrade::default())).await?;
                let _ = ready_tx.send((app.local_addr().port(), app.shutdown_handle()));
                app.run().await
            })
        });
        let (port, shutdown) = ready_rx.recv_timeout(Duration::from_secs(10)).context("agent thread never started")?;
        Ok(Self {
            port,
            shutdown,
            thread: Some(thread),
            _dir: dir,
        })
    }

    /// Wait for the agent's runtime to be torn down, once it has been asked to stop.
    pub async fn join(&mut self) -> Result<()> {
        let thread = match self.thread.take() {
            Some(thread) => thread,
            None => return Ok(()),
        };
        match tokio::task::spawn_blocking(move || thread.join()).await? {
            Ok(res) => res,
            Err(_) => bail!("agent thread panicked"),
        }
    }

    /// Stop the agent and tear down its runtime.
    pub async fn kill(&mut self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.join().await
    }
}

impl Drop for ThreadAgent {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
    }
}

/// Dials agents on the loopback interface by hostname.
#[derive(Default)]
pub(crate) struct TestDialer {
    routes: Mutex<HashMap<String, u16>>,
    blocked: Mutex<HashSet<String>>,
    dials: Mutex<HashMap<String, usize>>,
}

impl TestDialer {
    /// Route dials of `host` to the agent listening on the given local port.
    pub fn route(&self, host: &str, port: u16) {
        lock(&self.routes).insert(host.into(), port);
    }

    /// Make every dial of `host` hang.
    pub fn block(&self, host: &str) {
        lock(&self.blocked).insert(host.into());
    }

    pub fn dials(&self, host: &str) -> usize {
        lock(&self.dials).get(host).copied().unwrap_or(0)
    }
}

#[tonic::async_trait]
impl Dialer for TestDialer {
    async fn dial(&self, host: &str, _port: u16) -> Result<AgentConn> {
        *lock(&self.dials).entry(host.into()).or_insert(0) += 1;
        let blocked = lock(&self.blocked).contains(host);
        if blocked {
            futures::future::pending::<()>().await;
        }
        let port = lock(&self.routes).get(host).copied();
        let port = port.with_context(|| format!("no route to host {}", host))?;
        dial_agent(host, format!("127.0.0.1:{}", port)).await
    }
}

/// Launches agents by starting a local agent and routing its host to it.
pub(crate) struct FakeLauncher {
    dialer: Arc<TestDialer>,
    pub failing: HashSet<String>,
    pub launched: Mutex<Vec<(String, u16, PathBuf)>>,
    agents: Mutex<Vec<ThreadAgent>>,
}

impl FakeLauncher {
    pub fn new(dialer: Arc<TestDialer>) -> Self {
        Self {
            dialer,
            failing: HashSet::new(),
            launched: Mutex::new(Vec::new()),
            agents: Mutex::new(Vec::new()),
        }
    }

    pub fn launched_hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = lock(&self.launched).iter().map(|(host, _, _)| host.clone()).collect();
        hosts.sort();
        hosts
    }
}

#[tonic::async_trait]
impl AgentLauncher for FakeLauncher {
    async fn launch(&self, host: &str, port: u16, state_dir: &Path) -> Result<()> {
        lock(&self.launched).push((host.into(), port, state_dir.to_path_buf()));
        if self.failing.contains(host) {
            bail!("ssh: connect to host {} port 22: Connection refused", host);
        }
        let agent = tokio::task::spawn_blocking(ThreadAgent::start).await??;
        self.dialer.route(host, agent.port);
        lock(&self.agents).push(agent);
        Ok(())
    }
}

pub(crate) fn segment(db_id: i32, content_id: i32, role: Role, hostname: &str, data_dir: &Path) -> Segment {
    Segment {
        db_id,
        content_id,
        role,
        port: (25432 + db_id) as u16,
        hostname: hostname.into(),
        data_dir: data_dir.to_path_buf(),
    }
}

/// A hub over a temporary state directory, along with its fakes.
pub(crate) struct TestHub {
    pub hub: Hub,
    pub dir: TempDir,
    pub dialer: Arc<TestDialer>,
    pub launcher: Arc<FakeLauncher>,
    pub upgrade: Arc<FakeUpgrade>,
}

impl TestHub {
    pub async fn new() -> Result<Self> {
        Self::with_launcher(|_| ()).await
    }

    /// Build a hub, adjusting its launcher before it is shared.
    pub async fn with_launcher(adjust: impl FnOnce(&mut FakeLauncher)) -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let env = Env {
            state_dir: dir.path().join("state"),
            log_dir: dir.path().join("logs").join("gpupgrade"),
        };
        tokio::fs::create_dir_all(&env.state_dir).await?;
        let config = Configuration::new(0, 5432, "/usr/local/gpdb5");
        config.save(&env.state_dir).await?;

        let dialer = Arc::new(TestDialer::default());
        let mut launcher = FakeLauncher::new(dialer.clone());
        adjust(&mut launcher);
        let launcher = Arc::new(launcher);
        let upgrade = Arc::new(FakeUpgrade::default());
        let deps = HubDeps {
            dialer: dialer.clone(),
            launcher: launcher.clone(),
            upgrade: upgrade.clone(),
            dial_timeout: Duration::from_millis(500),
        };
        let hub = Hub::load(env, deps).await?;
        Ok(Self {
            hub,
            dir,
            dialer,
            launcher,
            upgrade,
        })
    }

    pub fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    /// The data directory of a source segment.
    pub fn data_dir(&self, name: &str) -> PathBuf {
        self.dir.path().join("data").join(name)
    }

    /// A source cluster with the coordinator on the hub's host and one primary on each of two hosts.
    pub fn source_segments(&self) -> Vec<grpc::Segment> {
        vec![
            segment(1, -1, Role::Primary, "cdw", &self.data_dir("qddir")),
            segment(2, 0, Role::Primary, "sdw1", &self.data_dir("seg0")),
            segment(3, 1, Role::Primary, "sdw2", &self.data_dir("seg1")),
        ]
        .iter()
        .map(grpc::Segment::from)
        .collect()
    }

    pub fn initialize_request(&self) -> grpc::InitializeRequest {
        grpc::InitializeRequest {
            agent_port: 6416,
            source_gphome: "/usr/local/gpdb5".into(),
            target_gphome: "/usr/local/gpdb6".into(),
            source_port: 25433,
            mode: grpc::Mode::Link as i32,
            use_hba_hostnames: false,
            ports: vec![50432, 50433, 50434],
            source_segments: self.source_segments(),
            source_version: "5.28.0".into(),
            target_version: "6.20.0".into(),
            disk_free_ratio: 0.0,
        }
    }
}
