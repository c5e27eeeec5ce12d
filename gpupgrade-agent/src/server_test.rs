use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tempfile::TempDir;
use tonic::transport::Channel;

use crate::app::{AgentConfig, App};
use crate::upgrade::{UpgradeTask, UpgradeTool};
use gpupgrade_core::grpc;
use gpupgrade_core::topology::{Role, Segment};

/// An upgrade tool which records its tasks and fails for one content ID.
#[derive(Default)]
struct FakeUpgrade {
    tasks: Mutex<Vec<UpgradeTask>>,
    fail_content: Option<i32>,
}

#[tonic::async_trait]
impl UpgradeTool for FakeUpgrade {
    async fn upgrade(&self, task: UpgradeTask) -> Result<()> {
        let content_id = task.source.content_id;
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.push(task);
        }
        if self.fail_content == Some(content_id) {
            bail!("pg_upgrade --check found incompatibilities");
        }
        Ok(())
    }
}

async fn start_agent(upgrade: Arc<FakeUpgrade>) -> Result<(TempDir, grpc::AgentClient<Channel>)> {
    let dir = tempfile::tempdir()?;
    let config = AgentConfig {
        port: 0,
        state_dir: dir.path().join("state"),
    };
    let app = App::new(config, upgrade).await?;
    let port = app.local_addr().port();
    let _handle = app.spawn();
    let client = grpc::AgentClient::connect(format!("http://127.0.0.1:{}", port))
        .await
        .context("error connecting to agent")?;
    Ok((dir, client))
}

fn segment(db_id: i32, content_id: i32, port: u16, data_dir: &Path) -> grpc::Segment {
    grpc::Segment::from(&Segment {
        db_id,
        content_id,
        role: Role::Primary,
        port,
        hostname: "sdw1".into(),
        data_dir: data_dir.to_path_buf(),
    })
}

fn dir_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[tokio::test]
async fn check_environment_requires_every_data_dir() -> Result<()> {
    let (dir, mut client) = start_agent(Arc::new(FakeUpgrade::default())).await?;
    let present = dir.path().join("seg0");
    std::fs::create_dir(&present)?;
    let missing = dir.path().join("seg1");

    let req = grpc::CheckEnvironmentRequest {
        data_dirs: vec![dir_string(&present)],
        ..Default::default()
    };
    client.check_environment(req).await?;

    let res = client
        .check_environment(grpc::CheckEnvironmentRequest {
            data_dirs: vec![dir_string(&present), dir_string(&missing)],
            ..Default::default()
        })
        .await;
    let status = match res {
        Ok(_) => bail!("expected missing data dir to fail the check"),
        Err(status) => status,
    };
    assert!(status.message().contains("seg1"), "expected error to name the missing dir, got {}", status.message());
    Ok(())
}

#[tokio::test]
async fn check_environment_requires_free_disk_space() -> Result<()> {
    let (dir, mut client) = start_agent(Arc::new(FakeUpgrade::default())).await?;
    let data_dir = dir.path().join("seg0");
    std::fs::create_dir(&data_dir)?;

    let res = client
        .check_environment(grpc::CheckEnvironmentRequest {
            data_dirs: vec![dir_string(&data_dir)],
            disk_free_ratio: 1.0,
        })
        .await;

    let status = match res {
        Ok(_) => bail!("expected a filesystem with used space to fail a 100% free requirement"),
        Err(status) => status,
    };
    assert!(status.message().contains("seg0"), "expected error to name the data dir, got {}", status.message());
    Ok(())
}

#[tokio::test]
async fn create_data_directories_is_idempotent() -> Result<()> {
    let (dir, mut client) = start_agent(Arc::new(FakeUpgrade::default())).await?;
    let data_dir = dir.path().join("primary").join("seg0.AbC.0");
    let req = grpc::CreateDataDirectoriesRequest { data_dirs: vec![dir_string(&data_dir)] };

    client.create_data_directories(req.clone()).await?;
    client.create_data_directories(req).await?;

    let meta = std::fs::metadata(&data_dir)?;
    assert!(meta.is_dir(), "expected data dir to be created");
    let mode = meta.permissions().mode() & 0o777;
    assert!(mode == 0o700, "expected mode 0700, got {:o}", mode);
    Ok(())
}

#[tokio::test]
async fn upgrade_primaries_runs_every_pair_and_aggregates_failures() -> Result<()> {
    let upgrade = Arc::new(FakeUpgrade {
        fail_content: Some(1),
        ..Default::default()
    });
    let (dir, mut client) = start_agent(upgrade.clone()).await?;
    let pair = |content: i32| {
        let source_dir = dir.path().join(format!("seg{}", content));
        let target_dir = dir.path().join(format!("seg{}.AbC.{}", content, content));
        grpc::SegmentPair {
            source: Some(segment(content + 2, content, 25432 + content as u16, &source_dir)),
            target: Some(segment(content + 2, content, 50434 + content as u16, &target_dir)),
        }
    };
    let req = grpc::UpgradePrimariesRequest {
        mode: grpc::Mode::Link as i32,
        source_gphome: "/usr/local/gpdb5".into(),
        target_gphome: "/usr/local/gpdb6".into(),
        check_only: true,
        pairs: vec![pair(0), pair(1), pair(2)],
        verbose: true,
    };

    let res = client.upgrade_primaries(req).await;

    let status = match res {
        Ok(_) => bail!("expected failing pair to fail the request"),
        Err(status) => status,
    };
    assert!(status.message().contains("content 1"), "expected error to name content 1, got {}", status.message());
    let tasks = match upgrade.tasks.lock() {
        Ok(tasks) => tasks.clone(),
        Err(_) => bail!("fake upgrade lock poisoned"),
    };
    let mut contents: Vec<i32> = tasks.iter().map(|task| task.source.content_id).collect();
    contents.sort_unstable();
    assert!(contents == vec![0, 1, 2], "expected every pair to be attempted, got {:?}", contents);
    assert!(tasks.iter().all(|task| task.check_only), "expected check only tasks");
    assert!(tasks.iter().all(|task| task.verbose), "expected verbose to be threaded through");
    assert!(
        tasks.iter().all(|task| task.mode == gpupgrade_core::config::Mode::Link),
        "expected link mode to be threaded through"
    );
    Ok(())
}

#[tokio::test]
async fn upgrade_primaries_rejects_unknown_mode() -> Result<()> {
    let (_dir, mut client) = start_agent(Arc::new(FakeUpgrade::default())).await?;

    let res = client.upgrade_primaries(grpc::UpgradePrimariesRequest::default()).await;

    let status = match res {
        Ok(_) => bail!("expected unknown mode to be rejected"),
        Err(status) => status,
    };
    assert!(status.code() == tonic::Code::InvalidArgument, "expected invalid argument, got {:?}", status.code());
    Ok(())
}

#[tokio::test]
async fn rename_directories_swaps_and_resumes() -> Result<()> {
    let (dir, mut client) = start_agent(Arc::new(FakeUpgrade::default())).await?;
    let source = dir.path().join("seg0");
    let archive = dir.path().join("seg0_AbC");
    let intermediate = dir.path().join("seg0.AbC.0");
    std::fs::create_dir(&source)?;
    std::fs::write(source.join("PG_VERSION"), "8.3")?;
    std::fs::create_dir(&intermediate)?;
    std::fs::write(intermediate.join("PG_VERSION"), "9.4")?;
    let req = grpc::RenameDirectoriesRequest {
        pairs: vec![
            grpc::DirectoryPair { source: dir_string(&source), target: dir_string(&archive) },
            grpc::DirectoryPair { source: dir_string(&intermediate), target: dir_string(&source) },
        ],
    };

    client.rename_directories(req.clone()).await?;
    client.rename_directories(req).await?;

    let version = std::fs::read_to_string(source.join("PG_VERSION"))?;
    assert!(version == "9.4", "expected upgraded data in source location, got {}", version);
    let archived = std::fs::read_to_string(archive.join("PG_VERSION"))?;
    assert!(archived == "8.3", "expected old data archived, got {}", archived);
    assert!(!intermediate.exists(), "expected intermediate dir to be moved");
    Ok(())
}

#[tokio::test]
async fn rename_directories_fails_when_both_paths_are_missing() -> Result<()> {
    let (dir, mut client) = start_agent(Arc::new(FakeUpgrade::default())).await?;
    let req = grpc::RenameDirectoriesRequest {
        pairs: vec![grpc::DirectoryPair {
            source: dir_string(&dir.path().join("nope")),
            target: dir_string(&dir.path().join("nada")),
        }],
    };

    let res = client.rename_directories(req).await;
    assert!(res.is_err(), "expected rename of missing dirs to fail");
    Ok(())
}

#[tokio::test]
async fn delete_directories_ignores_missing() -> Result<()> {
    let (dir, mut client) = start_agent(Arc::new(FakeUpgrade::default())).await?;
    let present = dir.path().join("seg0.AbC.0");
    std::fs::create_dir_all(present.join("base"))?;
    let missing = dir.path().join("seg1.AbC.1");

    client
        .delete_directories(grpc::DeleteDirectoriesRequest {
            dirs: vec![dir_string(&present), dir_string(&missing)],
        })
        .await?;

    assert!(!present.exists(), "expected directory to be deleted");
    Ok(())
}

#[test]
fn stop_agent_closes_the_transport_without_replying() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let state_dir: PathBuf = dir.path().join("state");
    let (addr_tx, addr_rx) = std::sync::mpsc::channel();

    let agent = std::thread::spawn(move || -> Result<()> {
        let rt = tokio::runtime::Builder::new_multi_thread().worker_threads(1).enable_all().build()?;
        rt.block_on(async move {
            let app = App::new(AgentConfig { port: 0, state_dir }, Arc::new(FakeUpgrade::default())).await?;
            let _ = addr_tx.send(app.local_addr().port());
            app.run().await
        })
    });
    let port = addr_rx.recv_timeout(Duration::from_secs(10))?;

    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    let res = rt.block_on(async move {
        let mut client = grpc::AgentClient::connect(format!("http://127.0.0.1:{}", port)).await?;
        let res = tokio::time::timeout(Duration::from_secs(10), client.stop_agent(grpc::StopAgentRequest {})).await?;
        Ok::<_, anyhow::Error>(res)
    })?;

    assert!(res.is_err(), "expected stop request to end in a transport error, got {:?}", res);
    match agent.join() {
        Ok(res) => res?,
        Err(_) => bail!("agent thread panicked"),
    }
    Ok(())
}
