use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use anyhow::{bail, Result};

use crate::fixtures::{lock, TestHub, ThreadAgent};
use gpupgrade_core::config::{Configuration, Mode};
use gpupgrade_core::topology::{archive_data_dir, intermediate_data_dir, Role};
use gpupgrade_core::{grpc, AppError};

fn write_version(dir: &Path, version: &str) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(dir.join("PG_VERSION"), version)?;
    Ok(())
}

fn read_version(dir: &Path) -> Result<String> {
    Ok(std::fs::read_to_string(dir.join("PG_VERSION"))?)
}

/// A hub with a running agent for each segment host, and the source data directories on disk.
async fn running_hub() -> Result<(TestHub, Vec<ThreadAgent>)> {
    let test = TestHub::new().await?;
    let agents = vec![ThreadAgent::start()?, ThreadAgent::start()?];
    test.dialer.route("sdw1", agents[0].port);
    test.dialer.route("sdw2", agents[1].port);
    for name in ["qddir", "seg0", "seg1"].iter() {
        write_version(&test.data_dir(name), "8.3")?;
    }
    Ok((test, agents))
}

#[tokio::test]
async fn initialize_records_the_source_cluster() -> Result<()> {
    let test = TestHub::new().await?;

    let res = test.hub.initialize_source(test.initialize_request()).await?;

    let source = match res.source {
        Some(source) => source,
        None => bail!("expected the source cluster in the response"),
    };
    assert!(source.segments.len() == 3, "expected 3 segments, got {}", source.segments.len());
    let saved = Configuration::load(&test.state_dir()).await?;
    let cluster = saved.source()?;
    assert!(
        cluster.agent_hosts() == vec!["sdw1".to_string(), "sdw2".to_string()],
        "unexpected agent hosts {:?}",
        cluster.agent_hosts()
    );
    assert!(saved.mode == Mode::Link, "expected link mode, got {}", saved.mode);
    assert!(saved.intermediate_ports == vec![50432, 50433, 50434], "unexpected ports {:?}", saved.intermediate_ports);
    assert!(saved.target_version == "6.20.0", "unexpected target version {}", saved.target_version);
    assert!(saved == test.hub.config().await, "expected the saved and in-memory configurations to agree");
    Ok(())
}

#[tokio::test]
async fn initialize_rejects_invalid_requests() -> Result<()> {
    let test = TestHub::new().await?;
    let cases = vec![
        grpc::InitializeRequest {
            mode: grpc::Mode::UnknownMode as i32,
            ..test.initialize_request()
        },
        grpc::InitializeRequest {
            ports: vec![70000],
            ..test.initialize_request()
        },
        grpc::InitializeRequest {
            source_segments: test.source_segments().into_iter().skip(1).collect(),
            ..test.initialize_request()
        },
        grpc::InitializeRequest {
            source_port: 6000,
            ..test.initialize_request()
        },
        grpc::InitializeRequest {
            disk_free_ratio: 1.5,
            ..test.initialize_request()
        },
    ];

    for req in cases {
        let err = match test.hub.initialize_source(req.clone()).await {
            Ok(_) => bail!("expected request to be rejected: {:?}", req),
            Err(err) => err,
        };
        let status = AppError::grpc(err);
        assert!(
            status.code() == tonic::Code::InvalidArgument,
            "expected invalid argument, got {:?}: {}",
            status.code(),
            status.message()
        );
    }
    let saved = Configuration::load(&test.state_dir()).await?;
    assert!(saved.agent_hosts().is_empty(), "expected rejected requests to leave the configuration untouched");
    Ok(())
}

#[tokio::test]
async fn upgrade_flow_swaps_in_the_upgraded_directories() -> Result<()> {
    let (test, _agents) = running_hub().await?;
    test.hub.initialize_source(test.initialize_request()).await?;

    let created = test
        .hub
        .create_intermediate_cluster(grpc::InitializeCreateClusterRequest {
            dynamic_library_path: "/usr/local/lib".into(),
            pg_upgrade_verbose: true,
        })
        .await?;

    assert!(!created.has_all_mirrors_and_standby, "expected an unmirrored cluster");
    let config = test.hub.config().await;
    assert!(config.pg_upgrade_verbose, "expected pg_upgrade verbosity to be recorded for execute");
    let id = config.upgrade_id.as_str().to_string();
    let intermediate = config.intermediate()?.clone();
    let ports: Vec<u16> = intermediate.segments().iter().map(|seg| seg.port).collect();
    assert!(ports == vec![50432, 50433, 50434], "expected ports from the pool in layout order, got {:?}", ports);
    for (name, content) in [("qddir", -1), ("seg0", 0), ("seg1", 1)].iter() {
        let dir = intermediate_data_dir(&test.data_dir(name), &id, *content);
        let meta = std::fs::metadata(&dir)?;
        assert!(meta.permissions().mode() & 0o777 == 0o700, "expected {} to be private", dir.display());
        write_version(&dir, "9.4")?;
    }
    {
        let tasks = lock(&test.upgrade.tasks);
        assert!(tasks.len() == 1 && tasks[0].check_only, "expected one coordinator check, got {}", tasks.len());
        assert!(tasks[0].source.content_id == -1, "expected the coordinator to be checked on the hub host");
    }

    let executed = test.hub.upgrade_intermediate().await?;
    assert!(executed.intermediate.is_some(), "expected the intermediate cluster in the response");
    {
        let tasks = lock(&test.upgrade.tasks);
        assert!(
            tasks.len() == 2 && !tasks[1].check_only,
            "expected the coordinator to be upgraded, got {} tasks",
            tasks.len()
        );
        assert!(tasks.iter().all(|task| task.verbose), "expected the coordinator runs to be verbose");
        assert!(
            tasks[1].target.role == Role::Primary && tasks[1].target.port == 50432,
            "unexpected coordinator target {:?}",
            tasks[1].target
        );
    }

    let finalized = test.hub.swap_data_directories().await?;
    for name in ["qddir", "seg0", "seg1"].iter() {
        let dir = test.data_dir(name);
        assert!(read_version(&dir)? == "9.4", "expected upgraded data in {}", dir.display());
        assert!(read_version(&archive_data_dir(&dir, &id))? == "8.3", "expected {} to be archived", dir.display());
    }
    let target = match finalized.target {
        Some(target) => target,
        None => bail!("expected the target cluster in the response"),
    };
    assert!(target.gphome == "/usr/local/gpdb6", "unexpected target gphome {}", target.gphome);
    let coordinator_port = target.segments.first().map(|seg| seg.port);
    assert!(
        coordinator_port == Some(25433),
        "expected the target to take over the source ports, got {:?}",
        coordinator_port
    );
    assert!(
        finalized.log_archive_directory.ends_with(&format!("gpupgrade-{}", id)),
        "unexpected log archive directory {}",
        finalized.log_archive_directory
    );

    test.hub.swap_data_directories().await?;
    assert!(read_version(&test.data_dir("seg0"))? == "9.4", "expected finalize to be resumable");
    Ok(())
}

#[tokio::test]
async fn revert_deletes_the_intermediate_cluster() -> Result<()> {
    let (test, _agents) = running_hub().await?;
    test.hub.initialize_source(test.initialize_request()).await?;
    test.hub.create_intermediate_cluster(grpc::InitializeCreateClusterRequest::default()).await?;
    let id = test.hub.config().await.upgrade_id.as_str().to_string();

    let reverted = test.hub.revert_to_source().await?;

    assert!(reverted.source_version == "5.28.0", "unexpected source version {}", reverted.source_version);
    for (name, content) in [("qddir", -1), ("seg0", 0), ("seg1", 1)].iter() {
        let dir = intermediate_data_dir(&test.data_dir(name), &id, *content);
        assert!(!dir.exists(), "expected {} to be deleted", dir.display());
        assert!(read_version(&test.data_dir(name))? == "8.3", "expected source {} untouched", name);
    }
    let saved = Configuration::load(&test.state_dir()).await?;
    assert!(saved.intermediate.is_none(), "expected the intermediate cluster to be forgotten");

    test.hub.revert_to_source().await?;
    Ok(())
}

#[tokio::test]
async fn revert_is_refused_after_finalize() -> Result<()> {
    let (test, _agents) = running_hub().await?;
    test.hub.initialize_source(test.initialize_request()).await?;
    test.hub.create_intermediate_cluster(grpc::InitializeCreateClusterRequest::default()).await?;
    test.hub.swap_data_directories().await?;

    let err = match test.hub.revert_to_source().await {
        Ok(_) => bail!("expected revert after finalize to be refused"),
        Err(err) => err,
    };
    let status = AppError::grpc(err);
    assert!(status.code() == tonic::Code::InvalidArgument, "expected invalid argument, got {:?}", status.code());
    Ok(())
}

#[tokio::test]
async fn restart_agents_starts_missing_agents() -> Result<()> {
    let test = TestHub::new().await?;
    let sdw1 = ThreadAgent::start()?;
    test.dialer.route("sdw1", sdw1.port);
    test.hub.initialize_source(test.initialize_request()).await?;

    let restarted = test.hub.restart_down_agents().await?;

    assert!(restarted == vec!["sdw2".to_string()], "expected sdw2 restarted, got {:?}", restarted);
    let conns = test.hub.agent_conns().await?;
    assert!(conns.len() == 2 && conns.iter().all(|conn| conn.is_ready()), "expected ready connections to both agents");
    let launched = lock(&test.launcher.launched).clone();
    assert!(launched[0].2 == test.state_dir(), "expected the hub's state directory, got {}", launched[0].2.display());
    Ok(())
}

#[tokio::test]
async fn restart_agents_reports_failed_hosts() -> Result<()> {
    let test = TestHub::with_launcher(|launcher| {
        launcher.failing.insert("sdw2".into());
    })
    .await?;
    test.hub.initialize_source(test.initialize_request()).await?;

    let err = match test.hub.restart_down_agents().await {
        Ok(hosts) => bail!("expected a failed launch to fail the restart, restarted {:?}", hosts),
        Err(err) => err,
    };

    let msg = format!("{:#}", err);
    assert!(
        msg.contains("restarted: [sdw1]") && msg.contains("sdw2"),
        "expected restarted and failed hosts, got {}",
        msg
    );
    Ok(())
}
