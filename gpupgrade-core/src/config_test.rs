use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::config::*;
use crate::topology::{Cluster, Destination, Role, Segment};

fn source_cluster() -> Result<Cluster> {
    let seg = |db_id, content_id, role, port, host: &str, dir: &str| Segment {
        db_id,
        content_id,
        role,
        port,
        hostname: host.into(),
        data_dir: PathBuf::from(dir),
    };
    Ok(Cluster::build(
        Destination::Source,
        "/usr/local/gpdb5",
        "5.28.0",
        vec![
            seg(1, -1, Role::Primary, 5432, "cdw", "/data/qddir/seg-1"),
            seg(2, 0, Role::Primary, 25432, "sdw1", "/data/primary/seg0"),
            seg(3, 1, Role::Primary, 25433, "sdw2", "/data/primary/seg1"),
        ],
    )?)
}

#[tokio::test]
async fn save_then_load_yields_same_configuration() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = Configuration::new(7527, 5432, "/usr/local/gpdb5");
    config.source = Some(source_cluster()?);
    config.mode = Mode::Link;
    config.intermediate_ports = vec![50432, 50433, 50434];
    config.disk_free_ratio = 0.2;
    config.pg_upgrade_verbose = true;

    config.save(dir.path()).await?;
    let loaded = Configuration::load(dir.path()).await?;

    assert!(loaded == config, "expected loaded config to match saved, got {:?}", loaded);
    let raw = tokio::fs::read_to_string(Configuration::path(dir.path())).await?;
    assert!(raw.contains("\n  \"hub_port\": 7527"), "expected 2-space indented JSON, got {}", raw);
    Ok(())
}

#[tokio::test]
async fn save_leaves_no_temporary_files_behind() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = Configuration::new(7527, 5432, "/usr/local/gpdb5");
    config.save(dir.path()).await?;
    config.save(dir.path()).await?;

    let mut entries = Vec::new();
    let mut dir_stream = tokio::fs::read_dir(dir.path()).await?;
    while let Some(entry) = dir_stream.next_entry().await? {
        entries.push(entry.file_name().to_string_lossy().into_owned());
    }
    assert!(entries == vec![CONFIG_FILE.to_string()], "expected only {} in state dir, got {:?}", CONFIG_FILE, entries);
    Ok(())
}

#[tokio::test]
async fn bootstrap_only_writes_when_absent() -> Result<()> {
    let dir = tempfile::tempdir()?;

    let created = Configuration::bootstrap(dir.path(), 7527, 5432, Path::new("/usr/local/gpdb5")).await?;
    assert!(created, "expected first bootstrap to create the configuration");
    let first = Configuration::load(dir.path()).await?;
    let source = first.source()?;
    assert!(source.coordinator().port == 5432, "expected coordinator port 5432, got {}", source.coordinator().port);
    assert!(source.gphome() == Path::new("/usr/local/gpdb5"), "unexpected gphome {}", source.gphome().display());

    let created = Configuration::bootstrap(dir.path(), 9999, 6000, Path::new("/other")).await?;
    assert!(!created, "expected second bootstrap to skip");
    let second = Configuration::load(dir.path()).await?;
    assert!(second == first, "expected existing configuration to be untouched, got {:?}", second);
    Ok(())
}

#[tokio::test]
async fn load_rejects_invalid_topology() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let raw = r#"{
  "source": {
    "destination": "source",
    "gphome": "/usr/local/gpdb5",
    "version": "5.28.0",
    "segments": [
      {"db_id": 2, "content_id": 0, "role": "primary", "port": 25432, "hostname": "sdw1", "data_dir": "/data/seg0"}
    ]
  },
  "hub_port": 7527,
  "upgrade_id": "abc"
}"#;
    tokio::fs::write(Configuration::path(dir.path()), raw).await?;

    let res = Configuration::load(dir.path()).await;
    let err = match res {
        Ok(config) => anyhow::bail!("expected load to fail, got {:?}", config),
        Err(err) => err,
    };
    assert!(format!("{:#}", err).contains("no coordinator"), "expected missing coordinator error, got {:#}", err);
    Ok(())
}

#[tokio::test]
async fn temporary_config_uses_bootstrap_field_names() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let tmp = TemporaryConfig {
        gphome: PathBuf::from("/usr/local/gpdb5"),
        port: 5432,
    };
    tmp.save(dir.path()).await?;

    let raw = tokio::fs::read_to_string(TemporaryConfig::path(dir.path())).await?;
    assert!(raw.contains("\"GPHome\"") && raw.contains("\"Port\""), "unexpected temporary config {}", raw);
    assert!(TemporaryConfig::load(dir.path()).await? == tmp, "expected temporary config to load back");

    TemporaryConfig::remove(dir.path()).await?;
    TemporaryConfig::remove(dir.path()).await?;
    assert!(!TemporaryConfig::exists(dir.path()).await?, "expected temporary config to be removed");
    Ok(())
}

#[test]
fn env_defaults_derive_from_home() -> Result<()> {
    let env = Env::from_vars(vec![("HOME".into(), "/home/gpadmin".into())])?;

    assert!(env.state_dir == Path::new("/home/gpadmin/.gpupgrade"), "unexpected state dir {}", env.state_dir.display());
    assert!(
        env.log_dir == Path::new("/home/gpadmin/gpAdminLogs/gpupgrade"),
        "unexpected log dir {}",
        env.log_dir.display()
    );
    Ok(())
}

#[test]
fn env_overrides_take_precedence() -> Result<()> {
    let env = Env::from_vars(vec![
        ("HOME".into(), "/home/gpadmin".into()),
        ("GPUPGRADE_HOME".into(), "/tmp/state".into()),
        ("GPUPGRADE_LOG_DIR".into(), "/tmp/logs/gpupgrade".into()),
    ])?;

    assert!(env.state_dir == Path::new("/tmp/state"), "unexpected state dir {}", env.state_dir.display());
    assert!(env.log_dir == Path::new("/tmp/logs/gpupgrade"), "unexpected log dir {}", env.log_dir.display());
    let id: UpgradeId = serde_json::from_str("\"XyZ\"")?;
    let archive = env.log_archive_dir(&id);
    assert!(archive == Path::new("/tmp/logs/gpupgrade-XyZ"), "unexpected archive dir {}", archive.display());
    Ok(())
}

#[test]
fn env_requires_home_without_overrides() {
    let res = Env::from_vars(Vec::<(String, String)>::new());
    assert!(res.is_err(), "expected missing HOME to be an error, got {:?}", res);
}

#[test]
fn upgrade_id_is_url_safe_and_unpadded() {
    let id = UpgradeId::generate();
    assert!(id.as_str().len() == 11, "expected 11 characters for 8 bytes, got {:?}", id);
    assert!(
        id.as_str().chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
        "expected URL-safe characters, got {:?}",
        id
    );
    assert!(UpgradeId::generate() != id, "expected distinct upgrade IDs");
}

#[test]
fn mode_parses_case_insensitively() -> Result<()> {
    assert!("Link".parse::<Mode>()? == Mode::Link, "expected link mode");
    assert!("copy".parse::<Mode>()? == Mode::Copy, "expected copy mode");
    assert!("hardlink".parse::<Mode>().is_err(), "expected invalid mode to fail");
    Ok(())
}

#[test]
fn disk_free_ratio_defaults_depend_on_mode() {
    assert!(Mode::Copy.default_disk_free_ratio() == 0.6, "expected copy to need 60% free");
    assert!(Mode::Link.default_disk_free_ratio() == 0.2, "expected link to need 20% free");
}
