use std::path::PathBuf;

use anyhow::{bail, Result};

use crate::error::TopologyError;
use crate::grpc;
use crate::topology::*;

fn seg(db_id: i32, content_id: i32, role: Role, port: u16, hostname: &str, data_dir: &str) -> Segment {
    Segment {
        db_id,
        content_id,
        role,
        port,
        hostname: hostname.into(),
        data_dir: PathBuf::from(data_dir),
    }
}

fn mirrored_segments() -> Vec<Segment> {
    vec![
        seg(1, -1, Role::Primary, 5432, "cdw", "/data/qddir/seg-1"),
        seg(2, 0, Role::Primary, 25432, "sdw1", "/data/primary/seg0"),
        seg(3, 1, Role::Primary, 25433, "sdw2", "/data/primary/seg1"),
        seg(4, 0, Role::Mirror, 25434, "sdw2", "/data/mirror/seg0"),
        seg(5, 1, Role::Mirror, 25435, "sdw1", "/data/mirror/seg1"),
        seg(6, -1, Role::Mirror, 5433, "scdw", "/data/standby/seg-1"),
    ]
}

fn build(segments: Vec<Segment>) -> Result<Cluster, TopologyError> {
    Cluster::build(Destination::Source, "/usr/local/gpdb5", "5.28.0", segments)
}

#[test]
fn build_accepts_a_valid_topology() -> Result<()> {
    let cluster = build(mirrored_segments())?;

    assert!(cluster.coordinator().db_id == 1, "expected coordinator dbid 1, got {}", cluster.coordinator().db_id);
    assert!(cluster.primaries().len() == 2, "expected 2 primaries, got {}", cluster.primaries().len());
    assert!(cluster.mirrors().len() == 3, "expected 3 mirrors including standby, got {}", cluster.mirrors().len());
    assert!(cluster.standby().map(|s| s.db_id) == Some(6), "expected standby dbid 6, got {:?}", cluster.standby());
    assert!(cluster.has_all_mirrors_and_standby(), "expected cluster to be fully mirrored");
    Ok(())
}

#[test]
fn build_rejects_missing_coordinator() {
    let segments = mirrored_segments().into_iter().filter(|s| !(s.is_coordinator() && s.is_primary())).collect();
    let res = build(segments);
    assert!(res == Err(TopologyError::NoCoordinator), "expected missing coordinator error, got {:?}", res);
}

#[test]
fn build_rejects_multiple_coordinators() {
    let mut segments = mirrored_segments();
    segments.push(seg(7, -1, Role::Primary, 6432, "cdw2", "/data/qddir2/seg-1"));
    let res = build(segments);
    assert!(res == Err(TopologyError::MultipleCoordinators(2)), "expected multiple coordinators error, got {:?}", res);
}

#[test]
fn build_rejects_duplicate_dbid() {
    let mut segments = mirrored_segments();
    segments.push(seg(3, 2, Role::Primary, 25436, "sdw3", "/data/primary/seg2"));
    let res = build(segments);
    assert!(res == Err(TopologyError::DuplicateDbId(3)), "expected duplicate dbid error, got {:?}", res);
}

#[test]
fn build_rejects_duplicate_content_and_role() {
    let mut segments = mirrored_segments();
    segments.push(seg(8, 1, Role::Mirror, 25437, "sdw3", "/data/mirror2/seg1"));
    let res = build(segments);
    let expected = Err(TopologyError::DuplicateContentRole { content_id: 1, role: Role::Mirror });
    assert!(res == expected, "expected duplicate content/role error, got {:?}", res);
}

#[test]
fn build_rejects_mirror_without_primary() {
    let mut segments = mirrored_segments();
    segments.push(seg(9, 5, Role::Mirror, 25438, "sdw3", "/data/mirror/seg5"));
    let res = build(segments);
    let expected = Err(TopologyError::MirrorWithoutPrimary { db_id: 9, content_id: 5 });
    assert!(res == expected, "expected orphan mirror error, got {:?}", res);
}

#[test]
fn select_segments_orders_by_content_then_role() -> Result<()> {
    let mut segments = mirrored_segments();
    segments.reverse();
    let cluster = build(segments)?;

    let order: Vec<i32> = cluster.segments().iter().map(|s| s.db_id).collect();
    assert!(order == vec![1, 6, 2, 4, 3, 5], "unexpected segment order {:?}", order);

    let mirrors = cluster.select_segments(|s| s.is_mirror() && !s.is_coordinator());
    let mirrors: Vec<i32> = mirrors.iter().map(|s| s.db_id).collect();
    assert!(mirrors == vec![4, 5], "unexpected mirror selection {:?}", mirrors);
    Ok(())
}

#[test]
fn agent_hosts_excludes_coordinator_and_deduplicates() -> Result<()> {
    let cluster = build(mirrored_segments())?;

    let hosts = cluster.agent_hosts();
    assert!(hosts == vec!["sdw1".to_string(), "sdw2".to_string()], "unexpected agent hosts {:?}", hosts);
    Ok(())
}

#[test]
fn agent_hosts_lists_each_shared_host_once() -> Result<()> {
    let mut segments = vec![seg(1, -1, Role::Primary, 5432, "cdw", "/data/qddir/seg-1")];
    for content in 0..8 {
        segments.push(seg(content + 2, content, Role::Primary, 25432 + content as u16, "sdw1", "/data/primary"));
    }
    let cluster = build(segments)?;

    let hosts = cluster.agent_hosts();
    assert!(hosts == vec!["sdw1".to_string()], "expected a single agent host, got {:?}", hosts);
    Ok(())
}

#[test]
fn has_all_mirrors_and_standby_requires_standby() -> Result<()> {
    let segments = mirrored_segments().into_iter().filter(|s| !s.is_standby()).collect();
    let cluster = build(segments)?;
    assert!(!cluster.has_all_mirrors_and_standby(), "expected missing standby to be detected");
    Ok(())
}

#[test]
fn intermediate_assigns_ports_from_pool_and_renames_data_dirs() -> Result<()> {
    let source = build(mirrored_segments())?;
    let ports = [50432, 50433, 50434, 50435, 50436, 50437];

    let intermediate = source.intermediate_from("/usr/local/gpdb6", "6.20.0", &ports, "AbC")?;

    assert!(
        intermediate.destination() == Destination::Intermediate,
        "unexpected destination {}",
        intermediate.destination()
    );
    let assigned: Vec<(i32, u16)> = intermediate.segments().iter().map(|s| (s.db_id, s.port)).collect();
    let expected = vec![(1, 50432), (6, 50433), (2, 50434), (4, 50435), (3, 50436), (5, 50437)];
    assert!(assigned == expected, "unexpected port assignment {:?}", assigned);
    let seg0 = intermediate.segment(0, Role::Primary).map(|s| s.data_dir.clone());
    assert!(
        seg0 == Some(PathBuf::from("/data/primary/seg0.AbC.0")),
        "unexpected intermediate data dir {:?}",
        seg0
    );
    assert!(intermediate.gphome() == std::path::Path::new("/usr/local/gpdb6"), "unexpected gphome");
    Ok(())
}

#[test]
fn intermediate_defaults_to_ports_after_source_coordinator() -> Result<()> {
    let source = build(mirrored_segments())?;

    let intermediate = source.intermediate_from("/usr/local/gpdb6", "6.20.0", &[], "AbC")?;

    let coordinator_port = intermediate.coordinator().port;
    assert!(coordinator_port == 5433, "expected coordinator port 5433, got {}", coordinator_port);
    let last = intermediate.segment(1, Role::Mirror).map(|s| s.port);
    assert!(last == Some(5438), "expected last mirror port 5438, got {:?}", last);
    Ok(())
}

#[test]
fn intermediate_fails_when_pool_runs_out() -> Result<()> {
    let source = build(mirrored_segments())?;

    let res = source.intermediate_from("/usr/local/gpdb6", "6.20.0", &[50432, 50433], "AbC");
    let expected = Err(TopologyError::PortPoolExhausted { needed: 6, available: 2 });
    assert!(res == expected, "expected port pool error, got {:?}", res);
    Ok(())
}

#[test]
fn target_takes_source_ports_and_data_dirs() -> Result<()> {
    let source = build(mirrored_segments())?;
    let intermediate = source.intermediate_from("/usr/local/gpdb6", "6.20.0", &[], "AbC")?;

    let target = source.target_from(&intermediate)?;

    assert!(target.destination() == Destination::Target, "unexpected destination {}", target.destination());
    assert!(target.version() == "6.20.0", "expected target version of intermediate, got {}", target.version());
    for seg in target.segments() {
        let src = match source.segment(seg.content_id, seg.role) {
            Some(src) => src,
            None => bail!("no source segment for content {} role {}", seg.content_id, seg.role),
        };
        assert!(seg.port == src.port, "expected port {} for dbid {}, got {}", src.port, seg.db_id, seg.port);
        assert!(
            seg.data_dir == src.data_dir,
            "expected data dir {:?} for dbid {}, got {:?}",
            src.data_dir,
            seg.db_id,
            seg.data_dir
        );
    }
    Ok(())
}

#[test]
fn archive_dir_appends_upgrade_id() {
    let archived = archive_data_dir(std::path::Path::new("/data/primary/seg0"), "AbC");
    assert!(archived == PathBuf::from("/data/primary/seg0_AbC"), "unexpected archive dir {:?}", archived);
}

#[test]
fn wire_cluster_is_validated_on_decode() -> Result<()> {
    let cluster = build(mirrored_segments())?;
    let mut wire = grpc::Cluster::from(&cluster);

    let decoded = Cluster::try_from(wire.clone())?;
    assert!(decoded == cluster, "expected wire cluster to decode to the same topology");

    wire.segments.retain(|s| s.content_id != -1 || s.role != grpc::Role::Primary as i32);
    let res = Cluster::try_from(wire);
    assert!(res == Err(TopologyError::NoCoordinator), "expected decode to reject missing coordinator, got {:?}", res);
    Ok(())
}
