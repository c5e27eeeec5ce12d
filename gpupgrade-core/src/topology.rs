//! The cluster topology model.
//!
//! A `Cluster` is one generation of a database cluster (source, intermediate or target). It is
//! always built in full from a flat list of segment records and validated as a unit; there are no
//! field-by-field mutators.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TopologyError;

/// The content ID reserved for the coordinator and its standby.
pub const COORDINATOR_CONTENT_ID: i32 = -1;

/// The role of a segment within its content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Primary,
    Mirror,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Mirror => f.write_str("mirror"),
        }
    }
}

/// The generation which a cluster represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Source,
    Intermediate,
    Target,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Intermediate => f.write_str("intermediate"),
            Self::Target => f.write_str("target"),
        }
    }
}

/// A single database instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// The ID of this segment, unique within its cluster.
    pub db_id: i32,
    /// The logical shard which this segment serves.
    pub content_id: i32,
    pub role: Role,
    pub port: u16,
    pub hostname: String,
    pub data_dir: PathBuf,
}

impl Segment {
    /// Check if this segment is the coordinator or its standby.
    pub fn is_coordinator(&self) -> bool {
        self.content_id == COORDINATOR_CONTENT_ID
    }

    /// Check if this segment is the standby coordinator.
    pub fn is_standby(&self) -> bool {
        self.is_coordinator() && self.role == Role::Mirror
    }

    pub fn is_primary(&self) -> bool {
        self.role == Role::Primary
    }

    pub fn is_mirror(&self) -> bool {
        self.role == Role::Mirror
    }
}

/// One generation of a cluster.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ClusterRecord", into = "ClusterRecord")]
pub struct Cluster {
    destination: Destination,
    gphome: PathBuf,
    version: String,
    /// The coordinator segment.
    coordinator: Segment,
    /// Primary segments by content ID, excluding the coordinator.
    primaries: BTreeMap<i32, Segment>,
    /// Mirror segments by content ID, including the standby coordinator.
    mirrors: BTreeMap<i32, Segment>,
}

/// The flat, persisted form of a cluster.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub destination: Destination,
    pub gphome: PathBuf,
    pub version: String,
    pub segments: Vec<Segment>,
}

impl TryFrom<ClusterRecord> for Cluster {
    type Error = TopologyError;

    fn try_from(record: ClusterRecord) -> Result<Self, Self::Error> {
        Cluster::build(record.destination, record.gphome, record.version, record.segments)
    }
}

impl From<Cluster> for ClusterRecord {
    fn from(cluster: Cluster) -> Self {
        let segments = cluster.segments().into_iter().cloned().collect();
        ClusterRecord {
            destination: cluster.destination,
            gphome: cluster.gphome,
            version: cluster.version,
            segments,
        }
    }
}

impl Cluster {
    /// Build a cluster from a flat list of segment records.
    ///
    /// Fails when there is not exactly one coordinator, when a dbid repeats, when a
    /// (content ID, role) pair repeats or when a mirror has no primary.
    pub fn build(
        destination: Destination, gphome: impl Into<PathBuf>, version: impl Into<String>, segments: Vec<Segment>,
    ) -> Result<Self, TopologyError> {
        let coordinators = segments.iter().filter(|seg| seg.is_coordinator() && seg.is_primary()).count();
        match coordinators {
            0 => return Err(TopologyError::NoCoordinator),
            1 => (),
            n => return Err(TopologyError::MultipleCoordinators(n)),
        }

        let mut db_ids = HashSet::new();
        let mut coordinator = None;
        let mut primaries = BTreeMap::new();
        let mut mirrors = BTreeMap::new();
        for seg in segments {
            if !db_ids.insert(seg.db_id) {
                return Err(TopologyError::DuplicateDbId(seg.db_id));
            }
            let target = match seg.role {
                Role::Primary if seg.is_coordinator() => {
                    coordinator = Some(seg);
                    continue;
                }
                Role::Primary => &mut primaries,
                Role::Mirror => &mut mirrors,
            };
            if target.contains_key(&seg.content_id) {
                return Err(TopologyError::DuplicateContentRole { content_id: seg.content_id, role: seg.role });
            }
            target.insert(seg.content_id, seg);
        }
        let coordinator = coordinator.ok_or(TopologyError::NoCoordinator)?;

        if let Some(orphan) = mirrors
            .values()
            .find(|mirror| !mirror.is_coordinator() && !primaries.contains_key(&mirror.content_id))
        {
            return Err(TopologyError::MirrorWithoutPrimary { db_id: orphan.db_id, content_id: orphan.content_id });
        }

        Ok(Self {
            destination,
            gphome: gphome.into(),
            version: version.into(),
            coordinator,
            primaries,
            mirrors,
        })
    }

    /// Build a coordinator-only cluster, used before the full topology of the source is known.
    pub fn bootstrap(gphome: impl Into<PathBuf>, port: u16) -> Self {
        let coordinator = Segment {
            db_id: 1,
            content_id: COORDINATOR_CONTENT_ID,
            role: Role::Primary,
            port,
            hostname: String::new(),
            data_dir: PathBuf::new(),
        };
        Self {
            destination: Destination::Source,
            gphome: gphome.into(),
            version: String::new(),
            coordinator,
            primaries: BTreeMap::new(),
            mirrors: BTreeMap::new(),
        }
    }

    pub fn destination(&self) -> Destination {
        self.destination
    }

    pub fn gphome(&self) -> &Path {
        &self.gphome
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn coordinator(&self) -> &Segment {
        &self.coordinator
    }

    /// The standby coordinator, if any.
    pub fn standby(&self) -> Option<&Segment> {
        self.mirrors.get(&COORDINATOR_CONTENT_ID)
    }

    /// Primary segments by content ID, excluding the coordinator.
    pub fn primaries(&self) -> &BTreeMap<i32, Segment> {
        &self.primaries
    }

    /// Mirror segments by content ID, including the standby.
    pub fn mirrors(&self) -> &BTreeMap<i32, Segment> {
        &self.mirrors
    }

    /// Select all segments matching the given predicate.
    ///
    /// Segments are ordered by ascending content ID, primaries before mirrors.
    pub fn select_segments<F>(&self, predicate: F) -> Vec<&Segment>
    where
        F: Fn(&Segment) -> bool,
    {
        let mut selected: Vec<&Segment> = std::iter::once(&self.coordinator)
            .chain(self.primaries.values())
            .chain(self.mirrors.values())
            .filter(|seg| predicate(seg))
            .collect();
        selected.sort_by_key(|seg| (seg.content_id, seg.role));
        selected
    }

    /// All segments of this cluster, coordinator first.
    pub fn segments(&self) -> Vec<&Segment> {
        self.select_segments(|_| true)
    }

    /// The distinct hostnames of all non-coordinator segments, in order of first occurrence.
    ///
    /// This is the set of hosts on which agents run.
    pub fn agent_hosts(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.select_segments(|seg| !seg.is_coordinator())
            .into_iter()
            .filter(|seg| seen.insert(seg.hostname.as_str()))
            .map(|seg| seg.hostname.clone())
            .collect()
    }

    /// Check if every primary has a mirror and the coordinator has a standby.
    pub fn has_all_mirrors_and_standby(&self) -> bool {
        self.standby().is_some() && self.primaries.keys().all(|content_id| self.mirrors.contains_key(content_id))
    }

    /// Derive the intermediate cluster from this source cluster.
    ///
    /// The intermediate cluster mirrors the source layout on the target installation. Ports are
    /// assigned from the given pool in layout order: by content ID, primary before mirror.
    /// An empty pool means consecutive ports following the source coordinator's port. Data
    /// directories are suffixed with the upgrade ID and content ID so generations never collide.
    pub fn intermediate_from(
        &self, gphome: impl Into<PathBuf>, version: impl Into<String>, ports: &[u16], upgrade_id: &str,
    ) -> Result<Cluster, TopologyError> {
        let layout = self.segments();
        let pool: Vec<u16> = if ports.is_empty() {
            let first = u32::from(self.coordinator.port) + 1;
            let db_id = self.coordinator.db_id;
            (first..first + layout.len() as u32)
                .map(|port| u16::try_from(port).map_err(|_| TopologyError::InvalidPort { db_id, port }))
                .collect::<Result<_, _>>()?
        } else {
            ports.to_vec()
        };
        if pool.len() < layout.len() {
            return Err(TopologyError::PortPoolExhausted { needed: layout.len(), available: pool.len() });
        }

        let segments = layout
            .into_iter()
            .zip(pool)
            .map(|(seg, port)| Segment {
                port,
                data_dir: intermediate_data_dir(&seg.data_dir, upgrade_id, seg.content_id),
                ..seg.clone()
            })
            .collect();
        Cluster::build(Destination::Intermediate, gphome, version, segments)
    }

    /// Derive the target cluster from this source cluster and the upgraded intermediate cluster.
    ///
    /// The target keeps the intermediate installation but takes over the source's ports and
    /// data directories.
    pub fn target_from(&self, intermediate: &Cluster) -> Result<Cluster, TopologyError> {
        let segments = intermediate
            .segments()
            .into_iter()
            .map(|seg| {
                let source = self.segment(seg.content_id, seg.role).unwrap_or(seg);
                Segment {
                    port: source.port,
                    data_dir: source.data_dir.clone(),
                    ..seg.clone()
                }
            })
            .collect();
        Cluster::build(Destination::Target, intermediate.gphome.clone(), intermediate.version.clone(), segments)
    }

    /// Look up the segment with the given content ID and role.
    pub fn segment(&self, content_id: i32, role: Role) -> Option<&Segment> {
        match role {
            Role::Primary if content_id == COORDINATOR_CONTENT_ID => Some(&self.coordinator),
            Role::Primary => self.primaries.get(&content_id),
            Role::Mirror => self.mirrors.get(&content_id),
        }
    }
}

/// The data directory of an intermediate segment: `<parent>/<basename>.<upgrade_id>.<content_id>`.
pub fn intermediate_data_dir(source: &Path, upgrade_id: &str, content_id: i32) -> PathBuf {
    let base = source.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
    let name = format!("{}.{}.{}", base, upgrade_id, content_id);
    match source.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

/// The directory under which a source data directory is archived during finalize.
pub fn archive_data_dir(source: &Path, upgrade_id: &str) -> PathBuf {
    let mut archived = source.as_os_str().to_owned();
    archived.push(format!("_{}", upgrade_id));
    PathBuf::from(archived)
}
