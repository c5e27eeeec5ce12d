//! Conversions between the wire types and the topology model.

use std::path::PathBuf;

use super::idl;
use crate::config::Mode;
use crate::error::{AppError, TopologyError};
use crate::topology::{Cluster, Destination, Role, Segment};

impl From<&Segment> for idl::Segment {
    fn from(seg: &Segment) -> Self {
        let role = match seg.role {
            Role::Primary => idl::Role::Primary,
            Role::Mirror => idl::Role::Mirror,
        };
        Self {
            db_id: seg.db_id,
            content_id: seg.content_id,
            role: role as i32,
            port: u32::from(seg.port),
            hostname: seg.hostname.clone(),
            data_dir: seg.data_dir.to_string_lossy().into_owned(),
        }
    }
}

impl TryFrom<idl::Segment> for Segment {
    type Error = TopologyError;

    fn try_from(seg: idl::Segment) -> Result<Self, Self::Error> {
        let role = match idl::Role::from_i32(seg.role) {
            Some(idl::Role::Primary) => Role::Primary,
            Some(idl::Role::Mirror) => Role::Mirror,
            _ => return Err(TopologyError::UnknownRole(seg.db_id)),
        };
        let invalid = TopologyError::InvalidPort {
            db_id: seg.db_id,
            port: seg.port,
        };
        let port = u16::try_from(seg.port).map_err(|_| invalid)?;
        Ok(Self {
            db_id: seg.db_id,
            content_id: seg.content_id,
            role,
            port,
            hostname: seg.hostname,
            data_dir: PathBuf::from(seg.data_dir),
        })
    }
}

impl From<Destination> for idl::ClusterDestination {
    fn from(dest: Destination) -> Self {
        match dest {
            Destination::Source => Self::Source,
            Destination::Intermediate => Self::Intermediate,
            Destination::Target => Self::Target,
        }
    }
}

impl From<&Cluster> for idl::Cluster {
    fn from(cluster: &Cluster) -> Self {
        Self {
            destination: idl::ClusterDestination::from(cluster.destination()) as i32,
            gphome: cluster.gphome().to_string_lossy().into_owned(),
            version: cluster.version().into(),
            segments: cluster.segments().into_iter().map(idl::Segment::from).collect(),
        }
    }
}

impl TryFrom<idl::Cluster> for Cluster {
    type Error = TopologyError;

    /// Decode a wire cluster, validating it exactly as any other segment list.
    fn try_from(cluster: idl::Cluster) -> Result<Self, Self::Error> {
        let destination = match idl::ClusterDestination::from_i32(cluster.destination) {
            Some(idl::ClusterDestination::Intermediate) => Destination::Intermediate,
            Some(idl::ClusterDestination::Target) => Destination::Target,
            _ => Destination::Source,
        };
        let segments = cluster.segments.into_iter().map(Segment::try_from).collect::<Result<Vec<_>, _>>()?;
        Cluster::build(destination, cluster.gphome, cluster.version, segments)
    }
}

impl From<Mode> for idl::Mode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Copy => Self::Copy,
            Mode::Link => Self::Link,
        }
    }
}

impl TryFrom<idl::Mode> for Mode {
    type Error = AppError;

    fn try_from(mode: idl::Mode) -> Result<Self, Self::Error> {
        match mode {
            idl::Mode::Copy => Ok(Self::Copy),
            idl::Mode::Link => Ok(Self::Link),
            idl::Mode::UnknownMode => Err(AppError::InvalidInput("upgrade mode must be one of copy or link".into())),
        }
    }
}
