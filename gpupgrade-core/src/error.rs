//! Upgrade error abstractions.

use std::time::Duration;

use thiserror::Error;
use tonic::Status;

use crate::fanout::ErrorList;
use crate::step::{Phase, Status as StepStatus};
use crate::topology::Role;

/// Errors raised while building or deriving a cluster topology.
///
/// These are always fatal to the operation which discovered them and are never retried.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// No coordinator segment was found in the segment records.
    #[error("invalid topology: no coordinator segment found")]
    NoCoordinator,
    /// More than one segment claims to be the coordinator.
    #[error("invalid topology: found {0} coordinator segments, expected exactly one")]
    MultipleCoordinators(usize),
    /// Two segments share the same dbid.
    #[error("invalid topology: duplicate dbid {0}")]
    DuplicateDbId(i32),
    /// Two segments claim the same content ID and role.
    #[error("invalid topology: more than one {role} found for content {content_id}")]
    DuplicateContentRole { content_id: i32, role: Role },
    /// A mirror was found for a content ID which has no primary.
    #[error("invalid topology: mirror dbid {db_id} for content {content_id} has no primary")]
    MirrorWithoutPrimary { db_id: i32, content_id: i32 },
    /// A segment record carried an unknown role.
    #[error("invalid topology: segment dbid {0} has an unknown role")]
    UnknownRole(i32),
    /// A segment record carried a port outside of the valid range.
    #[error("invalid topology: segment dbid {db_id} has an invalid port {port}")]
    InvalidPort { db_id: i32, port: u32 },
    /// The pool of ports available to a new cluster is too small.
    #[error("not enough ports available for the new cluster: need {needed}, have {available}")]
    PortPoolExhausted { needed: usize, available: usize },
}

/// Errors raised by the hub's connections to its agents and by the hub's own lifecycle.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// A dial did not reach the ready state within the dial timeout.
    #[error("timed out after {timeout:?} connecting to agent on host {host}")]
    DialTimeout { host: String, timeout: Duration },
    /// Cached connections which are no longer in the ready state.
    #[error("the connections to the following hosts were not ready: {}", .hosts.join(","))]
    NotReady { hosts: Vec<String> },
    /// A previous dial of these hosts failed; an explicit restart is required.
    #[error(
        "agents on the following hosts are unavailable, run `gpupgrade` again after restarting them: {}",
        .hosts.join(",")
    )]
    Unavailable { hosts: Vec<String> },
    /// The hub has already been stopped and can not be started again.
    #[error("hub has already been stopped")]
    HubStopped,
}

/// Errors raised by the step engine.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StepError {
    /// The operator declined to continue.
    #[error("user canceled")]
    UserCanceled,
    /// A substep asked to terminate the phase.
    #[error("{0} was quit before completion")]
    Quit(Phase),
    /// A status transition which the substep state machine does not allow.
    #[error("invalid status transition for {subject} from {from} to {to}")]
    InvalidTransition { subject: String, from: StepStatus, to: StepStatus },
    /// A phase was started out of order.
    #[error("can not run {phase}: {reason}")]
    PhaseOrder { phase: Phase, reason: String },
}

/// Application error variants mapped onto gRPC status codes at the RPC boundary.
#[derive(Debug, Error)]
pub enum AppError {
    /// The given input was invalid.
    #[error("validation error: {0}")]
    InvalidInput(String),
}

impl AppError {
    /// Translate the given error into a gRPC status object.
    ///
    /// The full context chain of the error is kept in the status message.
    pub fn grpc(err: anyhow::Error) -> Status {
        let err = match err.downcast::<Status>() {
            Ok(status) => return status,
            Err(err) => err,
        };
        let message = format!("{:#}", err);
        match classify(&err) {
            Some(Class::Invalid) => Status::invalid_argument(message),
            Some(Class::Connectivity) => Status::unavailable(message),
            None => Status::internal(message),
        }
    }
}

enum Class {
    Invalid,
    Connectivity,
}

/// Find the first typed error anywhere in the given error, including contexts and the members of
/// aggregated fan-out errors.
fn classify(err: &anyhow::Error) -> Option<Class> {
    let invalid = |cause: &(dyn std::error::Error + 'static)| {
        cause.is::<TopologyError>() || matches!(cause.downcast_ref::<AppError>(), Some(AppError::InvalidInput(_)))
    };
    if err.downcast_ref::<TopologyError>().is_some()
        || matches!(err.downcast_ref::<AppError>(), Some(AppError::InvalidInput(_)))
    {
        return Some(Class::Invalid);
    }
    if err.downcast_ref::<ConnectionError>().is_some() {
        return Some(Class::Connectivity);
    }
    for cause in err.chain() {
        if invalid(cause) {
            return Some(Class::Invalid);
        }
        if cause.is::<ConnectionError>() {
            return Some(Class::Connectivity);
        }
        if let Some(errs) = cause.downcast_ref::<ErrorList>() {
            if let Some(class) = errs.iter().find_map(classify) {
                return Some(class);
            }
        }
    }
    None
}

/// A result type used with the gRPC system.
pub type RpcResult<T> = ::std::result::Result<T, tonic::Status>;
