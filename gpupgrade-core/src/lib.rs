//! Shared building blocks of the gpupgrade hub, agent and CLI.

pub mod config;
#[cfg(test)]
mod config_test;
pub mod error;
pub mod fanout;
pub mod grpc;
pub mod step;
pub mod topology;
#[cfg(test)]
mod topology_test;

pub use error::{AppError, ConnectionError, RpcResult, StepError, TopologyError};
pub use fanout::ErrorList;
