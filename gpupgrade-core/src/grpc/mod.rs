//! gRPC types and services of the hub and agent protocol.
//!
//! The code in `idl.rs` is generated from `proto/idl.proto`.

#[rustfmt::skip]
mod idl;
mod idl_ext;

pub use idl::agent_client::AgentClient;
pub use idl::agent_server::{Agent, AgentServer};
pub use idl::cli_to_hub_client::CliToHubClient;
pub use idl::cli_to_hub_server::{CliToHub, CliToHubServer};
pub use idl::*;
