//! The gpupgrade hub, the long-lived coordinator of an upgrade.
//!
//! The hub serves the CLI, persists the upgrade configuration, and fans work out to the agent on
//! every segment host.

mod agents;
mod app;
#[cfg(test)]
mod fixtures;
mod phases;
#[cfg(test)]
mod phases_test;
mod server;
pub mod session;

pub use agents::{restart_agents, stop_agents, transport_closed, AgentLauncher, Restarted, SshLauncher};
pub use app::App;
pub use server::{Hub, HubDeps};
pub use session::{dial_agent, AgentConn, AgentSession, ConnState, Dialer, TcpDialer};
