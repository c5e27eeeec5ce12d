//! The gpupgrade agent, a per-host worker which performs host-local upgrade work for the hub.

mod app;
pub mod dirs;
#[cfg(test)]
mod dirs_test;
mod server;
#[cfg(test)]
mod server_test;
mod upgrade;

pub use app::{AgentConfig, App};
pub use server::AgentService;
pub use upgrade::{PgUpgrade, UpgradeTask, UpgradeTool};
