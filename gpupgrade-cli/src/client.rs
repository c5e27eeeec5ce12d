//! The CLI's connection to the hub.

use anyhow::{Context, Result};
use tonic::transport::{Channel, Endpoint};

use gpupgrade_core::config::DIAL_TIMEOUT;
use gpupgrade_core::grpc::CliToHubClient;

/// Connect to the hub listening on the given local port.
pub async fn connect_hub(port: u16) -> Result<CliToHubClient<Channel>> {
    let endpoint = Endpoint::from_shared(format!("http://127.0.0.1:{}", port))
        .context("invalid hub address")?
        .connect_timeout(DIAL_TIMEOUT);
    let channel = endpoint
        .connect()
        .await
        .with_context(|| format!("error connecting to hub on port {}, is it running?", port))?;
    Ok(CliToHubClient::new(channel))
}

/// Check if a hub answers on the given local port.
pub async fn hub_is_running(port: u16) -> bool {
    connect_hub(port).await.is_ok()
}
