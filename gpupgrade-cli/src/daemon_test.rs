use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::net::TcpListener;

use crate::daemon::{respawn_args, wait_for_port};

#[tokio::test]
async fn wait_for_port_returns_once_listening() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();

    wait_for_port(port, Duration::from_secs(5), || Ok(None)).await?;
    Ok(())
}

#[tokio::test]
async fn wait_for_port_fails_when_the_daemon_exits() -> Result<()> {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        listener.local_addr()?.port()
    };

    let res = wait_for_port(port, Duration::from_secs(5), || Ok(Some(ExitStatus::from_raw(256)))).await;

    let err = match res {
        Ok(()) => bail!("expected an exited daemon to fail the wait"),
        Err(err) => err,
    };
    assert!(err.to_string().contains("exited"), "expected the exit to be reported, got {}", err);
    Ok(())
}

#[tokio::test]
async fn wait_for_port_times_out() -> Result<()> {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        listener.local_addr()?.port()
    };

    let res = wait_for_port(port, Duration::from_millis(300), || Ok(None)).await;

    assert!(res.is_err(), "expected the wait to time out");
    Ok(())
}

#[test]
fn respawn_drops_the_daemonize_flag() {
    let args = respawn_args();
    assert!(!args.iter().any(|arg| arg == "--daemonize"), "expected no daemonize flag, got {:?}", args);
}
