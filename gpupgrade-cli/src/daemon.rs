//! Running the hub and agents detached from the terminal.

use std::fs::OpenOptions;
use std::io;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use tokio::net::TcpStream;

/// The time a daemon is given to start accepting connections.
pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The arguments of this process, minus the flag which asked for a daemon.
pub fn respawn_args() -> Vec<String> {
    std::env::args().skip(1).filter(|arg| arg != "--daemonize").collect()
}

/// Re-run this executable in its own process group with its output appended to `log_file`, and
/// wait for it to listen on `port`. Returns the pid of the daemon.
pub async fn daemonize(port: u16, log_file: &Path) -> Result<u32> {
    let exe = std::env::current_exe().context("error finding the path of the gpupgrade executable")?;
    if let Some(dir) = log_file.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("error creating log directory {}", dir.display()))?;
    }
    let log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("error opening log file {}", log_file.display()))?;

    let mut child = Command::new(exe)
        .args(respawn_args())
        .stdin(Stdio::null())
        .stdout(log.try_clone().context("error duplicating log file handle")?)
        .stderr(log)
        .process_group(0)
        .spawn()
        .context("error spawning daemon")?;
    let pid = child.id();
    wait_for_port(port, STARTUP_TIMEOUT, || child.try_wait())
        .await
        .with_context(|| format!("see {} for details", log_file.display()))?;
    Ok(pid)
}

/// Wait until something accepts connections on the given local port.
///
/// Fails early once `exited` reports that the process expected to listen has exited.
pub async fn wait_for_port<F>(port: u16, timeout: Duration, mut exited: F) -> Result<()>
where
    F: FnMut() -> io::Result<Option<ExitStatus>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
            return Ok(());
        }
        if let Some(status) = exited().context("error checking daemon status")? {
            bail!("daemon exited with {} before listening on port {}", status, port);
        }
        if Instant::now() >= deadline {
            bail!("timed out after {:?} waiting for a daemon to listen on port {}", timeout, port);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
