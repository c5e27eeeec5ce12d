//! The hub's session of connections to its agents.
//!
//! Connections are dialed together on first use and cached for the lifetime of the session. A
//! cached connection is never re-dialed: once any dial fails, or any cached connection leaves the
//! ready state, every later call fails until the session is explicitly reset by restarting agents.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::Duration;

use anyhow::{Context, Result};
use http::Uri;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tonic::transport::{Channel, Endpoint};
use tower::service_fn;

use gpupgrade_core::fanout::collect_concurrently;
use gpupgrade_core::grpc::AgentClient;
use gpupgrade_core::ConnectionError;

/// The transport state of one agent connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnState {
    Connecting,
    Ready,
    /// The transport failed or was closed by the agent.
    TransientFailure,
    /// The transport was closed by the hub.
    Shutdown,
}

/// A connection from the hub to the agent on one host.
#[derive(Clone, Debug)]
pub struct AgentConn {
    pub host: String,
    pub client: AgentClient<Channel>,
    state: watch::Receiver<ConnState>,
}

impl AgentConn {
    pub fn state(&self) -> ConnState {
        *self.state.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ConnState::Ready
    }

    /// Watch the transport state, even after this handle is closed.
    pub fn subscribe(&self) -> watch::Receiver<ConnState> {
        self.state.clone()
    }

    /// Wait until the transport state differs from `from`, or until the timeout elapses.
    pub async fn wait_for_state_change(&self, from: ConnState, timeout: Duration) -> ConnState {
        wait_for_change(self.state.clone(), from, timeout).await
    }

    /// Close this handle, waiting a bounded time for the transport to leave its current state.
    pub async fn close(self, timeout: Duration) {
        let Self { host, client, state } = self;
        let before = *state.borrow();
        drop(client);
        if before != ConnState::Ready {
            return;
        }
        let after = wait_for_change(state, before, timeout).await;
        tracing::debug!(%host, state = ?after, "agent connection closed");
    }
}

async fn wait_for_change(mut state: watch::Receiver<ConnState>, from: ConnState, timeout: Duration) -> ConnState {
    let _ = tokio::time::timeout(timeout, async {
        while *state.borrow() == from {
            if state.changed().await.is_err() {
                break;
            }
        }
    })
    .await;
    let current = *state.borrow();
    current
}

/// A way of establishing a connection to the agent on a host.
#[tonic::async_trait]
pub trait Dialer: Send + Sync + 'static {
    async fn dial(&self, host: &str, port: u16) -> Result<AgentConn>;
}

/// Dials agents over TCP at their hostname.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpDialer;

#[tonic::async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, host: &str, port: u16) -> Result<AgentConn> {
        dial_agent(host, format!("{}:{}", host, port)).await
    }
}

/// Connect to the agent of `host` listening at `addr`, tracking the state of its transport.
pub async fn dial_agent(host: &str, addr: String) -> Result<AgentConn> {
    let (state_tx, state_rx) = watch::channel(ConnState::Connecting);
    let state_tx = Arc::new(state_tx);
    let endpoint =
        Endpoint::from_shared(format!("http://{}", addr)).with_context(|| format!("invalid agent address {}", addr))?;
    let channel = endpoint
        .connect_with_connector(service_fn(move |_: Uri| {
            let (addr, state) = (addr.clone(), state_tx.clone());
            async move {
                let stream = match TcpStream::connect(&addr).await {
                    Ok(stream) => stream,
                    Err(err) => {
                        let _ = state.send(ConnState::TransientFailure);
                        return Err(err);
                    }
                };
                let _ = stream.set_nodelay(true);
                let _ = state.send(ConnState::Ready);
                Ok(TrackedStream { inner: stream, state })
            }
        }))
        .await
        .with_context(|| format!("error connecting to agent on host {}", host))?;
    Ok(AgentConn {
        host: host.to_string(),
        client: AgentClient::new(channel),
        state: state_rx,
    })
}

/// A TCP stream which publishes the state of the transport as it is used.
struct TrackedStream {
    inner: TcpStream,
    state: Arc<watch::Sender<ConnState>>,
}

impl TrackedStream {
    fn fail(&self) {
        let _ = self.state.send(ConnState::TransientFailure);
    }
}

impl AsyncRead for TrackedStream {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let filled = buf.filled().len();
        let res = Pin::new(&mut self.inner).poll_read(cx, buf);
        match &res {
            Poll::Ready(Ok(())) if buf.filled().len() == filled && buf.remaining() > 0 => self.fail(),
            Poll::Ready(Err(_)) => self.fail(),
            _ => (),
        }
        res
    }
}

impl AsyncWrite for TrackedStream {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let res = Pin::new(&mut self.inner).poll_write(cx, buf);
        if let Poll::Ready(Err(_)) = &res {
            self.fail();
        }
        res
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        if *self.state.borrow() == ConnState::Ready {
            let _ = self.state.send(ConnState::Shutdown);
        }
    }
}

/// The cached outcome of dialing every agent.
enum Cache {
    Empty,
    Ready(Arc<Vec<AgentConn>>),
    /// A dial of these hosts failed.
    Failed(Vec<String>),
    /// The session was closed along with the hub.
    Closed,
}

/// The hub's memoized set of agent connections.
pub struct AgentSession {
    dialer: Arc<dyn Dialer>,
    /// The time allowed for each dial, and for each close.
    timeout: Duration,
    /// The cached connections. Only held to read or swap the cache, never across network I/O.
    cache: Mutex<Cache>,
    /// Serializes dials, so that concurrent callers share one set of connections.
    dial_lock: Mutex<()>,
}

impl AgentSession {
    pub fn new(dialer: Arc<dyn Dialer>, timeout: Duration) -> Self {
        Self {
            dialer,
            timeout,
            cache: Mutex::new(Cache::Empty),
            dial_lock: Mutex::new(()),
        }
    }

    pub fn dialer(&self) -> Arc<dyn Dialer> {
        self.dialer.clone()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Get a ready connection to the agent on every given host.
    ///
    /// The first call dials every host concurrently and fails if any dial fails. Later calls only
    /// verify that every cached connection is still ready.
    pub async fn connections(&self, hosts: &[String], port: u16) -> Result<Arc<Vec<AgentConn>>> {
        if let Some(conns) = self.cached().await? {
            return Ok(conns);
        }

        let _dialing = self.dial_lock.lock().await;
        if let Some(conns) = self.cached().await? {
            return Ok(conns);
        }

        let timeout = self.timeout;
        let dialer = &self.dialer;
        let outcome = collect_concurrently(hosts.iter().cloned(), |host| async move {
            match tokio::time::timeout(timeout, dialer.dial(&host, port)).await {
                Ok(res) => res,
                Err(_) => Err(ConnectionError::DialTimeout { host: host.clone(), timeout }.into()),
            }
        })
        .await;

        if !outcome.errors.is_empty() {
            let dialed = |host: &&String| outcome.successes.iter().any(|(ok, _)| ok == *host);
            let mut failed: Vec<String> = hosts.iter().filter(|host| !dialed(host)).cloned().collect();
            failed.sort();
            tracing::error!(hosts = ?failed, "error connecting to agents");
            for (_, conn) in outcome.successes {
                conn.close(timeout).await;
            }
            self.install(Cache::Failed(failed)).await?;
            return Err(anyhow::Error::new(outcome.errors)).context("error connecting to agents");
        }

        let conns = Arc::new(outcome.successes.into_iter().map(|(_, conn)| conn).collect::<Vec<_>>());
        if let Err(err) = self.install(Cache::Ready(conns.clone())).await {
            if let Ok(conns) = Arc::try_unwrap(conns) {
                close_all(conns, timeout).await;
            }
            return Err(err);
        }
        tracing::debug!(hosts = ?hosts, "connected to agents");
        Ok(conns)
    }

    /// Close every cached connection and forget them, so that the next call dials again.
    pub async fn reset(&self) {
        self.take(Cache::Empty).await;
    }

    /// Close every cached connection for good.
    pub async fn close(&self) {
        self.take(Cache::Closed).await;
    }

    async fn cached(&self) -> Result<Option<Arc<Vec<AgentConn>>>> {
        let cache = self.cache.lock().await;
        match &*cache {
            Cache::Empty => Ok(None),
            Cache::Ready(conns) => {
                let hosts: Vec<String> =
                    conns.iter().filter(|conn| !conn.is_ready()).map(|conn| conn.host.clone()).collect();
                if !hosts.is_empty() {
                    return Err(ConnectionError::NotReady { hosts }).context("ensuring agent connections are ready");
                }
                Ok(Some(conns.clone()))
            }
            Cache::Failed(hosts) => Err(ConnectionError::Unavailable { hosts: hosts.clone() }.into()),
            Cache::Closed => Err(ConnectionError::HubStopped.into()),
        }
    }

    /// Install a freshly dialed outcome, unless the session was closed meanwhile.
    async fn install(&self, next: Cache) -> Result<()> {
        let mut cache = self.cache.lock().await;
        if let Cache::Closed = &*cache {
            return Err(ConnectionError::HubStopped.into());
        }
        *cache = next;
        Ok(())
    }

    async fn take(&self, next: Cache) {
        let prev = {
            let mut cache = self.cache.lock().await;
            if let (Cache::Closed, Cache::Empty) = (&*cache, &next) {
                return;
            }
            std::mem::replace(&mut *cache, next)
        };
        if let Cache::Ready(conns) = prev {
            let conns = match Arc::try_unwrap(conns) {
                Ok(conns) => conns,
                Err(shared) => shared.as_ref().clone(),
            };
            close_all(conns, self.timeout).await;
        }
    }
}

async fn close_all(conns: Vec<AgentConn>, timeout: Duration) {
    futures::future::join_all(conns.into_iter().map(|conn| conn.close(timeout))).await;
}
