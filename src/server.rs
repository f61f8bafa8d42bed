//! Event source: Wyoming event server
//!
//! Satellites connect with `--event-uri` pointing here. Every connection gets
//! its own reader task; decoded lifecycle events from all connections are
//! funnelled into one channel so the dispatcher sees a single serialized
//! stream.

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::event::LifecycleEvent;
use crate::wyoming::read_event;
use crate::{Error, Result};

/// Buffered events between connection readers and the consumer
const EVENT_QUEUE: usize = 64;

/// Pause after a failed accept (e.g. out of file descriptors)
const ACCEPT_RETRY: Duration = Duration::from_millis(100);

/// Ordered stream of lifecycle events
#[async_trait]
pub trait EventSource: Send {
    /// Next event, or `None` once the source is exhausted
    async fn next_event(&mut self) -> Option<LifecycleEvent>;
}

#[async_trait]
impl EventSource for mpsc::Receiver<LifecycleEvent> {
    async fn next_event(&mut self) -> Option<LifecycleEvent> {
        self.recv().await
    }
}

/// Where the event server listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerUri {
    /// `tcp://host:port`
    Tcp(String),
    /// `unix:///path/to/socket`
    Unix(PathBuf),
}

impl FromStr for ServerUri {
    type Err = Error;

    fn from_str(uri: &str) -> Result<Self> {
        if let Some(addr) = uri.strip_prefix("tcp://") {
            if addr.is_empty() {
                return Err(Error::Config(format!("missing address in {uri}")));
            }
            return Ok(Self::Tcp(addr.to_string()));
        }
        if let Some(path) = uri.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(Error::Config(format!("missing socket path in {uri}")));
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }
        Err(Error::Config(format!(
            "unsupported uri {uri} (expected tcp:// or unix://)"
        )))
    }
}

impl std::fmt::Display for ServerUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

/// Listening Wyoming event server
pub struct EventServer {
    rx: mpsc::Receiver<LifecycleEvent>,
    accept_task: JoinHandle<()>,
    local_addr: Option<SocketAddr>,
    socket_path: Option<PathBuf>,
}

impl EventServer {
    /// Bind and start accepting satellite connections
    ///
    /// # Errors
    ///
    /// Returns error if the address cannot be bound
    pub async fn bind(uri: &ServerUri) -> Result<Self> {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE);

        match uri {
            ServerUri::Tcp(addr) => {
                let listener = TcpListener::bind(addr)
                    .await
                    .map_err(|e| Error::Transport(format!("failed to bind {uri}: {e}")))?;
                let local_addr = listener.local_addr()?;
                tracing::info!(%local_addr, "event server listening");

                let accept_task = tokio::spawn(async move {
                    loop {
                        match listener.accept().await {
                            Ok((stream, peer)) => {
                                spawn_connection(stream, peer.to_string(), tx.clone());
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "failed to accept connection");
                                tokio::time::sleep(ACCEPT_RETRY).await;
                            }
                        }
                    }
                });

                Ok(Self {
                    rx,
                    accept_task,
                    local_addr: Some(local_addr),
                    socket_path: None,
                })
            }
            ServerUri::Unix(path) => Self::bind_unix(path, tx, rx),
        }
    }

    #[cfg(unix)]
    fn bind_unix(
        path: &std::path::Path,
        tx: mpsc::Sender<LifecycleEvent>,
        rx: mpsc::Receiver<LifecycleEvent>,
    ) -> Result<Self> {
        remove_stale_socket(path)?;

        let listener = tokio::net::UnixListener::bind(path).map_err(|e| {
            Error::Transport(format!("failed to bind {}: {e}", path.display()))
        })?;
        tracing::info!(path = %path.display(), "event server listening");

        let accept_task = tokio::spawn(async move {
            let mut next_id = 0_u64;
            loop {
                match listener.accept().await {
                    Ok((stream, _)) => {
                        next_id = next_id.wrapping_add(1);
                        spawn_connection(stream, format!("unix#{next_id}"), tx.clone());
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to accept connection");
                        tokio::time::sleep(ACCEPT_RETRY).await;
                    }
                }
            }
        });

        Ok(Self {
            rx,
            accept_task,
            local_addr: None,
            socket_path: Some(path.to_path_buf()),
        })
    }

    #[cfg(not(unix))]
    fn bind_unix(
        path: &std::path::Path,
        _tx: mpsc::Sender<LifecycleEvent>,
        _rx: mpsc::Receiver<LifecycleEvent>,
    ) -> Result<Self> {
        Err(Error::Config(format!(
            "unix sockets are not supported on this platform: {}",
            path.display()
        )))
    }

    /// Bound TCP address, if listening on TCP
    #[must_use]
    pub const fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

/// Remove a socket file left behind by a previous run
///
/// Anything other than a socket at `path` is refused rather than deleted.
#[cfg(unix)]
fn remove_stale_socket(path: &std::path::Path) -> Result<()> {
    use std::os::unix::fs::FileTypeExt;

    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            tracing::debug!(path = %path.display(), "removing stale socket");
            std::fs::remove_file(path)?;
            Ok(())
        }
        Ok(_) => Err(Error::Config(format!(
            "{} exists and is not a socket",
            path.display()
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl EventSource for EventServer {
    async fn next_event(&mut self) -> Option<LifecycleEvent> {
        self.rx.recv().await
    }
}

impl Drop for EventServer {
    fn drop(&mut self) {
        self.accept_task.abort();
        if let Some(path) = &self.socket_path
            && let Err(e) = std::fs::remove_file(path)
        {
            tracing::debug!(path = %path.display(), error = %e, "failed to remove socket file");
        }
    }
}

fn spawn_connection<S>(stream: S, peer: String, tx: mpsc::Sender<LifecycleEvent>)
where
    S: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        tracing::debug!(%peer, "client connected");
        read_connection(stream, &peer, &tx).await;
        tracing::debug!(%peer, "client disconnected");
    });
}

/// Forward lifecycle events from one connection until it closes
pub async fn read_connection<S>(stream: S, peer: &str, tx: &mpsc::Sender<LifecycleEvent>)
where
    S: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    loop {
        match read_event(&mut reader).await {
            Ok(Some(raw)) => {
                tracing::trace!(peer, event = %raw.event_type, "event received");
                let Some(event) = LifecycleEvent::from_wyoming(&raw) else {
                    continue;
                };
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            Ok(None) => return,
            Err(e) if e.is_recoverable() => {
                tracing::debug!(peer, error = %e, "discarding malformed event");
            }
            Err(e) => {
                tracing::warn!(peer, error = %e, "closing connection");
                return;
            }
        }
    }
}

/// Feed events from `source` to `handle` until the source ends or `shutdown` completes
pub async fn drain_events<S, F>(source: &mut S, shutdown: impl Future<Output = ()>, mut handle: F)
where
    S: EventSource + ?Sized,
    F: FnMut(&LifecycleEvent),
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            () = &mut shutdown => {
                tracing::info!("shutdown requested");
                break;
            }
            event = source.next_event() => match event {
                Some(event) => handle(&event),
                None => {
                    tracing::info!("event source closed");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;
    use crate::event::EventKind;

    #[test]
    fn parses_uris() {
        assert_eq!(
            "tcp://0.0.0.0:10500".parse::<ServerUri>().unwrap(),
            ServerUri::Tcp("0.0.0.0:10500".to_string())
        );
        assert_eq!(
            "unix:///run/satellite.sock".parse::<ServerUri>().unwrap(),
            ServerUri::Unix(PathBuf::from("/run/satellite.sock"))
        );
        assert!("http://localhost".parse::<ServerUri>().is_err());
        assert!("tcp://".parse::<ServerUri>().is_err());
    }

    #[tokio::test]
    async fn connection_forwards_known_events_only() {
        let mock = Builder::new()
            .read(b"{\"type\":\"satellite-connected\"}\n")
            .read(b"{\"type\":\"transcript\",\"data\":{\"text\":\"hi\"}}\n")
            .read(b"garbage\n")
            .read(b"{\"type\":\"played\"}\n")
            .build();
        let (tx, mut rx) = mpsc::channel(8);

        read_connection(mock, "test", &tx).await;
        drop(tx);

        let kinds: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![EventKind::SatelliteConnected, EventKind::PlaybackFinished]
        );
    }

    #[tokio::test]
    async fn drain_stops_on_shutdown() {
        let (_tx, mut rx) = mpsc::channel::<LifecycleEvent>(1);
        let mut seen = 0;

        tokio::time::timeout(
            Duration::from_secs(1),
            drain_events(&mut rx, std::future::ready(()), |_| seen += 1),
        )
        .await
        .unwrap();
        assert_eq!(seen, 0);
    }
}
