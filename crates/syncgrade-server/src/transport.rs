//! TCP event transport.
//!
//! Every event arrives on its own connection: the reporter connects, writes
//! one 24-byte report, reads one 4-byte reply and the server closes. Each
//! connection is served on its own task; only the recorder call is
//! serialized, through the shared mutex.
//!
//! Anything that goes wrong on a connection (short read, early close, read
//! timeout) is recorded as a protocol violation and answered with a zero
//! reply. It never stops the accept loop.
//!
//! A connection belongs to the scenario that was running when it was
//! accepted. If the recorder has been reset since, whatever it delivers is
//! dropped instead of leaking into the next scenario.
//!
//! # Shutdown
//!
//! The accept loop is blocked in `accept`, so [`TransportHandle::shutdown`]
//! sets a stop flag and then opens one connection to the listener itself. The
//! loop sees the flag on that sentinel connection and exits without touching
//! the recorder.

use std::{
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use syncgrade_proto::{DEFAULT_PORT, EventReport, Reply};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};

use crate::{SharedRecorder, error::ServerError};

/// Pause after a failed `accept` (e.g. out of file descriptors).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Address to bind to (e.g., "127.0.0.1:1988")
    pub bind_address: String,
    /// How long a connection may take to deliver its report
    pub read_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_address: format!("127.0.0.1:{DEFAULT_PORT}"),
            read_timeout: Duration::from_secs(1),
        }
    }
}

/// Bound listener feeding reports into the shared recorder.
pub struct EventTransport {
    listener: TcpListener,
    recorder: SharedRecorder,
    read_timeout: Duration,
    stop: Arc<AtomicBool>,
}

impl EventTransport {
    /// Bind the listener.
    pub async fn bind(
        config: &TransportConfig,
        recorder: SharedRecorder,
    ) -> Result<Self, ServerError> {
        let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
            ServerError::Transport(format!("invalid bind address '{}': {e}", config.bind_address))
        })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Transport(format!("failed to bind {addr}: {e}")))?;

        tracing::info!(%addr, "Event transport bound");

        Ok(Self {
            listener,
            recorder,
            read_timeout: config.read_timeout,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Local address the transport is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener
            .local_addr()
            .map_err(|e| ServerError::Transport(format!("failed to get local address: {e}")))
    }

    /// Start the accept loop on its own task.
    pub fn spawn(self) -> Result<TransportHandle, ServerError> {
        let addr = self.local_addr()?;
        let stop = Arc::clone(&self.stop);
        let task = tokio::spawn(self.run());

        Ok(TransportHandle { addr, stop, task })
    }

    async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    if self.stop.load(Ordering::Acquire) {
                        tracing::debug!(%peer, "Shutdown sentinel received");
                        break;
                    }

                    let recorder = Arc::clone(&self.recorder);
                    let epoch = recorder.lock().await.epoch();
                    let read_timeout = self.read_timeout;
                    tokio::spawn(async move {
                        let served = handle_connection(stream, recorder, epoch, read_timeout);
                        if let Err(e) = served.await {
                            tracing::debug!(%peer, "Reply not delivered: {e}");
                        }
                    });
                },
                Err(e) => {
                    tracing::warn!("Accept error: {e}");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                },
            }
        }

        tracing::info!("Event transport stopped");
    }
}

/// Handle to a running accept loop.
#[derive(Debug)]
pub struct TransportHandle {
    addr: SocketAddr,
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl TransportHandle {
    /// Address reporters should connect to.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop the accept loop and wait for it to exit.
    ///
    /// Connections already being served finish on their own tasks.
    pub async fn shutdown(self) -> Result<(), ServerError> {
        self.stop.store(true, Ordering::Release);

        let target = connectable(self.addr);
        if let Err(e) = TcpStream::connect(target).await {
            tracing::warn!(%target, "Sentinel connection failed, aborting accept loop: {e}");
            self.task.abort();
        }

        match self.task.await {
            Ok(()) => Ok(()),
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(ServerError::Transport(format!("accept loop failed: {e}"))),
        }
    }
}

/// Loopback equivalent of a wildcard bind address.
fn connectable(addr: SocketAddr) -> SocketAddr {
    match addr {
        SocketAddr::V4(v4) if v4.ip().is_unspecified() => {
            SocketAddr::from((Ipv4Addr::LOCALHOST, v4.port()))
        },
        SocketAddr::V6(v6) if v6.ip().is_unspecified() => {
            SocketAddr::from((Ipv6Addr::LOCALHOST, v6.port()))
        },
        other => other,
    }
}

/// Serve one report for the scenario that was current at accept time.
async fn handle_connection(
    mut stream: TcpStream,
    recorder: SharedRecorder,
    epoch: u64,
    read_timeout: Duration,
) -> io::Result<()> {
    let reply = match read_report(&mut stream, read_timeout).await {
        Ok(report) => match recorder.lock().await.accept_in(epoch, &report) {
            Ok(delay) => Reply::from_delay(delay),
            Err(_) => Reply::ZERO,
        },
        Err(reason) => {
            recorder.lock().await.record_malformed_in(epoch, reason);
            Reply::ZERO
        },
    };

    stream.write_all(&reply.to_bytes()).await?;
    stream.shutdown().await
}

/// Read exactly one report. The error is the violation reason.
async fn read_report(
    stream: &mut TcpStream,
    read_timeout: Duration,
) -> Result<EventReport, String> {
    let mut buf = [0u8; EventReport::SIZE];

    match tokio::time::timeout(read_timeout, stream.read_exact(&mut buf)).await {
        Err(_) => Err(format!("no report within {} ms", read_timeout.as_millis())),
        Ok(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
            Err("connection closed before a full report".to_string())
        },
        Ok(Err(e)) => Err(format!("read failed: {}", e.kind())),
        Ok(Ok(_)) => EventReport::decode(&buf).map_err(|e| e.to_string()),
    }
}
