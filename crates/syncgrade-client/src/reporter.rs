//! One-connection-per-event reporter.

use std::{
    hash::{DefaultHasher, Hash, Hasher},
    net::SocketAddr,
    time::Duration,
};

use syncgrade_proto::{EntityKey, EventKind, EventReport, OsIds, Reply};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

use crate::error::ClientError;

/// Sends BEGIN/END reports to a verifier.
///
/// Holds no connection between events. OS identifiers are captured from the
/// calling thread at send time unless fixed with [`Reporter::with_os_ids`].
#[derive(Debug, Clone)]
pub struct Reporter {
    addr: SocketAddr,
    os: Option<OsIds>,
}

impl Reporter {
    /// Reporter for the verifier at `addr`.
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr, os: None }
    }

    /// Report `os` instead of the calling thread's identifiers.
    #[must_use]
    pub fn with_os_ids(mut self, os: OsIds) -> Self {
        self.os = Some(os);
        self
    }

    /// Send one report and return the delay from the reply.
    pub async fn send(&self, kind: EventKind, key: EntityKey) -> Result<Duration, ClientError> {
        let os = self.os.unwrap_or_else(current_os_ids);
        let report = EventReport::new(kind, key, os);

        let mut stream = TcpStream::connect(self.addr)
            .await
            .map_err(|source| ClientError::Connect { addr: self.addr, source })?;
        stream.write_all(&report.to_bytes()).await?;

        let mut buf = [0u8; Reply::SIZE];
        stream.read_exact(&mut buf).await?;
        let reply = Reply::decode(&buf)?;

        tracing::trace!(%key, %kind, delay_micros = reply.delay_micros(), "Reported event");
        Ok(reply.delay())
    }

    /// Report BEGIN and sleep for the returned delay.
    pub async fn begin(&self, key: EntityKey) -> Result<Duration, ClientError> {
        let delay = self.send(EventKind::Begin, key).await?;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(delay)
    }

    /// Report END.
    pub async fn end(&self, key: EntityKey) -> Result<(), ClientError> {
        self.send(EventKind::End, key).await?;
        Ok(())
    }
}

/// Identifiers of the calling process and thread.
///
/// The thread id is a stable hash of [`std::thread::ThreadId`], distinct per
/// live thread within the process.
pub fn current_os_ids() -> OsIds {
    let mut hasher = DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);

    OsIds {
        pid: std::process::id() as i32,
        ppid: parent_pid(),
        tid: (hasher.finish() & 0x7fff_ffff) as i32,
    }
}

#[cfg(unix)]
fn parent_pid() -> i32 {
    std::os::unix::process::parent_id() as i32
}

#[cfg(not(unix))]
fn parent_pid() -> i32 {
    0
}
