//! Server half of the reachability check.
//!
//! Verifies that a TCP port is free by binding it, then stands up an
//! echo service on it that an [`EchoClient`](crate::EchoClient) on a
//! remote host can probe.

use crate::error::CheckError;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Destination for accept-loop failures.
///
/// The core has no opinion on where its warnings go; the orchestrator
/// driving the check decides by injecting a sink.
pub trait DiagnosticSink: Send + Sync + 'static {
    /// Called when `accept` fails while the server is not shutting down.
    fn accept_error(&self, err: &io::Error);
}

/// Default sink that forwards accept failures to `tracing`.
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn accept_error(&self, err: &io::Error) {
        warn!(error = %err, "error accepting connection");
    }
}

/// Echo server bound to a single port.
///
/// Created idle; [`check`](EchoServer::check) attempts the bind and, on
/// success, starts accepting in the background. [`close`](EchoServer::close)
/// is only valid after a successful `check`.
pub struct EchoServer {
    port: u16,
    sink: Arc<dyn DiagnosticSink>,
    running: Option<Running>,
}

/// State that exists only while the server is listening. Taken (not
/// cloned) on close so the shutdown signal fires exactly once.
struct Running {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

impl EchoServer {
    /// Create an idle server for the given port. Port 0 asks the OS to
    /// pick a free port; see [`local_addr`](EchoServer::local_addr).
    pub fn new(port: u16) -> Self {
        Self {
            port,
            sink: Arc::new(TracingSink),
            running: None,
        }
    }

    /// Replace the default `tracing` sink for accept-loop warnings.
    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Address the listener is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    /// Attempt to bind the port and start echoing.
    ///
    /// Returns `Ok(true)` when the port was free and the server is now
    /// accepting in the background, `Ok(false)` when the port is already
    /// in use (a valid negative result, not an error), and `Err` for any
    /// other bind failure.
    pub async fn check(&mut self) -> Result<bool, CheckError> {
        if self.running.is_some() {
            return Err(CheckError::AlreadyStarted);
        }

        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port));
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => return Ok(false),
            Err(e) => {
                return Err(CheckError::Bind {
                    port: self.port,
                    source: e,
                })
            }
        };
        let local_addr = listener.local_addr().map_err(|e| CheckError::Bind {
            port: self.port,
            source: e,
        })?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let sink = Arc::clone(&self.sink);
        let accept_task = tokio::spawn(accept_loop(listener, shutdown_rx, sink));

        self.running = Some(Running {
            local_addr,
            shutdown,
            accept_task,
        });
        debug!(addr = %local_addr, "echo server listening");
        Ok(true)
    }

    /// Stop accepting and release the listening socket.
    ///
    /// Connections already echoing run to natural completion; they are
    /// not torn down. Returns [`CheckError::NotStarted`] if `check` never
    /// started this server, without touching any socket.
    pub async fn close(&mut self) -> Result<(), CheckError> {
        let running = self.running.take().ok_or(CheckError::NotStarted)?;

        // The receiver may already be gone if the loop exited on its own.
        let _ = running.shutdown.send(true);

        // Wait for the loop to drop the listener so the port is free
        // when this returns.
        if let Err(e) = running.accept_task.await {
            warn!(error = %e, "accept loop ended abnormally");
        }
        debug!(port = self.port, "echo server closed");
        Ok(())
    }
}

/// Accept connections until shutdown is signaled, handing each one to
/// its own echo task. A single failed accept does not stop the loop.
async fn accept_loop(
    listener: TcpListener,
    mut shutdown: watch::Receiver<bool>,
    sink: Arc<dyn DiagnosticSink>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                debug!("echo server shutting down");
                return;
            }
            result = listener.accept() => match result {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "new connection");
                    tokio::spawn(echo(stream));
                }
                Err(e) => {
                    if *shutdown.borrow() {
                        // Expected failure from the socket going away.
                        return;
                    }
                    sink.accept_error(&e);
                }
            }
        }
    }
}

/// Copy every byte the peer sends back to it until the peer closes or
/// an I/O error occurs, then drop the connection closed.
async fn echo(mut stream: TcpStream) {
    let (mut reader, mut writer) = stream.split();
    if let Err(e) = tokio::io::copy(&mut reader, &mut writer).await {
        debug!(error = %e, "echo connection ended with error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::EchoClient;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio_test::assert_ok;

    async fn start_server() -> (EchoServer, u16) {
        let mut server = EchoServer::new(0);
        assert!(server.check().await.unwrap());
        let port = server.local_addr().unwrap().port();
        (server, port)
    }

    #[tokio::test]
    async fn free_port_check_passes() {
        let (mut server, port) = start_server().await;
        assert_ne!(port, 0);
        server.close().await.unwrap();
    }

    #[tokio::test]
    async fn occupied_port_is_negative_not_error() {
        let (mut first, port) = start_server().await;

        let mut second = EchoServer::new(port);
        assert!(!second.check().await.unwrap());
        assert!(second.local_addr().is_none());

        first.close().await.unwrap();
    }

    #[tokio::test]
    async fn close_before_check_is_contract_error() {
        let mut server = EchoServer::new(0);
        assert!(matches!(server.close().await, Err(CheckError::NotStarted)));
    }

    #[tokio::test]
    async fn double_close_is_contract_error() {
        let (mut server, _) = start_server().await;
        server.close().await.unwrap();
        assert!(matches!(server.close().await, Err(CheckError::NotStarted)));
    }

    #[tokio::test]
    async fn check_while_running_is_contract_error() {
        let (mut server, _) = start_server().await;
        assert!(matches!(
            server.check().await,
            Err(CheckError::AlreadyStarted)
        ));
        server.close().await.unwrap();
    }

    #[tokio::test]
    async fn round_trip_succeeds() {
        let (mut server, port) = start_server().await;

        let client = EchoClient::new("127.0.0.1", port);
        tokio_test::assert_ok!(client.check().await);
        assert!(client.check().await.unwrap());

        server.close().await.unwrap();
    }

    #[tokio::test]
    async fn close_releases_the_port() {
        let (mut server, port) = start_server().await;
        server.close().await.unwrap();

        let client = EchoClient::new("127.0.0.1", port);
        assert!(matches!(
            client.check().await,
            Err(CheckError::Unreachable { .. })
        ));

        // The port is bindable again too.
        let mut next = EchoServer::new(port);
        assert!(next.check().await.unwrap());
        next.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_checks_all_pass_without_crosstalk() {
        let (mut server, port) = start_server().await;

        let mut tasks = Vec::with_capacity(50);
        for _ in 0..50 {
            tasks.push(tokio::spawn(async move {
                EchoClient::new("127.0.0.1", port).check().await
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap().unwrap());
        }

        server.close().await.unwrap();
    }

    #[tokio::test]
    async fn echoes_raw_bytes_without_framing() {
        let (mut server, port) = start_server().await;

        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        stream.write_all(b"no newline here").await.unwrap();

        let mut buf = [0u8; 32];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &b"no newline here"[..n]);

        server.close().await.unwrap();
    }

    struct CountingSink(AtomicUsize);

    impl DiagnosticSink for CountingSink {
        fn accept_error(&self, _err: &io::Error) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[tokio::test]
    async fn sink_is_injectable() {
        let sink = Arc::new(CountingSink(AtomicUsize::new(0)));
        let mut server = EchoServer::new(0).with_diagnostics(sink.clone());
        assert!(server.check().await.unwrap());

        // A clean shutdown never reports through the sink.
        server.close().await.unwrap();
        assert_eq!(sink.0.load(Ordering::Relaxed), 0);
    }
}
