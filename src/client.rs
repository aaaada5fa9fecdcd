//! Client half of the reachability check.
//!
//! Dials a remote host:port, sends a probe line, and verifies the exact
//! same line comes back. Reachability plus a correct echo is a positive
//! result; a reachable port that breaks the echo contract is a negative
//! result, not an error.

use crate::error::CheckError;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Probe line sent by the client and expected back verbatim.
pub const PROBE_MESSAGE: &str = "ECHO\n";

/// Dial timeout used when none is configured.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Echo client targeting one host and port.
///
/// Every call to [`check`](EchoClient::check) is an independent attempt
/// with its own connection; no state carries over between calls.
pub struct EchoClient {
    host: String,
    port: u16,
    timeout: Duration,
}

impl EchoClient {
    /// Create a client with the default dial timeout of
    /// [`DEFAULT_DIAL_TIMEOUT`].
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: DEFAULT_DIAL_TIMEOUT,
        }
    }

    /// Override the dial timeout. The timeout bounds only the dial; the
    /// line read that follows has no independent deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Dial the target, send the probe, and compare the echoed line.
    ///
    /// Returns `Ok(true)` when the echo round-trip is intact, `Ok(false)`
    /// when the peer closed without sending anything or echoed different
    /// content, and `Err` when the target is unreachable or the read
    /// fails partway through.
    pub async fn check(&self) -> Result<bool, CheckError> {
        let addr = format!("{}:{}", self.host, self.port);
        let stream = match timeout(self.timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(self.unreachable(e)),
            Err(_) => {
                return Err(self.unreachable(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect timed out after {:?}", self.timeout),
                )))
            }
        };
        debug!(addr = %addr, "dialed target");

        let (reader, mut writer) = stream.into_split();

        // A failed write surfaces on the read that follows, as an error
        // or end-of-stream.
        let _ = writer.write_all(PROBE_MESSAGE.as_bytes()).await;

        let mut reader = BufReader::new(reader);
        let mut line = String::with_capacity(PROBE_MESSAGE.len());
        match reader.read_line(&mut line).await {
            // Peer closed before sending anything: a valid negative
            // result, not an infrastructure failure.
            Ok(0) => Ok(false),
            Ok(_) => Ok(line == PROBE_MESSAGE),
            Err(e) => Err(CheckError::Read(e)),
        }
    }

    fn unreachable(&self, source: io::Error) -> CheckError {
        CheckError::Unreachable {
            host: self.host.clone(),
            port: self.port,
            source,
        }
    }
}
