//! Error vocabulary shared by the echo checks.
//!
//! A check that completes with a negative result is not an error; it is
//! reported as `Ok(false)`. These variants cover failures of the check
//! machinery itself, plus misuse of the server lifecycle contract.

use std::io;

/// Errors produced by [`EchoServer`](crate::EchoServer) and
/// [`EchoClient`](crate::EchoClient) checks.
#[derive(Debug)]
pub enum CheckError {
    /// The listener could not be bound for a reason other than the
    /// address already being in use.
    Bind {
        /// Port the bind was attempted on.
        port: u16,
        /// Underlying I/O failure.
        source: io::Error,
    },
    /// The target could not be dialed within the configured timeout.
    Unreachable {
        /// Host that was dialed.
        host: String,
        /// Port that was dialed.
        port: u16,
        /// Underlying I/O failure (refusal, timeout, resolution, ...).
        source: io::Error,
    },
    /// Reading the echoed line failed partway through. A clean
    /// end-of-stream before any data is not a `Read` error; it is a
    /// negative check result.
    Read(io::Error),
    /// `close` was called on a server whose `check` never succeeded.
    NotStarted,
    /// `check` was called on a server that is already listening.
    AlreadyStarted,
}

impl std::fmt::Display for CheckError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckError::Bind { port, source } => {
                write!(f, "error listening on port {port}: {source}")
            }
            CheckError::Unreachable { host, port, source } => {
                write!(f, "port {port} on host \"{host}\" is unreachable: {source}")
            }
            CheckError::Read(e) => write!(f, "error reading from TCP socket: {e}"),
            CheckError::NotStarted => {
                write!(f, "called close on an echo server that was never started")
            }
            CheckError::AlreadyStarted => {
                write!(f, "called check on an echo server that is already listening")
            }
        }
    }
}

impl std::error::Error for CheckError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CheckError::Bind { source, .. } | CheckError::Unreachable { source, .. } => {
                Some(source)
            }
            CheckError::Read(e) => Some(e),
            CheckError::NotStarted | CheckError::AlreadyStarted => None,
        }
    }
}
