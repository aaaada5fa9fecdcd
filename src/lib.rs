//! port-probe: paired TCP echo checks for network reachability.
//!
//! Two peer components connected only by the network:
//!
//! - [`EchoServer`] verifies a port is free by binding it, then echoes
//!   every byte each accepted connection sends until closed.
//! - [`EchoClient`] dials a target host:port with a bounded timeout,
//!   sends `"ECHO\n"`, and verifies the same line comes back.
//!
//! Both expose a `check()` returning a three-valued outcome: `Ok(true)`
//! (positive), `Ok(false)` (expected negative, e.g. port in use or echo
//! mismatch), or `Err(CheckError)` (the check itself failed). Scheduling,
//! retries, and result aggregation belong to the caller.

pub mod client;
pub mod error;
pub mod server;

pub use client::{EchoClient, DEFAULT_DIAL_TIMEOUT, PROBE_MESSAGE};
pub use error::CheckError;
pub use server::{DiagnosticSink, EchoServer, TracingSink};
