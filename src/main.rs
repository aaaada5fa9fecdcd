//! port-probe: pre-flight TCP reachability checks between hosts.
//!
//! Runs one side of a paired echo check:
//! - server mode: verify a port is free, bind it, and echo until ctrl-c
//! - client mode: dial a remote port, send a probe line, verify the echo
//!
//! Exit codes: 0 = check passed, 1 = expected negative result (port in
//! use, echo mismatch), 2 = the check itself failed.

mod config;

use config::{Config, Mode};
use port_probe::{CheckError, EchoClient, EchoServer};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        mode = ?config.mode,
        host = %config.host,
        port = config.port,
        timeout_secs = config.timeout.as_secs(),
        "Starting port-probe"
    );

    let outcome = match config.mode {
        Mode::Server => run_server(&config).await,
        Mode::Client => run_client(&config).await,
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %e, "check did not complete");
            ExitCode::from(2)
        }
    }
}

/// Bind the port and echo until interrupted. A busy port is a negative
/// result, not a failure.
async fn run_server(config: &Config) -> Result<bool, CheckError> {
    let mut server = EchoServer::new(config.port);
    if !server.check().await? {
        warn!(port = config.port, "port is already in use");
        return Ok(false);
    }

    if let Some(addr) = server.local_addr() {
        info!(addr = %addr, "echo server up, press ctrl-c to stop");
    }
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to wait for shutdown signal");
    }

    server.close().await?;
    Ok(true)
}

/// Run one client check against the configured target.
async fn run_client(config: &Config) -> Result<bool, CheckError> {
    let client = EchoClient::new(config.host.clone(), config.port).with_timeout(config.timeout);

    let ok = client.check().await?;
    if ok {
        info!(host = %config.host, port = config.port, "echo round-trip intact");
    } else {
        warn!(
            host = %config.host,
            port = config.port,
            "target reachable but echo contract not satisfied"
        );
    }
    Ok(ok)
}
