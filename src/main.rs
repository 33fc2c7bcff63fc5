//! hello-http: a minimal iterative HTTP responder
//!
//! Accepts one TCP connection at a time on port 9292, reads a single
//! line from the peer, and answers with a fixed HTTP/1.1 200 response
//! before closing the connection.
//!
//! Deliberate non-features:
//! - No request parsing; the client's line is logged and ignored
//! - One in-flight connection; further handshakes wait in the backlog
//! - No timeouts and no graceful shutdown
//! - Every I/O error is fatal to the whole process

mod config;
mod protocol;
mod server;

use clap::Parser;
use config::CliArgs;
use server::{Listener, PORT};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let listener = Listener::bind(PORT)?;
    debug!(addr = %listener.local_addr()?, "Listener bound");
    info!("Starting HTTP server on port {PORT}");

    // Never returns under normal operation; the first setup, accept,
    // read, or write failure propagates here and ends the process.
    listener.accept_loop()?;
    Ok(())
}
