//! Command-line arguments.
//!
//! The listening port is fixed by design and is not configurable; the
//! only runtime knob is log verbosity.

use clap::Parser;

/// Command-line arguments for the server
#[derive(Parser, Debug)]
#[command(name = "hello-http")]
#[command(version = "0.1.0")]
#[command(about = "An iterative TCP server answering every request with a fixed HTTP response", long_about = None)]
pub struct CliArgs {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}
