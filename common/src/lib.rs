//! Core of the `flow` byte pump
//!
//! `flow` copies its standard input to its standard output unchanged and, on standard error,
//! keeps a status line up to date with how much has been moved, how long it took and, when the
//! length of the stream is known ahead of time, how long is left.
//!
//! # Structure
//!
//! - [`size`] turns one of several size-discovery strategies into an optional expected total
//! - [`engine`] runs the copy loop and decides when the status line is due
//! - [`metrics`] derives elapsed time, rate, time remaining and ETA from the counters
//! - [`render`] formats the status line and the optional totals line
//!
//! The status stream never carries any of the forwarded data, so `flow` can sit anywhere in a
//! pipeline:
//!
//! ```text
//! tar cf - /home | flow -l 0x40000000 -b -e | gzip > home.tar.gz
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod render;
pub mod size;

pub use config::DisplayConfig;
pub use config::EngineConfig;
pub use config::OutputConfig;
pub use engine::Outcome;
pub use error::FlowError;
pub use size::SizeSource;

use std::os::fd::AsFd;
use tracing::{info, warn};

/// Sets up logging to stderr; `RUST_LOG` takes precedence over the verbosity level.
pub fn init_tracing(output: &OutputConfig) {
    let level = match output.verbose {
        0 => "error",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

/// Pumps stdin to stdout, drawing progress on stderr.
///
/// The expected size is resolved before the first byte is read. Both data descriptors are used
/// unbuffered so nothing lingers in memory beyond the chunk in flight.
pub fn pump(
    source: &SizeSource,
    display_config: DisplayConfig,
    config: EngineConfig,
) -> Result<Outcome, FlowError> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut input =
        std::fs::File::from(stdin.as_fd().try_clone_to_owned().map_err(FlowError::Setup)?);
    let mut output =
        std::fs::File::from(stdout.as_fd().try_clone_to_owned().map_err(FlowError::Setup)?);
    let expected_total = size::resolve_expected_size(source, &mut input)?;
    if let Err(error) = engine::set_nonblocking(stdin.as_fd()) {
        warn!("cannot switch input to non-blocking mode: {}", error);
    }
    info!("display config: {:?}", display_config);
    let mut readiness = engine::PollReadiness::new(stdin.as_fd());
    let mut session = engine::Session::new(
        config,
        render::StatusRenderer::new(display_config),
        engine::SystemClock,
        expected_total,
    );
    session.run(
        &mut input,
        &mut readiness,
        &mut output,
        &mut std::io::stderr().lock(),
    )
}
