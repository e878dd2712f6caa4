//! Configuration types for the copy engine and the status line

/// Default number of bytes moved per read/write pair
pub const DEFAULT_CHUNK_SIZE: usize = 0x10000;

/// Default bar graph width when `--bar` is given without a value
pub const DEFAULT_BAR_WIDTH: usize = 80;

/// Narrowest bar graph that is still readable
pub const MIN_BAR_WIDTH: usize = 10;

/// Shortest display interval the readiness wait can honour
pub const MIN_CADENCE: std::time::Duration = std::time::Duration::from_millis(1);

/// Which fields the status line shows and how it is terminated
///
/// Built once by the CLI layer and never modified afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayConfig {
    /// Show seconds elapsed since the transfer started
    pub elapsed: bool,
    /// Show the transferred byte count (and the expected total, if known)
    pub counters: bool,
    /// Scale counters by powers of 1024 with a magnitude suffix
    pub human_readable: bool,
    /// Show the estimated time remaining
    pub remaining: bool,
    /// Show the estimated completion time of day
    pub eta: bool,
    /// Bar graph width in cells, `None` disables the bar
    pub bar_width: Option<usize>,
    /// Emit each status update as its own line instead of repainting in place
    pub append: bool,
    /// Print a totals line when the stream ends
    pub totals: bool,
}

impl DisplayConfig {
    /// Forces the plain counter on when nothing else would produce output.
    ///
    /// Append mode and totals count as output selection, so `-n` or `-t` alone do not trigger the
    /// fallback.
    #[must_use]
    pub fn with_fallback(mut self) -> Self {
        if !(self.counters
            || self.bar_width.is_some()
            || self.append
            || self.elapsed
            || self.eta
            || self.remaining
            || self.totals)
        {
            self.counters = true;
        }
        self
    }

    /// Clamps a requested bar width to the minimum.
    #[must_use]
    pub fn clamp_bar_width(width: usize) -> usize {
        width.max(MIN_BAR_WIDTH)
    }
}

/// Copy loop settings
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Maximum number of bytes read per iteration
    pub chunk_size: usize,
    /// Readiness-wait timeout, also the status refresh interval
    pub cadence: std::time::Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            cadence: std::time::Duration::from_secs(1),
        }
    }
}

impl EngineConfig {
    /// Validate configuration and return errors if invalid
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk size must be greater than zero".to_string());
        }
        // poll(2) works in whole milliseconds, anything shorter would spin
        if self.cadence < MIN_CADENCE {
            return Err(format!(
                "display interval must be at least {MIN_CADENCE:?}, got {:?}",
                self.cadence
            ));
        }
        Ok(())
    }
}

/// Output and logging configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Verbosity level: 0=ERROR, 1=INFO, 2=DEBUG, 3=TRACE
    pub verbose: u8,
}
