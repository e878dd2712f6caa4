use clap::{CommandFactory, Parser};
use common::FlowError;
use tracing::{debug, instrument};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "flow",
    version,
    disable_help_flag = true,
    about = "Copy stdin to stdout while metering the data passing through",
    long_about = "`flow` copies stdin to stdout, applying a variety of metering and monitoring tools. \
It is useful for example to monitor the progress of tar, cpio and similar tools.

If flow knows the expected length of the stream, and it can use a variety of methods to find out, \
it can estimate time remaining and completion time. Without knowing the length of the stream it \
can still display progress but cannot estimate completion time. When no length option is given and \
stdin is a regular file, its size is used.

All status output goes to stderr, the data stream on stdout is never modified.

EXAMPLE:
    # Archive a directory, showing a bar graph and ETA based on its disk usage
    tar cf - /home | flow -u /home -b -e > home.tar

EXIT CODES:
    0  - Success
    1  - Waiting for input failed
    2  - Reading input failed
    3  - Writing output failed
    4  - Bad length value
    5  - Cannot stat reference file
    6  - Cannot stat filesystem
    7  - Bad or unknown option
    8  - Bad bargraph width
    9  - Invalid chunk size or interval
    10 - Standard streams could not be prepared
    20 - Could not run du
    21 - du failed"
)]
struct Args {
    // Stream length
    /// Length is NUM bytes (0x prefix for hex, leading 0 for octal)
    #[arg(short = 'l', long = "length", value_name = "NUM", group = "size", help_heading = "Stream length")]
    length: Option<String>,

    /// Use the length of FILE as the stream length
    #[arg(short = 'f', long = "file", value_name = "FILE", group = "size", help_heading = "Stream length")]
    file: Option<std::path::PathBuf>,

    /// Use the space in use on the filesystem mounted at MOUNTPOINT as the stream length
    #[arg(short = 'm', long = "mount", value_name = "MOUNTPOINT", group = "size", help_heading = "Stream length")]
    mount: Option<std::path::PathBuf>,

    /// Run `du -s` on PATH to estimate the stream length
    #[arg(short = 'u', long = "du", value_name = "PATH", group = "size", help_heading = "Stream length")]
    du: Option<std::path::PathBuf>,

    // Display
    /// Display count of transferred bytes and stream size
    ///
    /// This is the default when none of -c, -b, -n, -s, -e, -r or -t is given.
    #[arg(short = 'c', long = "counters", help_heading = "Display")]
    counters: bool,

    /// Make the counters human readable (K, M, G, ... in powers of 1024)
    #[arg(short = 'h', long = "human", help_heading = "Display")]
    human: bool,

    /// Display a bar graph WIDTH characters wide (default 80, widths below 10 are raised to 10)
    ///
    /// Wide bars are allowed, unlike the classic flow which fell back to 80 for any width outside
    /// 10..80.
    #[arg(
        short = 'b',
        long = "bar",
        value_name = "WIDTH",
        num_args = 0..=1,
        help_heading = "Display"
    )]
    bar: Option<Option<String>>,

    /// Display time elapsed
    #[arg(short = 's', long = "elapsed", help_heading = "Display")]
    elapsed: bool,

    /// Display the estimated completion time
    #[arg(short = 'e', long = "eta", help_heading = "Display")]
    eta: bool,

    /// Display the estimated time remaining
    #[arg(short = 'r', long = "remaining", help_heading = "Display")]
    remaining: bool,

    /// Print each status update on its own line instead of redrawing it in place
    #[arg(short = 'n', long = "newline", help_heading = "Display")]
    newline: bool,

    /// Print totals on completion
    #[arg(short = 't', long = "totals", help_heading = "Display")]
    totals: bool,

    // Transfer
    /// Interval between status updates
    ///
    /// This option accepts a human readable duration, e.g. "500ms", "1s", "2min" etc.
    #[arg(
        short = 'i',
        long = "interval",
        value_name = "DELAY",
        default_value = "1s",
        value_parser = humantime::parse_duration,
        help_heading = "Transfer"
    )]
    interval: std::time::Duration,

    /// Maximum number of bytes moved per read, accepts suffixes like "4KiB", "1MiB"
    #[arg(long, value_name = "SIZE", value_parser = parse_chunk_size, help_heading = "Transfer")]
    chunk_size: Option<usize>,

    /// Verbose level: -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Transfer")]
    verbose: u8,

    /// Print help (-h is taken by --human)
    #[allow(dead_code)]
    #[arg(long, action = clap::ArgAction::Help)]
    help: Option<bool>,
}

fn parse_chunk_size(value: &str) -> Result<usize, String> {
    let size = value.parse::<bytesize::ByteSize>()?;
    let size = usize::try_from(size.as_u64()).map_err(|error| error.to_string())?;
    if size == 0 {
        return Err("chunk size must be greater than zero".to_string());
    }
    Ok(size)
}

/// Parses an unsigned integer the way `strtoull` with base 0 does: `0x` for hex, a leading `0`
/// for octal, decimal otherwise. The whole string must be consumed.
fn parse_number(value: &str) -> Option<u64> {
    let value = value.trim_start();
    let value = value.strip_prefix('+').unwrap_or(value);
    let (digits, radix) = if let Some(hex) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        (hex, 16)
    } else if let Some(octal) = value.strip_prefix('0').filter(|rest| !rest.is_empty()) {
        (octal, 8)
    } else {
        (value, 10)
    };
    // from_str_radix tolerates a sign of its own
    if digits.starts_with(['+', '-']) {
        return None;
    }
    u64::from_str_radix(digits, radix).ok()
}

impl Args {
    fn size_source(&self) -> Result<common::SizeSource, FlowError> {
        if let Some(length) = &self.length {
            let size = parse_number(length).ok_or_else(|| FlowError::BadLength(length.clone()))?;
            return Ok(common::SizeSource::Explicit(size));
        }
        if let Some(file) = &self.file {
            return Ok(common::SizeSource::FileStat(file.clone()));
        }
        if let Some(mount) = &self.mount {
            return Ok(common::SizeSource::FilesystemUsage(mount.clone()));
        }
        if let Some(path) = &self.du {
            return Ok(common::SizeSource::ExternalProbe(path.clone()));
        }
        Ok(common::SizeSource::SeekProbe)
    }

    fn display(&self) -> Result<common::DisplayConfig, FlowError> {
        let bar_width = match &self.bar {
            None => None,
            Some(None) => Some(common::config::DEFAULT_BAR_WIDTH),
            Some(Some(width)) => {
                let parsed = parse_number(width)
                    .and_then(|width| usize::try_from(width).ok())
                    .ok_or_else(|| FlowError::BadBarWidth(width.clone()))?;
                Some(common::DisplayConfig::clamp_bar_width(parsed))
            }
        };
        Ok(common::DisplayConfig {
            elapsed: self.elapsed,
            counters: self.counters,
            human_readable: self.human,
            remaining: self.remaining,
            eta: self.eta,
            bar_width,
            append: self.newline,
            totals: self.totals,
        }
        .with_fallback())
    }

    fn engine(&self) -> common::EngineConfig {
        common::EngineConfig {
            chunk_size: self
                .chunk_size
                .unwrap_or(common::config::DEFAULT_CHUNK_SIZE),
            cadence: self.interval,
        }
    }
}

#[instrument(skip_all)]
fn run(args: &Args) -> Result<common::Outcome, FlowError> {
    // option values are checked before any I/O happens
    let source = args.size_source()?;
    let display = args.display()?;
    let engine = args.engine();
    engine.validate().map_err(FlowError::Config)?;
    debug!("size source: {:?}", source);
    common::pump(&source, display, engine)
}

fn main() {
    // no arguments at all: explain ourselves instead of silently pumping
    if std::env::args_os().len() < 2 {
        eprintln!("{}", Args::command().render_long_help());
        std::process::exit(0);
    }
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(error) => {
            let _ = error.print();
            let code = if error.exit_code() == 0 {
                0
            } else {
                FlowError::Usage(error.to_string()).exit_code()
            };
            std::process::exit(code);
        }
    };
    common::init_tracing(&common::OutputConfig {
        verbose: args.verbose,
    });
    match run(&args) {
        Ok(outcome) => debug!("done: {:?}", outcome),
        Err(error) => {
            debug!("fatal: {:?}", error);
            eprintln!("flow: {error}");
            std::process::exit(error.exit_code());
        }
    }
}
