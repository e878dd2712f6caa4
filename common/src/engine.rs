//! The copy loop
//!
//! Each iteration waits for the input to become readable, bounded by the display cadence, moves
//! at most one chunk from input to output and then decides whether the status line is due. The
//! wait is the only place the loop suspends, so the status keeps ticking even while no data
//! arrives.
//!
//! A chunk is written out in full before it is counted and before the next read is attempted. A
//! slow consumer therefore blocks the writer and, through it, the reader.

use std::io::{ErrorKind, Read, Write};
use std::os::fd::BorrowedFd;
use tracing::{debug, info, instrument, trace};

use crate::config::EngineConfig;
use crate::error::FlowError;
use crate::metrics::{Metrics, Snapshot};
use crate::render::StatusRenderer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ready {
    Readable,
    TimedOut,
}

/// Waits until the input can be read or the timeout expires
pub trait Readiness {
    fn wait(&mut self, timeout: std::time::Duration) -> std::io::Result<Ready>;
}

/// [`Readiness`] for a file descriptor, backed by `poll(2)`
#[derive(Debug)]
pub struct PollReadiness<'fd> {
    fd: BorrowedFd<'fd>,
}

impl<'fd> PollReadiness<'fd> {
    pub fn new(fd: BorrowedFd<'fd>) -> Self {
        Self { fd }
    }
}

impl Readiness for PollReadiness<'_> {
    fn wait(&mut self, timeout: std::time::Duration) -> std::io::Result<Ready> {
        use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
        let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        let timeout = PollTimeout::try_from(millis)
            .map_err(|error| std::io::Error::other(format!("{error:?}")))?;
        let mut fds = [PollFd::new(self.fd, PollFlags::POLLIN)];
        match poll(&mut fds, timeout) {
            Ok(0) => Ok(Ready::TimedOut),
            // hang-up and error conditions also count: the following read reports them
            Ok(_) => Ok(Ready::Readable),
            // a signal cut the wait short, same as a timeout for our purposes
            Err(nix::errno::Errno::EINTR) => Ok(Ready::TimedOut),
            Err(errno) => Err(errno.into()),
        }
    }
}

/// Switches `fd` to non-blocking mode so a read never stalls the loop.
pub fn set_nonblocking(fd: BorrowedFd<'_>) -> nix::Result<()> {
    use nix::fcntl::{FcntlArg, OFlag, fcntl};
    let flags = OFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFL)?);
    fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
    Ok(())
}

/// Wall clock with whole-second resolution
pub trait Clock {
    /// Seconds since the Unix epoch
    fn now(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Counters owned by the copy loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferState {
    bytes_transferred: u64,
    start: i64,
    now: i64,
    last_display: Option<i64>,
    expected_total: Option<u64>,
}

impl TransferState {
    pub fn new(start: i64, expected_total: Option<u64>) -> Self {
        Self {
            bytes_transferred: 0,
            start,
            now: start,
            last_display: None,
            expected_total: expected_total.filter(|&total| total > 0),
        }
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    pub fn advance(&mut self, bytes: u64) {
        self.bytes_transferred = self.bytes_transferred.saturating_add(bytes);
    }

    pub fn tick(&mut self, now: i64) {
        self.now = now;
    }

    /// The status is redrawn at most once per wall-clock second, and always at end of stream.
    pub fn display_due(&self, eof: bool) -> bool {
        eof || self.last_display.is_none_or(|last| self.now > last)
    }

    pub fn mark_displayed(&mut self) {
        self.last_display = Some(self.now);
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            bytes_transferred: self.bytes_transferred,
            start: self.start,
            now: self.now,
            expected_total: self.expected_total,
        }
    }
}

/// What a completed transfer looked like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub bytes_transferred: u64,
    pub elapsed_secs: u64,
}

/// Everything one run of the pump needs, built once before the loop starts
#[derive(Debug)]
pub struct Session<C: Clock> {
    config: EngineConfig,
    renderer: StatusRenderer,
    clock: C,
    expected_total: Option<u64>,
}

impl<C: Clock> Session<C> {
    pub fn new(
        config: EngineConfig,
        renderer: StatusRenderer,
        clock: C,
        expected_total: Option<u64>,
    ) -> Self {
        Self {
            config,
            renderer,
            clock,
            expected_total,
        }
    }

    /// Pumps `input` to `output` until end of stream, drawing progress on `status`.
    ///
    /// Failures to write the status stream are logged and otherwise ignored; the data path is
    /// what matters. Any failure on the data path ends the transfer with the matching error.
    #[instrument(skip_all)]
    pub fn run<R, P, W, S>(
        &mut self,
        input: &mut R,
        readiness: &mut P,
        output: &mut W,
        status: &mut S,
    ) -> Result<Outcome, FlowError>
    where
        R: Read,
        P: Readiness,
        W: Write,
        S: Write,
    {
        self.config.validate().map_err(FlowError::Config)?;
        let mut buffer = vec![0u8; self.config.chunk_size];
        let mut state = TransferState::new(self.clock.now(), self.expected_total);
        info!(
            "transfer started, chunk size {}, expected size {:?}",
            self.config.chunk_size, self.expected_total
        );
        loop {
            let mut eof = false;
            let mut moved = 0;
            match readiness.wait(self.config.cadence).map_err(FlowError::Wait)? {
                Ready::TimedOut => trace!("no input within {:?}", self.config.cadence),
                Ready::Readable => match input.read(&mut buffer) {
                    Ok(0) => {
                        debug!("end of stream");
                        eof = true;
                    }
                    Ok(count) => {
                        output
                            .write_all(&buffer[..count])
                            .map_err(FlowError::Write)?;
                        moved = count;
                    }
                    Err(error)
                        if matches!(error.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) =>
                    {
                        trace!("spurious wakeup: {}", error);
                    }
                    Err(error) => return Err(FlowError::Read(error)),
                },
            }
            state.advance(moved as u64);
            state.tick(self.clock.now());
            if state.display_due(eof) {
                state.mark_displayed();
                let snapshot = state.snapshot();
                let line = self.renderer.render(&snapshot, &Metrics::compute(&snapshot));
                write_status(status, &line);
            }
            if eof {
                break;
            }
        }
        output.flush().map_err(FlowError::Write)?;
        let snapshot = state.snapshot();
        let metrics = Metrics::compute(&snapshot);
        write_status(status, &self.renderer.finish(&snapshot, &metrics));
        info!(
            "transfer finished: {} bytes in {}s",
            snapshot.bytes_transferred, metrics.elapsed_secs
        );
        Ok(Outcome {
            bytes_transferred: snapshot.bytes_transferred,
            elapsed_secs: metrics.elapsed_secs,
        })
    }
}

fn write_status<S: Write>(status: &mut S, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Err(error) = status
        .write_all(text.as_bytes())
        .and_then(|()| status.flush())
    {
        debug!("failed to update status: {}", error);
    }
}
