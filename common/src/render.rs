//! Status line formatting
//!
//! A status line is assembled from the enabled fields in a fixed order: elapsed time, byte
//! counter, remaining time, ETA and the bar graph. Each field except the bar, which is delimited
//! by its own `|` characters, is followed by a single space.
//!
//! In repaint mode the line ends with a carriage return and is padded with spaces so that it
//! fully covers whatever the previous line left on the terminal. In append mode every line ends
//! with a newline and nothing is ever erased.

use std::fmt::Write as _;
use tracing::{instrument, trace};

use crate::config::DisplayConfig;
use crate::metrics::{Metrics, Snapshot};

const MAGNITUDES: [&str; 9] = ["", "K", "M", "G", "T", "P", "E", "Z", "Y"];

/// Values at or above this are scaled down in human readable mode
const SCALE_THRESHOLD: u64 = 10000;

/// Formats a byte count, optionally scaled by powers of 1024.
///
/// Scaling truncates: 20480 is `20K` and 20479 is `19K`.
#[must_use]
pub fn format_counter(value: u64, human_readable: bool) -> String {
    if !human_readable {
        return value.to_string();
    }
    let mut value = value;
    let mut power = 0;
    while value >= SCALE_THRESHOLD {
        value >>= 10;
        power += 1;
    }
    format!("{value}{}", MAGNITUDES[power])
}

/// Formats seconds as `MM:SS`, or `HH:MM:SS` once an hour has passed.
#[must_use]
pub fn format_duration(secs: u64) -> String {
    let (minutes, seconds) = (secs / 60, secs % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// Draws a bar of `width` cells with the transferred fraction filled in.
#[must_use]
pub fn format_bar(width: usize, bytes: u64, total: u64) -> String {
    let filled = if total == 0 {
        0
    } else {
        let cells = width as u128 * u128::from(bytes) / u128::from(total);
        usize::try_from(cells).unwrap_or(usize::MAX).min(width)
    };
    let mut bar = String::with_capacity(width + 2);
    bar.push('|');
    bar.push_str(&"#".repeat(filled));
    bar.push_str(&"-".repeat(width - filled));
    bar.push('|');
    bar
}

/// Bookkeeping needed to erase the previous line in repaint mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderState {
    /// Length of the last repainted line, excluding padding and the carriage return
    pub previous_line_len: usize,
}

#[derive(Debug)]
pub struct StatusRenderer {
    display: DisplayConfig,
    state: RenderState,
}

impl StatusRenderer {
    pub fn new(display: DisplayConfig) -> Self {
        Self {
            display,
            state: RenderState::default(),
        }
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    /// Builds the bare status line with no terminator or padding.
    pub fn build_line(&self, snapshot: &Snapshot, metrics: &Metrics) -> String {
        let display = &self.display;
        let total = snapshot.expected_total.filter(|&total| total > 0);
        let mut line = String::new();
        if display.elapsed {
            line.push_str(&format_duration(metrics.elapsed_secs));
            line.push(' ');
        }
        if display.counters {
            line.push_str(&format_counter(
                snapshot.bytes_transferred,
                display.human_readable,
            ));
            if let Some(total) = total {
                line.push('/');
                line.push_str(&format_counter(total, display.human_readable));
            }
            line.push(' ');
        }
        if let (Some(_), Some(remaining)) = (total, metrics.remaining_secs) {
            if display.remaining {
                line.push_str(&format_duration(remaining));
                line.push(' ');
            }
            if let (true, Some(eta)) = (display.eta, metrics.eta) {
                let _ = write!(line, "ETA: {} ", eta.format("%H:%M:%S"));
            }
        }
        if let (Some(width), Some(total)) = (display.bar_width, total) {
            line.push_str(&format_bar(width, snapshot.bytes_transferred, total));
        }
        line
    }

    /// Produces the text to write for one redisplay and updates the repaint bookkeeping.
    #[instrument(level = "trace", skip(self))]
    pub fn render(&mut self, snapshot: &Snapshot, metrics: &Metrics) -> String {
        let mut line = self.build_line(snapshot, metrics);
        if self.display.append {
            line.push('\n');
            return line;
        }
        let len = line.len();
        let pad = self.state.previous_line_len.saturating_sub(len);
        line.push_str(&" ".repeat(pad));
        line.push('\r');
        trace!(
            "repaint: {len} chars, {pad} padding (previous {})",
            self.state.previous_line_len
        );
        self.state.previous_line_len = len;
        line
    }

    /// Text written once the stream has ended, after the final status line.
    ///
    /// Closes a repainted line with a newline so later output does not overwrite it, then adds
    /// the totals line when requested and at least one second has elapsed.
    pub fn finish(&self, snapshot: &Snapshot, metrics: &Metrics) -> String {
        let mut text = String::new();
        if !self.display.append {
            text.push('\n');
        }
        if let (true, Some(rate)) = (self.display.totals, metrics.rate) {
            let human = self.display.human_readable;
            let _ = writeln!(
                text,
                "{} {} {}/sec",
                format_counter(snapshot.bytes_transferred, human),
                format_duration(metrics.elapsed_secs),
                format_counter(rate, human),
            );
        }
        text
    }
}
