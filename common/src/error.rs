//! Fatal conditions and the process exit codes they map to
//!
//! Every fault `flow` detects is fatal. Each class of failure has its own exit code so a calling
//! script can tell a broken pipe apart from a bad command line:
//!
//! | code | condition |
//! |------|-----------|
//! | 1 | waiting for input readiness failed |
//! | 2 | reading the input failed |
//! | 3 | writing the output failed |
//! | 4 | malformed length value |
//! | 5 | reference file cannot be stat'ed |
//! | 6 | filesystem cannot be stat'ed |
//! | 7 | unknown or malformed option |
//! | 8 | malformed bar graph width |
//! | 9 | invalid engine setting (chunk size, interval) |
//! | 10 | standard descriptors could not be prepared |
//! | 20 | external size probe could not be started |
//! | 21 | external size probe failed |

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("poll() error: {0}")]
    Wait(#[source] std::io::Error),

    #[error("read() error: {0}")]
    Read(#[source] std::io::Error),

    #[error("write() error: {0}")]
    Write(#[source] std::io::Error),

    #[error("bad option value: {0:?}")]
    BadLength(String),

    #[error("can't stat {path:?}: {source}")]
    FileStat {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("can't stat filesystem {path:?}: {source}")]
    FilesystemStat {
        path: std::path::PathBuf,
        #[source]
        source: nix::Error,
    },

    #[error("{0}")]
    Usage(String),

    #[error("bargraph width must be a number: {0:?}")]
    BadBarWidth(String),

    #[error("invalid setting: {0}")]
    Config(String),

    #[error("failed to prepare standard streams: {0}")]
    Setup(#[source] std::io::Error),

    #[error("can't run {program:?}: {source}")]
    ProbeSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program:?} failed: {reason}")]
    ProbeFailed { program: String, reason: String },
}

impl FlowError {
    /// Process exit code for this failure
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            FlowError::Wait(_) => 1,
            FlowError::Read(_) => 2,
            FlowError::Write(_) => 3,
            FlowError::BadLength(_) => 4,
            FlowError::FileStat { .. } => 5,
            FlowError::FilesystemStat { .. } => 6,
            FlowError::Usage(_) => 7,
            FlowError::BadBarWidth(_) => 8,
            FlowError::Config(_) => 9,
            FlowError::Setup(_) => 10,
            FlowError::ProbeSpawn { .. } => 20,
            FlowError::ProbeFailed { .. } => 21,
        }
    }
}
