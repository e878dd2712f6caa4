//! Discovery of the expected stream length
//!
//! The copy engine only ever sees a single `Option<u64>`. How that number is obtained is decided
//! once, before any data moves, by picking one [`SizeSource`].

use std::io::{Seek, SeekFrom};
use tracing::{debug, instrument, warn};

use crate::error::FlowError;

/// Program used by [`SizeSource::ExternalProbe`], its output is in 1024-byte blocks
pub const DISK_USAGE_PROGRAM: &str = "du";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SizeSource {
    /// Length given directly
    Explicit(u64),
    /// Length of a reference file
    FileStat(std::path::PathBuf),
    /// Space in use on the filesystem mounted at the given path
    FilesystemUsage(std::path::PathBuf),
    /// Recursive disk usage of a path as reported by `du -s`
    ExternalProbe(std::path::PathBuf),
    /// Length of the input itself, when it can seek
    #[default]
    SeekProbe,
}

/// Resolves the expected total for `source`, `None` meaning unknown.
///
/// A length of zero is reported as unknown: nothing downstream can make use of it.
#[instrument(skip(input))]
pub fn resolve_expected_size<S: Seek>(
    source: &SizeSource,
    input: &mut S,
) -> Result<Option<u64>, FlowError> {
    let size = match source {
        SizeSource::Explicit(size) => Some(*size),
        SizeSource::FileStat(path) => Some(file_size(path)?),
        SizeSource::FilesystemUsage(path) => Some(filesystem_usage(path)?),
        SizeSource::ExternalProbe(path) => Some(disk_usage(DISK_USAGE_PROGRAM, path)?),
        SizeSource::SeekProbe => seek_length(input)?,
    };
    let size = size.filter(|&size| size > 0);
    debug!("expected size: {:?}", size);
    Ok(size)
}

pub fn file_size(path: &std::path::Path) -> Result<u64, FlowError> {
    std::fs::metadata(path)
        .map(|metadata| metadata.len())
        .map_err(|source| FlowError::FileStat {
            path: path.to_owned(),
            source,
        })
}

/// Bytes in use on the filesystem containing `path`.
pub fn filesystem_usage(path: &std::path::Path) -> Result<u64, FlowError> {
    let stat =
        nix::sys::statvfs::statvfs(path).map_err(|source| FlowError::FilesystemStat {
            path: path.to_owned(),
            source,
        })?;
    let used_blocks = u128::from(stat.blocks().saturating_sub(stat.blocks_free()));
    let used = used_blocks * u128::from(stat.fragment_size());
    Ok(u64::try_from(used).unwrap_or(u64::MAX))
}

/// Runs `<program> -s <path>` and scales the leading block count to bytes.
pub fn disk_usage(program: &str, path: &std::path::Path) -> Result<u64, FlowError> {
    let output = std::process::Command::new(program)
        .arg("-s")
        .arg(path)
        .output()
        .map_err(|source| FlowError::ProbeSpawn {
            program: program.to_string(),
            source,
        })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FlowError::ProbeFailed {
            program: program.to_string(),
            reason: format!("{} ({})", output.status, stderr.trim()),
        });
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let blocks = stdout
        .split_whitespace()
        .next()
        .and_then(|field| field.parse::<u64>().ok())
        .ok_or_else(|| FlowError::ProbeFailed {
            program: program.to_string(),
            reason: format!("unexpected output {:?}", stdout.trim()),
        })?;
    debug!("{} reports {} blocks for {:?}", program, blocks, path);
    Ok(blocks.saturating_mul(1024))
}

/// Bytes between the current position of `input` and its end, if it can seek.
///
/// The position is restored afterwards so no data is skipped.
pub fn seek_length<S: Seek>(input: &mut S) -> Result<Option<u64>, FlowError> {
    let position = match input.stream_position() {
        Ok(position) => position,
        Err(error) => {
            debug!("input is not seekable: {}", error);
            return Ok(None);
        }
    };
    let end = match input.seek(SeekFrom::End(0)) {
        Ok(end) => end,
        Err(error) => {
            warn!("failed to seek to the end of input: {}", error);
            return Ok(None);
        }
    };
    input
        .seek(SeekFrom::Start(position))
        .map_err(FlowError::Setup)?;
    Ok(Some(end.saturating_sub(position)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::io::{Read, Write};

    /// Input that refuses to seek, like a pipe
    struct Unseekable;

    impl Seek for Unseekable {
        fn seek(&mut self, _: SeekFrom) -> std::io::Result<u64> {
            Err(std::io::Error::from_raw_os_error(nix::libc::ESPIPE))
        }
    }

    #[test]
    fn explicit_size() -> Result<()> {
        let size = resolve_expected_size(&SizeSource::Explicit(1234), &mut Unseekable)?;
        assert_eq!(size, Some(1234));
        Ok(())
    }

    #[test]
    fn explicit_zero_means_unknown() -> Result<()> {
        let size = resolve_expected_size(&SizeSource::Explicit(0), &mut Unseekable)?;
        assert_eq!(size, None);
        Ok(())
    }

    #[test]
    fn file_stat() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("reference");
        std::fs::write(&path, vec![7u8; 4321])?;
        let size = resolve_expected_size(&SizeSource::FileStat(path), &mut Unseekable)?;
        assert_eq!(size, Some(4321));
        Ok(())
    }

    #[test]
    fn file_stat_missing() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source = SizeSource::FileStat(dir.path().join("missing"));
        let error = resolve_expected_size(&source, &mut Unseekable).unwrap_err();
        assert_eq!(error.exit_code(), 5);
        Ok(())
    }

    #[test]
    fn filesystem_usage_of_tempdir() -> Result<()> {
        let dir = tempfile::tempdir()?;
        // any mounted filesystem will do, the value itself depends on the host
        filesystem_usage(dir.path())?;
        Ok(())
    }

    #[test]
    fn filesystem_usage_missing() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let source = SizeSource::FilesystemUsage(dir.path().join("missing"));
        let error = resolve_expected_size(&source, &mut Unseekable).unwrap_err();
        assert_eq!(error.exit_code(), 6);
        Ok(())
    }

    #[test]
    fn disk_usage_is_in_kilobytes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("data"), vec![1u8; 64 * 1024])?;
        let size = disk_usage(DISK_USAGE_PROGRAM, dir.path())?;
        assert_eq!(size % 1024, 0);
        Ok(())
    }

    #[test]
    fn disk_usage_of_missing_path_fails() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let error = disk_usage(DISK_USAGE_PROGRAM, &dir.path().join("missing")).unwrap_err();
        assert_eq!(error.exit_code(), 21);
        Ok(())
    }

    #[test]
    fn disk_usage_program_not_found() {
        let error = disk_usage("flow-no-such-program", std::path::Path::new(".")).unwrap_err();
        assert_eq!(error.exit_code(), 20);
    }

    #[test]
    fn seek_probe_on_file_keeps_position() -> Result<()> {
        let mut file = tempfile::tempfile()?;
        file.write_all(b"0123456789")?;
        file.seek(SeekFrom::Start(4))?;
        let size = resolve_expected_size(&SizeSource::SeekProbe, &mut file)?;
        assert_eq!(size, Some(6));
        let mut rest = String::new();
        file.read_to_string(&mut rest)?;
        assert_eq!(rest, "456789");
        Ok(())
    }

    #[test]
    fn seek_probe_on_pipe_is_unknown() -> Result<()> {
        let size = resolve_expected_size(&SizeSource::SeekProbe, &mut Unseekable)?;
        assert_eq!(size, None);
        Ok(())
    }

    #[test]
    fn seek_probe_on_empty_input_is_unknown() -> Result<()> {
        let mut input = std::io::Cursor::new(Vec::<u8>::new());
        let size = resolve_expected_size(&SizeSource::SeekProbe, &mut input)?;
        assert_eq!(size, None);
        Ok(())
    }
}
