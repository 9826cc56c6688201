use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures raised while driving the external detector or reading the run it
/// leaves behind.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("detector could not be started: {0}")]
    SpawnFailed(#[source] io::Error),

    #[error("detector exited with code {code}: {stderr}")]
    ProcessFailed { code: i32, stderr: String },

    #[error("detector timed out after {0} seconds")]
    TimedOut(u64),

    #[error("no run directory under {}", .root.display())]
    OutputMissing { root: PathBuf },

    #[error("malformed result file {}: {}", .file.display(), .detail)]
    MalformedOutput { file: PathBuf, detail: String },

    #[error("{} annotated image candidates in {}", .count, .run_dir.display())]
    AmbiguousImage { run_dir: PathBuf, count: usize },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl DetectError {
    /// Timeouts are transient and safe to retry with the same input. Every
    /// other variant needs the detector deployment looked at first.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DetectError::TimedOut(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_timeout_is_retryable() {
        assert!(DetectError::TimedOut(30).is_retryable());
        assert!(!DetectError::ProcessFailed {
            code: 1,
            stderr: String::new()
        }
        .is_retryable());
        assert!(!DetectError::OutputMissing {
            root: PathBuf::from("runs")
        }
        .is_retryable());
    }
}
