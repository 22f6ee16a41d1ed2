//! Errors returned while waiting on a recording.
//!
//! Recording itself never fails; a failed stream is stored as data. These
//! errors only come from the async helpers that wait for a condition.

use std::time::Duration;

/// Why a wait on a recording ended without its condition being met.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Timed out after {waited:?} waiting on recording")]
    Timeout { waited: Duration },

    #[error("Stream terminated before the condition was met")]
    Terminated,

    #[error("Recording was cancelled before the condition was met")]
    Cancelled,
}

/// Convenience alias for `Result<T, streamrec_proto::Error>`.
pub type Result<T> = std::result::Result<T, Error>;
