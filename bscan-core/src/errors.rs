//! Error taxonomy for `bscan`.
//!
//! A hand-rolled `Display` + `std::error::Error` enum rather than reaching
//! for a dependency such as `thiserror`.

use std::fmt;

/// The four fatal/non-fatal error categories described by the orchestration
/// engine's error handling design.
///
/// - [`BscanError::Config`] and [`BscanError::Internal`] are fatal: the
///   process should exit with status `1`.
/// - [`BscanError::SkipTarget`] drops a single target but lets siblings run.
/// - [`BscanError::Subprocess`] covers failure to spawn a child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BscanError {
    /// Bad flags, missing config files, unknown scan method, or a request
    /// for an unimplemented feature (e.g. `--ping-sweep`).
    Config(String),
    /// A per-target precondition failed; the target is dropped but other
    /// targets continue.
    SkipTarget { target: String, reason: String },
    /// An invariant was violated (e.g. admitting an already-active target).
    Internal(String),
    /// Spawning a subprocess failed outright.
    Subprocess(String),
}

impl fmt::Display for BscanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::SkipTarget { target, reason } => {
                write!(f, "skipping target `{target}`: {reason}")
            }
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
            Self::Subprocess(msg) => write!(f, "subprocess error: {msg}"),
        }
    }
}

impl std::error::Error for BscanError {}

impl BscanError {
    /// Whether this error should abort the whole process (as opposed to
    /// merely dropping one target).
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::SkipTarget { .. })
    }
}
