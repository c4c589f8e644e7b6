//! Umbrella error of a build run.

use std::path::PathBuf;

use thiserror::Error;

use crate::acquire::AcquireError;
use crate::launcher::LauncherError;
use crate::process::CommandError;
use crate::resolver::ResolveError;
use crate::version::ParseError;

/// Any failure that ends a build run.
#[derive(Error, Debug)]
pub enum BuildError {
    /// Malformed version
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Version or library resolution failed
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Sources could not be obtained
    #[error(transparent)]
    Acquire(#[from] AcquireError),

    /// An external command failed
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Installing the binary or its launcher failed
    #[error(transparent)]
    Launcher(#[from] LauncherError),

    /// Cleaning or configuring the sources failed
    #[error("failed to init manatee-open sources in {}: {source}", .dir.display())]
    Prepare {
        /// Source tree
        dir: PathBuf,
        /// Failed command
        #[source]
        source: CommandError,
    },

    /// Version or commit metadata could not be read from git
    #[error("failed to obtain {what} from git: {source}")]
    BuildInfo {
        /// Which piece of metadata
        what: &'static str,
        /// Failed git invocation
        #[source]
        source: CommandError,
    },

    /// Filesystem access failed
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        /// Accessed path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// A build was requested without a binary name
    #[error("no target binary name given (pass it as an argument or set targetBinaryName in .manabuild.json)")]
    MissingBinaryName,
}

impl BuildError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
