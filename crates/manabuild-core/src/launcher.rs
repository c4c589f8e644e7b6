//! Output binaries and the library-path launcher script.
//!
//! When `libmanatee.so` lives outside the directories the dynamic linker
//! searches by default, the built binary is renamed to `<name>.bin` and a
//! small bash script named `<name>` takes its place, exporting
//! `LD_LIBRARY_PATH` before exec-ing the real binary.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::paths;

/// Mode of the generated launcher script.
pub const LAUNCHER_MODE: u32 = 0o775;

/// Launcher generation failed.
#[derive(Error, Debug)]
pub enum LauncherError {
    /// Moving the real binary aside failed
    #[error("failed to rename {} to {}: {source}", .from.display(), .to.display())]
    Rename {
        /// Built binary
        from: PathBuf,
        /// Destination next to the launcher
        to: PathBuf,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// The launcher script could not be written
    #[error("failed to write launcher {}: {source}", .path.display())]
    Write {
        /// Launcher path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },
}

/// What [`install`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Installed {
    /// The binary stays as built
    Binary {
        /// Path to the built binary
        binary: PathBuf,
    },
    /// The binary was renamed and a launcher written in its place
    Launcher {
        /// Path to the launcher script
        launcher: PathBuf,
        /// Path to the renamed binary
        binary: PathBuf,
    },
}

impl Installed {
    /// Operator hint on how to install the result.
    pub fn hint(&self) -> String {
        match self {
            Self::Binary { binary } => format!(
                "To install the application, copy file {} to a system searched path (e.g. /usr/local/bin)",
                file_name(binary)
            ),
            Self::Launcher { launcher, binary } => format!(
                "Generated run script to handle non-standard libmanatee.so location.\n\
                 To install the application, copy files {} and {} to a system searched path (e.g. /usr/local/bin)",
                file_name(binary),
                file_name(launcher)
            ),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

/// Remove outputs of a previous build. Missing files are fine and other
/// errors are only logged.
pub fn clear_previous_binaries(project_dir: &Path, name: &str) {
    for path in [
        paths::renamed_binary(project_dir, name),
        paths::target_binary(project_dir, name),
    ] {
        match fs::remove_file(&path) {
            Ok(()) => tracing::debug!(path = %path.display(), "removed previous output"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "could not remove previous output"),
        }
    }
}

/// Launcher script text for a binary named `name` and library dir `lib_dir`.
pub fn launcher_script(name: &str, lib_dir: &Path) -> String {
    format!(
        "#!/usr/bin/env bash\n\
         export LD_LIBRARY_PATH=\"{}\"\n\
         exec \"$(dirname \"$0\")/{name}.bin\" \"$@\"\n",
        lib_dir.display()
    )
}

/// Finish the output of a build: keep the binary as-is, or rename it and
/// write a launcher when `needs_launcher` is set.
///
/// # Errors
///
/// Returns [`LauncherError`] if the rename or the script write fails. The
/// script file handle is closed before any error is returned.
pub fn install(
    project_dir: &Path,
    name: &str,
    lib_dir: &Path,
    needs_launcher: bool,
) -> Result<Installed, LauncherError> {
    let target = paths::target_binary(project_dir, name);
    if !needs_launcher {
        return Ok(Installed::Binary { binary: target });
    }

    let renamed = paths::renamed_binary(project_dir, name);
    fs::rename(&target, &renamed).map_err(|source| LauncherError::Rename {
        from: target.clone(),
        to: renamed.clone(),
        source,
    })?;

    write_launcher(&target, &launcher_script(name, lib_dir)).map_err(|source| {
        fs::remove_file(&target).ok();
        LauncherError::Write {
            path: target.clone(),
            source,
        }
    })?;
    tracing::info!(launcher = %target.display(), lib_dir = %lib_dir.display(), "generated launcher");

    Ok(Installed::Launcher {
        launcher: target,
        binary: renamed,
    })
}

fn write_launcher(path: &Path, script: &str) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(LAUNCHER_MODE);
    let mut file = options.open(path)?;
    file.write_all(script.as_bytes())?;
    file.sync_all()
}
