//! manabuild - build Go programs that link against manatee-open
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! The binary resolves a compatible manatee-open, prepares its sources and
//! drives `go generate` / `go test` / `go build` with the right cgo flags.
//! All decision logic lives in `manabuild-core`; this crate holds the
//! argument surface, the project config file and the banner.

pub mod banner;
pub mod config;

use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

/// manabuild's own version, from git at build time
pub const BUILD_VERSION: &str = env!("MANABUILD_VERSION");
/// Commit manabuild was built from
pub const BUILD_COMMIT: &str = env!("MANABUILD_COMMIT");
/// Commit date of the checkout manabuild was built from
pub const BUILD_DATE: &str = env!("MANABUILD_BUILD_DATE");

/// Positional that prints manabuild's build information instead of building.
pub const VERSION_COMMAND: &str = "version";

#[derive(Debug, Parser)]
#[command(name = "manabuild")]
#[command(version = BUILD_VERSION, about = "Manabuild - a tool for building Go programs with manatee-open dependency")]
#[command(override_usage = "manabuild [OPTIONS] [BINARY] (when .manabuild.json exists or --no-build is set)\n       \
                            manabuild [OPTIONS] <BINARY> [VERSION]\n       \
                            manabuild version")]
pub struct Cli {
    /// Name of the binary to build (or `version`)
    pub binary: Option<String>,

    /// manatee-open version to build against (autodetected when omitted)
    #[arg(value_name = "VERSION")]
    pub manatee_version: Option<String>,

    /// A path where the target project is located
    #[arg(long, default_value = ".")]
    pub project_path: PathBuf,

    /// Run unit tests before building
    #[arg(long)]
    pub test: bool,

    /// A subdirectory of `cmd` to be used for the build
    #[arg(long, value_name = "DIR")]
    pub cmd_dir: Option<String>,

    /// Just check and prepare manatee-open sources and print the CGO variables
    #[arg(long)]
    pub no_build: bool,

    /// Location of manatee-open source files
    #[arg(long, value_name = "DIR")]
    pub manatee_src: Option<PathBuf>,

    /// Location of libmanatee.so
    #[arg(long, value_name = "DIR")]
    pub manatee_lib: Option<PathBuf>,
}

impl Cli {
    /// Whether the `version` pseudo-command was given
    pub fn wants_version(&self) -> bool {
        self.binary.as_deref() == Some(VERSION_COMMAND)
    }
}

/// The arguments do not describe a build; usage is shown instead.
#[derive(Error, Debug)]
#[error("missing binary name")]
pub struct UsageError;

/// Text printed by `manabuild version`.
pub fn version_text() -> String {
    format!("Manabuild {BUILD_VERSION}\nbuild date: {BUILD_DATE}\nlast commit: {BUILD_COMMIT}")
}
