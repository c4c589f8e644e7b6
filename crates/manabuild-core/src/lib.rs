//! manabuild core - build orchestration for Go programs linked against manatee-open.
//!
//! The crate is organised leaves first:
//!
//! - [`version`] parses, orders and formats manatee-open version identifiers.
//! - [`env`] models process environments and derives the cgo flags.
//! - [`acquire`] finds or downloads the manatee-open source tree.
//! - [`resolver`] decides which manatee-open version the build targets.
//! - [`sequence`] runs titled steps with a spinner and fail-fast semantics.
//! - [`launcher`] wraps the output binary when the library needs `LD_LIBRARY_PATH`.
//! - [`builder`] composes all of the above into the build pipeline.

pub mod acquire;
pub mod builder;
pub mod env;
pub mod error;
pub mod io;
pub mod launcher;
pub mod paths;
pub mod process;
pub mod resolver;
pub mod sequence;
pub mod ui;
pub mod version;

pub use acquire::{AcquireError, SourceAcquirer};
pub use builder::{BuildDriver, BuildOptions, BuildReport};
pub use env::EnvironmentVars;
pub use error::BuildError;
pub use process::{CommandError, CommandRunner, CommandSpec, SystemRunner};
pub use resolver::{Resolution, ResolveError, VersionResolver};
pub use sequence::{OperationSequence, StepContext};
pub use ui::Console;
pub use version::{KnownVersions, ParseError, THRESHOLD_VERSION, Version};

/// User Agent string for mirror downloads
pub const USER_AGENT: &str = concat!("manabuild/", env!("CARGO_PKG_VERSION"));
