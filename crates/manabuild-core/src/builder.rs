//! The build pipeline.
//!
//! [`BuildDriver::run`] executes the fixed step order:
//!
//! 1. resolve the manatee-open version and library, then locate the sources
//! 2. clear outputs of a previous build
//! 3. configure manatee-open (and build its static components)
//! 4. derive the cgo flags, then generate, test and build the target
//! 5. wrap the binary in a launcher when the library is off the linker path
//!
//! Every external command goes through the driver's [`CommandRunner`] with
//! the captured process environment merged with the derived flags.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, SecondsFormat};

use crate::acquire::{self, SourceAcquirer};
use crate::env::{self, EnvironmentVars};
use crate::launcher::{self, Installed};
use crate::paths;
use crate::process::{CommandError, CommandRunner, CommandSpec};
use crate::resolver::{Resolution, VersionResolver};
use crate::sequence::{OperationSequence, StepContext};
use crate::version::Version;

pub use crate::error::BuildError;

/// Arguments for `./configure`.
pub const CONFIGURE_ARGS: &[&str] = &["--with-pcre", "--disable-python", "--disable-pthread"];

/// Tag used when the project repository has no tags yet.
pub const FALLBACK_TAG: &str = "v0.0.0";

/// What to build and where.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Go project root
    pub project_dir: PathBuf,
    /// Output binary name; optional only in prepare-only mode
    pub binary_name: Option<String>,
    /// Explicitly requested manatee-open version
    pub requested: Option<Version>,
    /// Operator-supplied source tree (skips acquisition)
    pub manatee_src: Option<PathBuf>,
    /// Operator-supplied directory holding `libmanatee.so`
    pub manatee_lib: Option<PathBuf>,
    /// Run `go test ./...` before building
    pub run_tests: bool,
    /// Build `./cmd/<dir>` instead of the project root package
    pub cmd_dir: Option<String>,
    /// Stop after preparing the sources and report the cgo flags
    pub prepare_only: bool,
}

impl BuildOptions {
    /// Options for building the project in `project_dir`.
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            binary_name: None,
            requested: None,
            manatee_src: None,
            manatee_lib: None,
            run_tests: false,
            cmd_dir: None,
            prepare_only: false,
        }
    }
}

/// Version information baked into the target binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildMetadata {
    /// `git describe --tags`
    pub version: String,
    /// Abbreviated commit hash
    pub commit: String,
    /// RFC 3339 build time
    pub date: String,
}

impl BuildMetadata {
    /// Go linker flags substituting `main.version`, `main.buildDate` and
    /// `main.gitCommit`, with debug info stripped.
    pub fn ldflags(&self) -> String {
        format!(
            "-w -s -X main.version='{}' -X main.buildDate='{}' -X main.gitCommit='{}'",
            self.version, self.date, self.commit
        )
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Resolved version and library location
    pub resolution: Resolution,
    /// Source tree that was configured
    pub source_dir: PathBuf,
    /// Derived cgo flags
    pub flags: EnvironmentVars,
    /// Produced output, `None` in prepare-only mode
    pub installed: Option<Installed>,
}

/// Composes resolution, acquisition and the external build tools.
pub struct BuildDriver {
    resolver: VersionResolver,
    acquirer: SourceAcquirer,
    runner: Arc<dyn CommandRunner>,
    base_env: EnvironmentVars,
}

impl std::fmt::Debug for BuildDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildDriver")
            .field("resolver", &self.resolver)
            .field("acquirer", &self.acquirer)
            .field("base_env_len", &self.base_env.len())
            .finish_non_exhaustive()
    }
}

impl BuildDriver {
    /// Driver spawning commands through `runner` with the current process
    /// environment as the base.
    pub fn new(
        resolver: VersionResolver,
        acquirer: SourceAcquirer,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            resolver,
            acquirer,
            runner,
            base_env: EnvironmentVars::capture(),
        }
    }

    /// Replace the captured base environment.
    #[must_use]
    pub fn with_base_env(mut self, env: EnvironmentVars) -> Self {
        self.base_env = env;
        self
    }

    /// Run the whole pipeline as steps of `seq`.
    ///
    /// # Errors
    ///
    /// Returns the first [`BuildError`]; the failing step has then already
    /// been marked on the console and no later step ran.
    pub async fn run(
        &self,
        seq: &OperationSequence,
        opts: &BuildOptions,
    ) -> Result<BuildReport, BuildError> {
        let binary_name = match (&opts.binary_name, opts.prepare_only) {
            (Some(name), _) => Some(name.as_str()),
            (None, true) => None,
            (None, false) => return Err(BuildError::MissingBinaryName),
        };

        let (resolution, source_dir) = seq
            .run("searching for manatee-open", |ctx| async move {
                self.locate(&ctx, opts).await
            })
            .await?;

        if let Some(name) = binary_name {
            launcher::clear_previous_binaries(&opts.project_dir, name);
        }

        let version = &resolution.version;
        let src = source_dir.as_path();
        seq.run("preparing manatee-open sources", |ctx| async move {
            self.prepare_sources(&ctx, version, src)
        })
        .await?;

        let flags = env::derive_build_flags(version, src, &resolution.lib_dir);
        let flags_ref = &flags;

        let installed = match binary_name {
            Some(name) if !opts.prepare_only => {
                seq.run("building target project", |ctx| async move {
                    self.build_target(&ctx, opts, name, flags_ref)
                })
                .await?;

                let lib_dir = resolution.lib_dir.as_path();
                let needs_launcher = resolution.needs_launcher;
                let installed = seq
                    .run("generating executable", |ctx| async move {
                        let installed =
                            launcher::install(&opts.project_dir, name, lib_dir, needs_launcher)?;
                        ctx.println(installed.hint());
                        Ok::<_, BuildError>(installed)
                    })
                    .await?;
                Some(installed)
            }
            _ => {
                seq.run("exporting CGO variables", |ctx| async move {
                    print_flags(&ctx, flags_ref);
                    Ok::<_, BuildError>(())
                })
                .await?;
                None
            }
        };

        seq.finish();
        Ok(BuildReport {
            resolution,
            source_dir,
            flags,
            installed,
        })
    }

    async fn locate(
        &self,
        ctx: &StepContext,
        opts: &BuildOptions,
    ) -> Result<(Resolution, PathBuf), BuildError> {
        // Commands run in other directories than ours, so overrides given
        // relative to the working directory are anchored here.
        let lib_override = opts.manatee_lib.as_deref().map(absolute).transpose()?;
        let resolution = self
            .resolver
            .resolve(opts.requested.as_ref(), lib_override.as_deref())?;
        let version = resolution.version.canonical();

        if opts.requested.is_none() {
            ctx.warn(format!(
                "No explicit manatee-open version specified. Found {version}"
            ));
        }
        if resolution.explicit_lib {
            ctx.println(format!(
                "Assuming that provided {}/{} matches required version {version}",
                resolution.lib_dir.display(),
                paths::LIBRARY_NAME
            ));
        } else {
            ctx.println(format!(
                "Using system-installed {version} from {}",
                resolution.lib_dir.display()
            ));
        }

        let source_dir = match &opts.manatee_src {
            Some(dir) => {
                let dir = absolute(dir)?;
                acquire::verify_source_tree(&dir)?;
                ctx.println(format!(
                    "Assuming that provided manatee-open src path matches required version {version}"
                ));
                dir
            }
            None => self.acquirer.locate(&resolution.version).await?,
        };
        tracing::info!(
            version = %version,
            src = %source_dir.display(),
            lib = %resolution.lib_dir.display(),
            needs_launcher = resolution.needs_launcher,
            "resolved manatee-open"
        );
        Ok((resolution, source_dir))
    }

    fn prepare_sources(
        &self,
        ctx: &StepContext,
        version: &Version,
        src: &Path,
    ) -> Result<(), BuildError> {
        let header = src.join(paths::CONFIGURED_HEADER);
        let configured = header.try_exists().map_err(BuildError::io(&header))?;

        let stamp = src.join(paths::CONFIGURE_STAMP);
        match read_stamp(&stamp)? {
            Some(previous) if previous != version.canonical() => {
                tracing::warn!(%previous, requested = %version, "stale configure stamp");
                ctx.warn(format!(
                    "sources were configured for manatee-open {previous}, reconfiguring for {}",
                    version.canonical()
                ));
            }
            _ => {}
        }

        let prepare_err = |source| BuildError::Prepare {
            dir: src.to_path_buf(),
            source,
        };
        if configured {
            tracing::debug!(src = %src.display(), "cleaning previously configured sources");
            self.runner
                .run(
                    &CommandSpec::new("make")
                        .arg("clean")
                        .current_dir(src)
                        .env(self.base_env.clone()),
                )
                .map_err(prepare_err)?;
        }

        self.runner
            .run(
                &CommandSpec::new("./configure")
                    .args(CONFIGURE_ARGS.iter().copied())
                    .current_dir(src)
                    .env(self.base_env.clone()),
            )
            .map_err(prepare_err)?;
        std::fs::write(&stamp, format!("{}\n", version.canonical()))
            .map_err(BuildError::io(&stamp))?;

        acquire::build_static_components(self.runner.as_ref(), version, src, &self.base_env)?;
        Ok(())
    }

    fn build_target(
        &self,
        ctx: &StepContext,
        opts: &BuildOptions,
        name: &str,
        flags: &EnvironmentVars,
    ) -> Result<(), BuildError> {
        print_flags(ctx, flags);

        let metadata = self.collect_metadata(&opts.project_dir)?;
        let env = self.base_env.merge(flags);
        let go = |args: &[&str]| {
            CommandSpec::new("go")
                .args(args.iter().copied())
                .current_dir(&opts.project_dir)
                .env(env.clone())
        };

        ctx.println("Running GENERATE");
        self.runner.run(&go(&["generate"]))?;

        if opts.run_tests {
            ctx.println("Running TESTS");
            ctx.with_paused_output(|_| {
                self.runner
                    .run(&go(&["test", "./..."]).inherit_output())
            })?;
        }

        ctx.println("Running BUILD");
        let ldflags = metadata.ldflags();
        let mut build = go(&["build", "-o", name, "-ldflags", &ldflags]);
        if let Some(dir) = &opts.cmd_dir {
            build = build.arg(format!("./cmd/{dir}"));
        }
        self.runner.run(&build)?;
        Ok(())
    }

    /// Tag, commit and build time of the target project.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::BuildInfo`] when git fails for a reason other
    /// than a repository without tags.
    pub fn collect_metadata(&self, project_dir: &Path) -> Result<BuildMetadata, BuildError> {
        let git = |args: &[&str]| {
            CommandSpec::new("git")
                .args(args.iter().copied())
                .current_dir(project_dir)
                .env(self.base_env.clone())
        };

        let version = match self.runner.run(&git(&["describe", "--tags"])) {
            Ok(out) => out.stdout.trim().to_string(),
            Err(e) if e.output().is_some_and(|o| o.contains("No names found")) => {
                FALLBACK_TAG.to_string()
            }
            Err(source) => {
                return Err(BuildError::BuildInfo {
                    what: "version info",
                    source,
                });
            }
        };
        let commit = self
            .runner
            .run(&git(&["rev-parse", "--short", "HEAD"]))
            .map_err(|source: CommandError| BuildError::BuildInfo {
                what: "commit info",
                source,
            })?
            .stdout
            .trim()
            .to_string();

        Ok(BuildMetadata {
            version,
            commit,
            date: Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
        })
    }
}

fn print_flags(ctx: &StepContext, flags: &EnvironmentVars) {
    ctx.println("applied env. variables:");
    for (key, value) in flags {
        ctx.detail(format!("\t{key}={value}"));
    }
}

fn read_stamp(path: &Path) -> Result<Option<String>, BuildError> {
    match std::fs::read_to_string(path) {
        Ok(s) => Ok(Some(s.trim().to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(BuildError::io(path)(e)),
    }
}

fn absolute(path: &Path) -> Result<PathBuf, BuildError> {
    std::path::absolute(path).map_err(BuildError::io(path))
}
