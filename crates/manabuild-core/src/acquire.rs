//! Locating and downloading the manatee-open source tree.
//!
//! Sources live in a version-keyed cache directory (see [`crate::paths`]).
//! A populated cache directory is trusted as-is: [`SourceAcquirer::locate`]
//! returns it without touching the network or re-validating its contents.
//! Otherwise the upstream archive is fetched from the first mirror that
//! answers, and unpacked next to it.

use std::path::{Path, PathBuf};

use reqwest::Client;
use thiserror::Error;

use crate::env::EnvironmentVars;
use crate::io::download::{self, MirrorsExhausted};
use crate::io::extract::{self, ExtractError};
use crate::paths;
use crate::process::{CommandError, CommandRunner, CommandSpec};
use crate::version::Version;

/// Upstream mirrors in priority order; `{version}` is the canonical version.
pub const DEFAULT_MIRRORS: &[&str] = &[
    "https://corpora.fi.muni.cz/noske/src/manatee-open/manatee-open-{version}.tar.gz",
    "https://corpora.fi.muni.cz/noske/src/manatee-open/archive/manatee-open-{version}.tar.gz",
    "http://corpora.fi.muni.cz/noske/current/src/manatee-open-{version}.tar.gz",
];

/// Internal static components built with `make` before linking, in order.
pub const STATIC_COMPONENTS: &[&str] = &["hat-trie", "fsa3"];

/// Failure to obtain a usable manatee-open source tree.
#[derive(Error, Debug)]
pub enum AcquireError {
    /// The cache directory could not be inspected or created
    #[error("failed to explore directory {}: {source}", .path.display())]
    Inspect {
        /// Cache path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Every mirror failed
    #[error(
        "failed to download manatee-open {version}: {source}\n\
         Please download and unpack it manually and run manabuild with --manatee-src"
    )]
    Download {
        /// Canonical version string
        version: String,
        /// Per-mirror failures
        #[source]
        source: MirrorsExhausted,
    },

    /// The archive could not be extracted
    #[error(
        "failed to unpack {}: {source}\n\
         Please download and unpack manatee-open manually and run manabuild with --manatee-src",
        .archive.display()
    )]
    Extract {
        /// Archive path, already removed from the cache
        archive: PathBuf,
        /// Extraction failure
        #[source]
        source: ExtractError,
    },

    /// The directory lacks the source tree markers
    #[error("{} does not look like a manatee-open source tree (expected {})", .path.display(), paths::SOURCE_MARKERS.join(", "))]
    NotASourceTree {
        /// Inspected directory
        path: PathBuf,
    },

    /// Building a static component failed
    #[error("failed to build {component}: {source}")]
    Component {
        /// Component directory name
        component: &'static str,
        /// Failed `make` invocation
        #[source]
        source: CommandError,
    },
}

/// Finds or fetches manatee-open sources.
#[derive(Debug, Clone)]
pub struct SourceAcquirer {
    client: Client,
    cache_root: PathBuf,
    mirrors: Vec<String>,
}

impl SourceAcquirer {
    /// Acquirer using the system temp directory and [`DEFAULT_MIRRORS`].
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache_root: paths::default_cache_root(),
            mirrors: DEFAULT_MIRRORS.iter().map(ToString::to_string).collect(),
        }
    }

    /// Use `root` instead of the system temp directory.
    #[must_use]
    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = root.into();
        self
    }

    /// Replace the mirror templates (`{version}` placeholder).
    #[must_use]
    pub fn with_mirrors<I, S>(mut self, templates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mirrors = templates.into_iter().map(Into::into).collect();
        self
    }

    /// Return the source tree for `version`, downloading and unpacking it
    /// when the cache does not have it yet.
    ///
    /// # Errors
    ///
    /// Returns [`AcquireError`] when the cache cannot be inspected, every
    /// mirror fails, or the archive cannot be unpacked. An archive that
    /// cannot be used is removed from the cache.
    pub async fn locate(&self, version: &Version) -> Result<PathBuf, AcquireError> {
        let out_dir = paths::source_dir(&self.cache_root, version);
        if is_dir(&out_dir).await? {
            tracing::info!(dir = %out_dir.display(), "found existing manatee-open sources");
            return Ok(out_dir);
        }

        tokio::fs::create_dir_all(&self.cache_root)
            .await
            .map_err(|source| AcquireError::Inspect {
                path: self.cache_root.clone(),
                source,
            })?;

        let archive = paths::archive_path(&self.cache_root, version);
        if archive.is_file() {
            tracing::info!(archive = %archive.display(), "reusing downloaded archive");
        } else {
            let urls = download::expand_mirrors(&self.mirrors, &version.canonical());
            download::download_from_mirrors(&self.client, &urls, &archive)
                .await
                .map_err(|source| AcquireError::Download {
                    version: version.canonical(),
                    source,
                })?;
        }

        self.unpack(&archive).await?;

        if !is_dir(&out_dir).await? {
            tracing::warn!(
                archive = %archive.display(),
                "removing archive without the expected top-level directory"
            );
            tokio::fs::remove_file(&archive).await.ok();
            return Err(AcquireError::NotASourceTree { path: out_dir });
        }
        Ok(out_dir)
    }

    /// Extract `archive` into the cache root.
    ///
    /// On failure the archive is deleted so a corrupt download is not
    /// picked up again by the next run.
    ///
    /// # Errors
    ///
    /// Returns [`AcquireError::Extract`] if extraction fails.
    pub async fn unpack(&self, archive: &Path) -> Result<(), AcquireError> {
        let archive_owned = archive.to_path_buf();
        let dest = self.cache_root.clone();
        let result = tokio::task::spawn_blocking(move || extract::extract_tar_gz(&archive_owned, &dest))
            .await
            .unwrap_or_else(|e| Err(ExtractError::Io(std::io::Error::other(e))));

        if let Err(source) = result {
            tracing::warn!(archive = %archive.display(), "removing archive due to an error");
            tokio::fs::remove_file(archive).await.ok();
            return Err(AcquireError::Extract {
                archive: archive.to_path_buf(),
                source,
            });
        }
        Ok(())
    }
}

async fn is_dir(path: &Path) -> Result<bool, AcquireError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_dir()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(AcquireError::Inspect {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Check that an operator-supplied directory is a manatee-open source tree.
///
/// # Errors
///
/// Returns [`AcquireError::NotASourceTree`] when a marker is missing.
pub fn verify_source_tree(dir: &Path) -> Result<(), AcquireError> {
    if paths::has_source_markers(dir) {
        Ok(())
    } else {
        Err(AcquireError::NotASourceTree {
            path: dir.to_path_buf(),
        })
    }
}

/// Build the internal static components the outer build links against.
///
/// Only versions with [`Version::has_static_components`] have them; for
/// older versions this does nothing. Components are built one after the
/// other and the first failure stops the sequence.
///
/// # Errors
///
/// Returns [`AcquireError::Component`] naming the component that failed.
pub fn build_static_components(
    runner: &dyn CommandRunner,
    version: &Version,
    src_dir: &Path,
    env: &EnvironmentVars,
) -> Result<(), AcquireError> {
    if !version.has_static_components() {
        return Ok(());
    }
    for &component in STATIC_COMPONENTS {
        tracing::debug!(component, "building static component");
        runner
            .run(
                &CommandSpec::new("make")
                    .current_dir(src_dir.join(component))
                    .env(env.clone()),
            )
            .map_err(|source| AcquireError::Component { component, source })?;
    }
    Ok(())
}
