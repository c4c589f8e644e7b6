//! Deciding which manatee-open version a build targets.
//!
//! 1. With a library directory override, the version is read from the marker
//!    embedded in that `libmanatee.so`.
//! 2. Otherwise the standard system library directories are checked in order,
//!    and failing that the newest allow-listed versioned install is picked.
//! 3. An explicitly requested version must be allow-listed and, unless the
//!    library location was given explicitly, equal to the detected one.
//!    A difference is a hard stop, never an automatic up/downgrade.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::bytes::Regex;
use thiserror::Error;

use crate::paths;
use crate::version::{KnownVersions, ParseError, Version};

/// Marker embedded in `libmanatee.so`: the literal `open-` followed by the
/// version text (digits, dots, and an optional `-suffix`).
static VERSION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"open-([0-9]+(?:\.[0-9]+)+(?:-[A-Za-z0-9]+)?)")
        .expect("version marker pattern is valid")
});

/// Failure to settle on a manatee-open version or library.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The override directory has no `libmanatee.so`
    #[error("{} not found", .path.display())]
    LibraryMissing {
        /// Expected library path
        path: PathBuf,
    },

    /// The library could not be read
    #[error("failed to read {}: {source}", .path.display())]
    Inspect {
        /// Library path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The library carries no embedded version marker
    #[error("no version marker (`open-<version>`) found in {}", .path.display())]
    NoMarker {
        /// Library path
        path: PathBuf,
    },

    /// The embedded marker does not parse as a version
    #[error("invalid version marker in {}: {source}", .path.display())]
    BadMarker {
        /// Library path
        path: PathBuf,
        /// Parse failure of the marker
        #[source]
        source: ParseError,
    },

    /// The versioned installs directory could not be listed
    #[error("failed to list manatee-open versions in {}: {source}", .path.display())]
    ScanInstalls {
        /// Installs directory
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Neither a standard directory nor a versioned install qualified
    #[error(
        "autodetection has not found any suitable manatee-open version, please select one manually"
    )]
    NoSuitableVersion,

    /// The version is not allow-listed
    #[error("unsupported version: {version}. Please use one of: {known}")]
    Unsupported {
        /// Rejected version
        version: Version,
        /// The allow-list
        known: KnownVersions,
    },

    /// The detected library differs from the requested version
    #[error(
        "found manatee-open {}, you require {}.\n\n\
         A) If you prefer a different installed version of manatee-open then please specify\n   \
            a path where the respective libmanatee.so can be found\n   \
            (manabuild <binary> {} --manatee-lib /path/to/libmanatee.so/dir)\n\n\
         B) If you want to use the detected installed version then run manabuild\n   \
            with the proper version (manabuild <binary> {})",
        .found.canonical(), .requested.canonical(), .requested.canonical(), .found.canonical()
    )]
    Mismatch {
        /// Version of the detected library
        found: Version,
        /// Version asked for
        requested: Version,
    },

    /// No library of the requested version is installed
    #[error(
        "manatee-open {version} not found in system searched paths. \
         Please run manabuild with the --manatee-lib argument"
    )]
    LibraryNotFound {
        /// Requested version
        version: Version,
    },
}

/// Outcome of version resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Version the build targets
    pub version: Version,
    /// Version found by autodetection
    pub detected: Version,
    /// Directory holding `libmanatee.so`
    pub lib_dir: PathBuf,
    /// Whether `lib_dir` was given by the operator
    pub explicit_lib: bool,
    /// Whether a launcher script must set the library search path
    pub needs_launcher: bool,
}

/// Detects installed manatee-open versions and reconciles them with a request.
#[derive(Debug, Clone)]
pub struct VersionResolver {
    known: KnownVersions,
    standard_lib_dirs: Vec<PathBuf>,
    installs_dir: PathBuf,
}

impl VersionResolver {
    /// Resolver over the real system locations.
    pub fn new(known: KnownVersions) -> Self {
        Self {
            known,
            standard_lib_dirs: paths::STANDARD_LIB_DIRS.iter().map(PathBuf::from).collect(),
            installs_dir: PathBuf::from(paths::VERSIONED_INSTALLS_DIR),
        }
    }

    /// Search `dirs` instead of [`paths::STANDARD_LIB_DIRS`].
    #[must_use]
    pub fn with_standard_lib_dirs<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.standard_lib_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    /// Scan `dir` instead of [`paths::VERSIONED_INSTALLS_DIR`].
    #[must_use]
    pub fn with_installs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.installs_dir = dir.into();
        self
    }

    /// Check allow-list membership.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Unsupported`] for versions outside the list.
    pub fn ensure_known(&self, version: &Version) -> Result<(), ResolveError> {
        if self.known.contains(version) {
            Ok(())
        } else {
            Err(ResolveError::Unsupported {
                version: version.clone(),
                known: self.known.clone(),
            })
        }
    }

    /// Detect the manatee-open version available to the build.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when the overriding library is missing or
    /// carries no readable marker, or when nothing suitable is installed.
    pub fn detect(&self, lib_override: Option<&Path>) -> Result<Version, ResolveError> {
        if let Some(dir) = lib_override {
            let lib = dir.join(paths::LIBRARY_NAME);
            if !lib.is_file() {
                return Err(ResolveError::LibraryMissing { path: lib });
            }
            return read_embedded_version(&lib);
        }

        if let Some(dir) = self.standard_lib_dir() {
            tracing::debug!(dir = %dir.display(), "found system manatee-open");
            return read_embedded_version(&dir.join(paths::LIBRARY_NAME));
        }

        self.latest_installed()?
            .ok_or(ResolveError::NoSuitableVersion)
    }

    /// Newest allow-listed version among the version-named install dirs.
    /// `None` when there is no such install (or no installs dir at all).
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::ScanInstalls`] if the directory exists but
    /// cannot be listed.
    pub fn latest_installed(&self) -> Result<Option<Version>, ResolveError> {
        let scan_err = |source| ResolveError::ScanInstalls {
            path: self.installs_dir.clone(),
            source,
        };
        let entries = match std::fs::read_dir(&self.installs_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(dir = %self.installs_dir.display(), "no versioned installs");
                return Ok(None);
            }
            Err(e) => return Err(scan_err(e)),
        };

        let mut found = Vec::new();
        for entry in entries {
            let entry = entry.map_err(scan_err)?;
            if !entry.path().is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(ToString::to_string) else {
                continue;
            };
            match Version::parse(&name) {
                Ok(v) if self.known.contains(&v) => found.push(v),
                Ok(v) => tracing::debug!(version = %v, "ignoring install outside the allow-list"),
                Err(_) => tracing::debug!(%name, "ignoring non-version directory"),
            }
        }
        Ok(found.into_iter().max())
    }

    /// Library directory for `version`: the first standard dir holding
    /// `libmanatee.so`, else the versioned install of exactly that version.
    pub fn find_library(&self, version: &Version) -> Option<PathBuf> {
        self.standard_lib_dir().or_else(|| {
            let dir = paths::versioned_lib_dir(&self.installs_dir, version);
            dir.join(paths::LIBRARY_NAME).is_file().then_some(dir)
        })
    }

    /// Settle the target version and library location.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when detection fails, the target is not
    /// allow-listed, the request disagrees with the detected system version,
    /// or no library directory can be found.
    pub fn resolve(
        &self,
        requested: Option<&Version>,
        lib_override: Option<&Path>,
    ) -> Result<Resolution, ResolveError> {
        if let Some(req) = requested {
            self.ensure_known(req)?;
        }

        let detected = self.detect(lib_override)?;
        let version = match requested {
            Some(req) => req.clone(),
            None => {
                tracing::info!(version = %detected, "no explicit manatee-open version specified");
                detected.clone()
            }
        };
        self.ensure_known(&version)?;

        let (lib_dir, explicit_lib) = match lib_override {
            Some(dir) => {
                if version != detected {
                    tracing::warn!(
                        requested = %version,
                        marker = %detected,
                        "library marker differs from the requested version"
                    );
                }
                (dir.to_path_buf(), true)
            }
            None => {
                if version != detected {
                    return Err(ResolveError::Mismatch {
                        found: detected,
                        requested: version,
                    });
                }
                let dir = self
                    .find_library(&version)
                    .ok_or_else(|| ResolveError::LibraryNotFound {
                        version: version.clone(),
                    })?;
                (dir, false)
            }
        };

        Ok(Resolution {
            needs_launcher: !paths::is_standard_lib_dir(&lib_dir),
            version,
            detected,
            lib_dir,
            explicit_lib,
        })
    }

    fn standard_lib_dir(&self) -> Option<PathBuf> {
        self.standard_lib_dirs
            .iter()
            .find(|d| d.join(paths::LIBRARY_NAME).is_file())
            .cloned()
    }
}

/// Find the version text of the first `open-<version>` marker in `bytes`.
pub fn find_version_marker(bytes: &[u8]) -> Option<&str> {
    VERSION_MARKER
        .captures(bytes)
        .and_then(|c| c.get(1))
        .and_then(|m| std::str::from_utf8(m.as_bytes()).ok())
}

/// Read the version embedded in a `libmanatee.so` binary.
///
/// # Errors
///
/// Returns [`ResolveError`] if the file cannot be read or carries no
/// parseable marker. A binary without a marker is never assumed compatible.
pub fn read_embedded_version(lib: &Path) -> Result<Version, ResolveError> {
    let bytes = std::fs::read(lib).map_err(|source| ResolveError::Inspect {
        path: lib.to_path_buf(),
        source,
    })?;
    let marker = find_version_marker(&bytes).ok_or_else(|| ResolveError::NoMarker {
        path: lib.to_path_buf(),
    })?;
    Version::parse(marker).map_err(|source| ResolveError::BadMarker {
        path: lib.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{TempDir, tempdir};

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn fake_library(dir: &Path, marker: &str) {
        std::fs::create_dir_all(dir).unwrap();
        let mut bytes = b"\x7fELF\x02\x01\x01\0\0\0".to_vec();
        bytes.extend_from_slice(marker.as_bytes());
        bytes.extend_from_slice(b"\0\x13\x37trailing");
        std::fs::write(dir.join(paths::LIBRARY_NAME), bytes).unwrap();
    }

    struct Fixture {
        _root: TempDir,
        system: PathBuf,
        installs: PathBuf,
        resolver: VersionResolver,
    }

    fn fixture() -> Fixture {
        let root = tempdir().unwrap();
        let system = root.path().join("usr/lib");
        let installs = root.path().join("opt/manatee");
        let resolver = VersionResolver::new(KnownVersions::default())
            .with_standard_lib_dirs([system.clone()])
            .with_installs_dir(&installs);
        Fixture {
            _root: root,
            system,
            installs,
            resolver,
        }
    }

    #[test]
    fn test_find_version_marker() {
        assert_eq!(
            find_version_marker(b"\0\0manatee-open-2.208\0x"),
            Some("2.208")
        );
        assert_eq!(
            find_version_marker(b"junk open-2.225.8-cnc\x01"),
            Some("2.225.8-cnc")
        );
        assert_eq!(find_version_marker(b"open-source open-"), None);
    }

    #[test]
    fn test_detect_from_override() {
        let fx = fixture();
        let custom = fx.installs.join("custom/lib");
        fake_library(&custom, "manatee-open-2.214.1");
        assert_eq!(fx.resolver.detect(Some(&custom)).unwrap(), v("2.214.1"));
    }

    #[test]
    fn test_override_without_marker_is_error() {
        let fx = fixture();
        let custom = fx.installs.join("custom/lib");
        fake_library(&custom, "no version in here");
        assert!(matches!(
            fx.resolver.detect(Some(&custom)),
            Err(ResolveError::NoMarker { .. })
        ));
    }

    #[test]
    fn test_override_missing_library() {
        let fx = fixture();
        assert!(matches!(
            fx.resolver.detect(Some(&fx.installs)),
            Err(ResolveError::LibraryMissing { .. })
        ));
    }

    #[test]
    fn test_detect_system_library_first() {
        let fx = fixture();
        fake_library(&fx.system, "manatee-open-2.208.0");
        fake_library(&fx.installs.join("2.225.8/lib"), "manatee-open-2.225.8");
        assert_eq!(fx.resolver.detect(None).unwrap(), v("2.208.0"));
    }

    #[test]
    fn test_scan_picks_latest_known() {
        let fx = fixture();
        for name in ["2.167.8", "2.214.1", "2.999.0", "2.208", "notes", "latest"] {
            std::fs::create_dir_all(fx.installs.join(name)).unwrap();
        }
        std::fs::write(fx.installs.join("2.225.8"), "a file, not a dir").unwrap();

        assert_eq!(fx.resolver.detect(None).unwrap(), v("2.214.1"));
    }

    #[test]
    fn test_nothing_installed() {
        let fx = fixture();
        assert!(matches!(
            fx.resolver.detect(None),
            Err(ResolveError::NoSuitableVersion)
        ));
        std::fs::create_dir_all(fx.installs.join("1.0.0")).unwrap();
        assert!(matches!(
            fx.resolver.detect(None),
            Err(ResolveError::NoSuitableVersion)
        ));
    }

    #[test]
    fn test_resolve_detected_system_version() {
        let fx = fixture();
        fake_library(&fx.system, "manatee-open-2.208");
        let res = fx.resolver.resolve(None, None).unwrap();
        assert_eq!(res.version, v("2.208.0"));
        assert_eq!(res.lib_dir, fx.system);
        assert!(!res.explicit_lib);
        // The fixture's system dir lives in a temp dir, not a real standard path.
        assert!(res.needs_launcher);
    }

    #[test]
    fn test_resolve_mismatch_is_hard_stop() {
        let fx = fixture();
        fake_library(&fx.system, "manatee-open-2.208.0");

        let err = fx
            .resolver
            .resolve(Some(&v("2.214.1")), None)
            .unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, ResolveError::Mismatch { .. }));
        assert!(msg.contains("found manatee-open 2.208.0, you require 2.214.1"), "{msg}");
        assert!(msg.contains("--manatee-lib"), "{msg}");
        assert!(msg.contains("(manabuild <binary> 2.208.0)"), "{msg}");
    }

    #[test]
    fn test_resolve_unknown_request_rejected_first() {
        let fx = fixture();
        // Nothing installed at all: the allow-list check still wins.
        let err = fx.resolver.resolve(Some(&v("2.100.0")), None).unwrap_err();
        assert!(matches!(err, ResolveError::Unsupported { .. }));
        assert!(err.to_string().contains("2.167.8, 2.167.10"));
    }

    #[test]
    fn test_resolve_unknown_detected_version() {
        let fx = fixture();
        fake_library(&fx.system, "manatee-open-2.100.3");
        assert!(matches!(
            fx.resolver.resolve(None, None),
            Err(ResolveError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_resolve_versioned_install() {
        let fx = fixture();
        fake_library(&fx.installs.join("2.223.6/lib"), "manatee-open-2.223.6");
        let res = fx.resolver.resolve(Some(&v("2.223.6")), None).unwrap();
        assert_eq!(res.lib_dir, fx.installs.join("2.223.6/lib"));
        assert!(res.needs_launcher);
    }

    #[test]
    fn test_resolve_scan_without_library_fails() {
        let fx = fixture();
        std::fs::create_dir_all(fx.installs.join("2.223.6")).unwrap();
        assert!(matches!(
            fx.resolver.resolve(None, None),
            Err(ResolveError::LibraryNotFound { .. })
        ));
    }

    #[test]
    fn test_resolve_with_override_trusts_request() {
        let fx = fixture();
        let custom = fx.installs.join("custom/lib");
        fake_library(&custom, "manatee-open-2.208.0");
        let res = fx
            .resolver
            .resolve(Some(&v("2.214.1")), Some(&custom))
            .unwrap();
        assert_eq!(res.version, v("2.214.1"));
        assert_eq!(res.detected, v("2.208.0"));
        assert_eq!(res.lib_dir, custom);
        assert!(res.explicit_lib);
    }

    #[test]
    fn test_short_request_matches_allow_list() {
        let fx = fixture();
        fake_library(&fx.system, "manatee-open-2.208.0-cnc");
        let res = fx.resolver.resolve(Some(&v("2.208")), None).unwrap();
        assert_eq!(res.version, res.detected);
        assert_eq!(res.detected.variant(), "cnc");
    }
}
