//! Well-known locations: system library directories, the source cache and
//! the files manabuild drops into a manatee-open tree.

use std::path::{Path, PathBuf};

use crate::version::Version;

/// File name of the manatee-open shared library.
pub const LIBRARY_NAME: &str = "libmanatee.so";

/// Standard system library directories, in search priority order.
/// A library found here needs no launcher script.
pub const STANDARD_LIB_DIRS: &[&str] = &["/usr/lib", "/usr/local/lib"];

/// Directory holding version-named manatee-open installs (`<dir>/<version>/lib`).
pub const VERSIONED_INSTALLS_DIR: &str = "/opt/manatee";

/// Files that prove a directory is an unpacked manatee-open source tree.
pub const SOURCE_MARKERS: &[&str] = &["configure", "corp"];

/// Header generated by `./configure`; its presence means the tree was configured.
pub const CONFIGURED_HEADER: &str = "config.hh";

/// Stamp recording which version a source tree was last configured for.
pub const CONFIGURE_STAMP: &str = ".manabuild-configured";

/// Cache root for downloaded sources: the system temp directory.
pub fn default_cache_root() -> PathBuf {
    std::env::temp_dir()
}

/// Unpacked source tree for `version`: `<root>/manatee-open-<v>`
pub fn source_dir(cache_root: &Path, version: &Version) -> PathBuf {
    cache_root.join(version.dist_name())
}

/// Downloaded archive for `version`: `<root>/manatee-open-<v>.tar.gz`
pub fn archive_path(cache_root: &Path, version: &Version) -> PathBuf {
    cache_root.join(format!("{}.tar.gz", version.dist_name()))
}

/// Library dir of a versioned install: `<installs>/<v>/lib`
pub fn versioned_lib_dir(installs_dir: &Path, version: &Version) -> PathBuf {
    installs_dir.join(version.canonical()).join("lib")
}

/// Whether `lib_dir` is searched by the dynamic linker without help.
pub fn is_standard_lib_dir(lib_dir: &Path) -> bool {
    STANDARD_LIB_DIRS
        .iter()
        .any(|std_dir| lib_dir == Path::new(std_dir))
}

/// Whether every [`SOURCE_MARKERS`] entry exists below `dir`.
pub fn has_source_markers(dir: &Path) -> bool {
    SOURCE_MARKERS.iter().all(|m| dir.join(m).exists())
}

/// Target binary produced by `go build`: `<project>/<name>`
pub fn target_binary(project_dir: &Path, name: &str) -> PathBuf {
    project_dir.join(name)
}

/// Renamed target binary behind a launcher: `<project>/<name>.bin`
pub fn renamed_binary(project_dir: &Path, name: &str) -> PathBuf {
    project_dir.join(format!("{name}.bin"))
}
