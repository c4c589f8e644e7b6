//! Process environments and the version-conditioned cgo configuration.
//!
//! An [`EnvironmentVars`] set is captured once from the ambient process,
//! another is derived from the resolved manatee-open version and paths, and
//! the two are merged right before a command is spawned. The sets are plain
//! values; nothing here touches the real process environment.
//!
//! ## Derived variables
//!
//! | Variable | Below 2.208 | From 2.208 on |
//! |---|---|---|
//! | `CGO_CXXFLAGS` | `-std=c++14` + `corp`, `concord`, `query` includes | same |
//! | `CGO_CPPFLAGS` | `-I<src>` | adds `finlib`, `fsa3`, `hat-trie` |
//! | `CGO_LDFLAGS` | `-lmanatee -L<lib>` | adds `hat-trie` and `fsa3` static libs |

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use crate::version::Version;

/// Source subdirectories included by every manatee-open version.
const BASE_CXX_INCLUDES: &[&str] = &["corp", "concord", "query"];

/// Source subdirectories included only from [`crate::THRESHOLD_VERSION`] on.
const EXTENDED_CPP_INCLUDES: &[&str] = &["finlib", "fsa3", "hat-trie"];

/// Name/value mapping of environment variables.
///
/// Backed by an ordered map so rendering and comparison are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentVars {
    vars: BTreeMap<String, String>,
}

impl EnvironmentVars {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the environment of the current process.
    ///
    /// Variables whose name or value is not valid UTF-8 are converted lossily.
    pub fn capture() -> Self {
        std::env::vars_os()
            .map(|(k, v)| {
                (
                    k.to_string_lossy().into_owned(),
                    v.to_string_lossy().into_owned(),
                )
            })
            .collect()
    }

    /// Right-biased union: values from `overlay` win on key collision.
    /// Neither input is modified.
    #[must_use]
    pub fn merge(&self, overlay: &EnvironmentVars) -> EnvironmentVars {
        let mut vars = self.vars.clone();
        vars.extend(
            overlay
                .vars
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        Self { vars }
    }

    /// Set a variable, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Look up a variable.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Number of variables in the set
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether the set holds no variables
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Iterate variables in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Render as `export NAME="value"` lines for sourcing in a shell.
    pub fn shell_exports(&self) -> String {
        let mut out = String::new();
        for (k, v) in self.iter() {
            let _ = writeln!(out, "export {k}=\"{v}\"");
        }
        out
    }
}

impl FromIterator<(String, String)> for EnvironmentVars {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a EnvironmentVars {
    type Item = (&'a String, &'a String);
    type IntoIter = std::collections::btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.vars.iter()
    }
}

/// Derive the cgo compiler/linker variables needed to link a Go program
/// against manatee-open.
///
/// This is the only place where version-specific ABI and link differences
/// are encoded. The result depends on nothing but the arguments.
pub fn derive_build_flags(version: &Version, src_dir: &Path, lib_dir: &Path) -> EnvironmentVars {
    let src = src_dir.display().to_string();
    let lib = lib_dir.display().to_string();

    let cxx_flags = std::iter::once("-std=c++14".to_string())
        .chain(BASE_CXX_INCLUDES.iter().map(|d| format!("-I{src}/{d}")))
        .collect::<Vec<_>>()
        .join(" ");

    let mut cpp_flags = vec![format!("-I{src}")];
    let mut ld_flags = vec!["-lmanatee".to_string(), format!("-L{lib}")];

    if version.has_static_components() {
        cpp_flags.extend(
            EXTENDED_CPP_INCLUDES
                .iter()
                .map(|d| format!("-I{}", src_dir.join(d).display())),
        );
        ld_flags.extend([
            "-lhat-trie".to_string(),
            format!("-L{lib}"),
            "-lfsa3".to_string(),
            format!("-L{}", src_dir.join("fsa3/.libs").display()),
        ]);
    }

    let mut env = EnvironmentVars::new();
    env.set("CGO_CXXFLAGS", cxx_flags);
    env.set("CGO_CPPFLAGS", cpp_flags.join(" "));
    env.set("CGO_LDFLAGS", ld_flags.join(" "));
    env
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> EnvironmentVars {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_merge_overlay_wins() {
        let base = vars(&[("PATH", "/usr/bin"), ("HOME", "/root")]);
        let overlay = vars(&[("PATH", "/opt/bin"), ("CGO_LDFLAGS", "-lmanatee")]);

        let merged = base.merge(&overlay);
        assert_eq!(merged.get("PATH"), Some("/opt/bin"));
        assert_eq!(merged.get("HOME"), Some("/root"));
        assert_eq!(merged.get("CGO_LDFLAGS"), Some("-lmanatee"));
        assert_eq!(merged.len(), 3);

        // Inputs untouched
        assert_eq!(base.get("PATH"), Some("/usr/bin"));
        assert_eq!(overlay.len(), 2);
    }

    #[test]
    fn test_merge_idempotent_and_empty_identity() {
        let base = vars(&[("A", "1"), ("B", "2")]);
        let overlay = vars(&[("B", "3"), ("C", "4")]);

        let once = base.merge(&overlay);
        assert_eq!(once.merge(&overlay), once);
        assert_eq!(base.merge(&EnvironmentVars::new()), base);
    }

    #[test]
    fn test_capture_sees_process_env() {
        let captured = EnvironmentVars::capture();
        if let Ok(path) = std::env::var("PATH") {
            assert_eq!(captured.get("PATH"), Some(path.as_str()));
        }
    }

    #[test]
    fn test_shell_exports() {
        let env = vars(&[("B", "2"), ("A", "x y")]);
        assert_eq!(env.shell_exports(), "export A=\"x y\"\nexport B=\"2\"\n");
    }

    #[test]
    fn test_plain_flags_below_threshold() {
        let env = derive_build_flags(
            &Version::parse("2.207.3").unwrap(),
            Path::new("/tmp/manatee-open-2.207.3"),
            Path::new("/usr/local/lib"),
        );
        assert_eq!(
            env.get("CGO_CXXFLAGS"),
            Some(
                "-std=c++14 -I/tmp/manatee-open-2.207.3/corp \
                 -I/tmp/manatee-open-2.207.3/concord -I/tmp/manatee-open-2.207.3/query"
            )
        );
        assert_eq!(env.get("CGO_CPPFLAGS"), Some("-I/tmp/manatee-open-2.207.3"));
        assert_eq!(env.get("CGO_LDFLAGS"), Some("-lmanatee -L/usr/local/lib"));
        assert_eq!(env.len(), 3);
    }

    #[test]
    fn test_extended_flags_at_threshold() {
        let env = derive_build_flags(
            &Version::parse("2.208.0").unwrap(),
            Path::new("/src"),
            Path::new("/opt/manatee/2.208.0/lib"),
        );
        assert_eq!(
            env.get("CGO_CPPFLAGS"),
            Some("-I/src -I/src/finlib -I/src/fsa3 -I/src/hat-trie")
        );
        assert_eq!(
            env.get("CGO_LDFLAGS"),
            Some(
                "-lmanatee -L/opt/manatee/2.208.0/lib -lhat-trie -L/opt/manatee/2.208.0/lib \
                 -lfsa3 -L/src/fsa3/.libs"
            )
        );
        assert_eq!(
            env.get("CGO_CXXFLAGS"),
            Some("-std=c++14 -I/src/corp -I/src/concord -I/src/query")
        );
    }

    #[test]
    fn test_derive_is_pure() {
        let version = Version::parse("2.214.1").unwrap();
        let a = derive_build_flags(&version, Path::new("/s"), Path::new("/l"));
        let b = derive_build_flags(&version, Path::new("/s"), Path::new("/l"));
        assert_eq!(a, b);
        assert_eq!(a.shell_exports(), b.shell_exports());
    }
}
