//! Build script embedding manabuild's own version, commit and build date.
//!
//! The values come from git so the banner and `manabuild version` report
//! the checkout the binary was built from.

use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn main() {
    // Rerun if git HEAD changes
    println!("cargo:rerun-if-changed=../../.git/HEAD");

    let version = git(&["describe", "--tags", "--always", "--dirty=-dev"])
        .map(|s| s.trim_start_matches('v').to_string())
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());
    let commit = git(&["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".to_string());
    let date = git(&["log", "-1", "--format=%cI"]).unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=MANABUILD_VERSION={version}");
    println!("cargo:rustc-env=MANABUILD_COMMIT={commit}");
    println!("cargo:rustc-env=MANABUILD_BUILD_DATE={date}");
}
