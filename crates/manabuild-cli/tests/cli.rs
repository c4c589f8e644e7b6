//! End-to-end tests for the manabuild CLI binary.

use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Test context with an isolated, empty project directory
struct TestContext {
    project: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            project: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn manabuild(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_manabuild"));
        cmd.current_dir(self.project.path());
        cmd.env("NO_COLOR", "1");
        cmd
    }

    fn path(&self) -> &Path {
        self.project.path()
    }
}

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = ctx
        .manabuild()
        .arg("--help")
        .output()
        .expect("failed to run manabuild");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("--manatee-lib"));
}

#[test]
fn test_version_pseudo_command() {
    let ctx = TestContext::new();
    let output = ctx
        .manabuild()
        .arg("version")
        .output()
        .expect("failed to run manabuild");
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Manabuild "));
    assert!(stderr.contains("last commit:"));
}

#[test]
fn test_missing_binary_prints_usage() {
    let ctx = TestContext::new();
    let output = ctx
        .manabuild()
        .output()
        .expect("failed to run manabuild");
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
}

#[test]
fn test_unsupported_version_fails() {
    let ctx = TestContext::new();
    let output = ctx
        .manabuild()
        .args(["mquery", "2.100.1", "--project-path"])
        .arg(ctx.path())
        .output()
        .expect("failed to run manabuild");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unsupported version: 2.100.1"), "{stderr}");
    assert!(stderr.contains("Please use one of: 2.167.8, 2.167.10"), "{stderr}");
}

#[test]
fn test_malformed_version_fails() {
    let ctx = TestContext::new();
    let output = ctx
        .manabuild()
        .args(["mquery", "two.208"])
        .output()
        .expect("failed to run manabuild");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to parse specified version"));
}

#[test]
fn test_malformed_config_fails() {
    let ctx = TestContext::new();
    std::fs::write(ctx.path().join(".manabuild.json"), "not json").expect("write config");
    let output = ctx
        .manabuild()
        .output()
        .expect("failed to run manabuild");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains(".manabuild.json"));
}
