//! External command execution.
//!
//! Every configure/make/go invocation goes through a [`CommandRunner`], so
//! the build pipeline can be exercised in tests with a recording runner
//! instead of real toolchains.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use thiserror::Error;

use crate::env::EnvironmentVars;

/// How a command's output is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Collect stdout and stderr; surfaced to the operator only on failure.
    #[default]
    Capture,
    /// Stream directly to the terminal (used for `go test`).
    Inherit,
}

/// Description of one command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable name or path
    pub program: String,
    /// Arguments, passed verbatim without a shell
    pub args: Vec<String>,
    /// Working directory, inherited when `None`
    pub dir: Option<PathBuf>,
    /// Complete environment for the child; inherited when `None`
    pub env: Option<EnvironmentVars>,
    /// Output handling
    pub mode: OutputMode,
}

impl CommandSpec {
    /// Start describing an invocation of `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            dir: None,
            env: None,
            mode: OutputMode::Capture,
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run inside `dir`.
    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Replace the child's environment with `env`.
    #[must_use]
    pub fn env(mut self, env: EnvironmentVars) -> Self {
        self.env = Some(env);
        self
    }

    /// Stream output to the terminal instead of capturing it.
    #[must_use]
    pub fn inherit_output(mut self) -> Self {
        self.mode = OutputMode::Inherit;
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Output of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output alone
    pub stdout: String,
}

/// A spawned command could not be started or exited unsuccessfully.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The program is not on `PATH`.
    #[error("required tool `{tool}` not found in PATH")]
    ToolMissing {
        /// Name of the missing program
        tool: String,
    },

    /// The process could not be spawned.
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        /// Rendered command line
        command: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The process exited with a non-zero status.
    #[error("`{command}` failed ({status}){}", render_output(.output))]
    Failed {
        /// Rendered command line
        command: String,
        /// Human readable exit status
        status: String,
        /// Captured combined output, empty for streamed commands
        output: String,
    },
}

impl CommandError {
    /// Captured output of a failed command, if any.
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Failed { output, .. } if !output.is_empty() => Some(output),
            _ => None,
        }
    }
}

fn render_output(output: &str) -> String {
    let trimmed = output.trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(":\n{trimmed}")
    }
}

fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

/// Executes [`CommandSpec`]s.
pub trait CommandRunner: Send + Sync {
    /// Run the command to completion, blocking the caller.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] if the command cannot be started or exits
    /// with a non-zero status.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for std::sync::Arc<T> {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        (**self).run(spec)
    }
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        if let Some(dir) = &spec.dir {
            cmd.current_dir(dir);
        }
        if let Some(env) = &spec.env {
            cmd.env_clear();
            cmd.envs(env);
        }
        tracing::debug!(command = %spec, dir = ?spec.dir, "running");

        let spawn_err = |source| CommandError::Spawn {
            command: spec.to_string(),
            source,
        };

        match spec.mode {
            OutputMode::Capture => {
                let out = cmd.stdin(Stdio::null()).output().map_err(spawn_err)?;
                let stdout = String::from_utf8_lossy(&out.stdout).into_owned();
                let mut combined = stdout.clone();
                combined.push_str(&String::from_utf8_lossy(&out.stderr));
                if !out.status.success() {
                    return Err(CommandError::Failed {
                        command: spec.to_string(),
                        status: describe_status(out.status),
                        output: combined,
                    });
                }
                Ok(CommandOutput { stdout })
            }
            OutputMode::Inherit => {
                let status = cmd.status().map_err(spawn_err)?;
                if !status.success() {
                    return Err(CommandError::Failed {
                        command: spec.to_string(),
                        status: describe_status(status),
                        output: String::new(),
                    });
                }
                Ok(CommandOutput::default())
            }
        }
    }
}

/// Make sure `tool` can be found on `PATH` before a step relies on it.
///
/// # Errors
///
/// Returns [`CommandError::ToolMissing`] when the lookup fails.
pub fn require_tool(tool: &str) -> Result<PathBuf, CommandError> {
    which::which(tool).map_err(|_| CommandError::ToolMissing {
        tool: tool.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_display() {
        let spec = CommandSpec::new("./configure").args(["--with-pcre", "--disable-python"]);
        assert_eq!(spec.to_string(), "./configure --with-pcre --disable-python");
    }

    #[cfg(unix)]
    #[test]
    fn test_capture_success() {
        let out = SystemRunner
            .run(&CommandSpec::new("sh").args(["-c", "echo out; echo err >&2"]))
            .unwrap();
        assert_eq!(out.stdout, "out\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_carries_output() {
        let err = SystemRunner
            .run(&CommandSpec::new("sh").args(["-c", "echo broken >&2; exit 3"]))
            .unwrap_err();
        assert_eq!(err.output(), Some("broken\n"));
        let msg = err.to_string();
        assert!(msg.contains("exit code 3"), "{msg}");
        assert!(msg.ends_with(":\nbroken"), "{msg}");
    }

    #[cfg(unix)]
    #[test]
    fn test_env_replaces_environment() {
        let mut env = EnvironmentVars::new();
        env.set("MANABUILD_MARKER", "42");
        env.set("PATH", std::env::var("PATH").unwrap_or_default());
        let out = SystemRunner
            .run(
                &CommandSpec::new("sh")
                    .args(["-c", "echo ${MANABUILD_MARKER}-${HOME:-unset}"])
                    .env(env),
            )
            .unwrap();
        assert_eq!(out.stdout, "42-unset\n");
    }

    #[test]
    fn test_spawn_error() {
        let err = SystemRunner
            .run(&CommandSpec::new("manabuild-no-such-program"))
            .unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }

    #[test]
    fn test_require_tool_missing() {
        assert!(matches!(
            require_tool("manabuild-no-such-program"),
            Err(CommandError::ToolMissing { .. })
        ));
    }
}
