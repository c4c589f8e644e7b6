//! manabuild - build Go programs with a manatee-open dependency

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use clap::{CommandFactory, Parser};
use crossterm::style::Color;
use tracing_subscriber::EnvFilter;

use manabuild_cli::{Cli, UsageError, banner, config};
use manabuild_core::process::require_tool;
use manabuild_core::{
    BuildDriver, BuildOptions, KnownVersions, OperationSequence, SourceAcquirer, SystemRunner,
    Version, VersionResolver,
};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if cli.wants_version() {
        eprintln!("{}", manabuild_cli::version_text());
        return ExitCode::SUCCESS;
    }

    let seq = OperationSequence::stderr();
    match run(cli, &seq).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.is::<UsageError>() => {
            Cli::command().print_help().ok();
            ExitCode::FAILURE
        }
        Err(err) => {
            seq.fail(&err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, seq: &OperationSequence) -> Result<()> {
    let loaded = config::load(&cli.project_path)?;
    if loaded.is_none() && !cli.no_build && cli.binary.is_none() {
        return Err(UsageError.into());
    }

    let console = seq.console();
    console.line(&banner::render(
        manabuild_cli::BUILD_VERSION,
        manabuild_cli::BUILD_DATE,
        manabuild_cli::BUILD_COMMIT,
    ));

    let mut binary_name = cli.binary;
    if let Some(loaded) = loaded {
        console.line(&console.paint(
            &format!("\n \u{24D8}  Using {}", loaded.path.display()),
            Color::Yellow,
        ));
        binary_name = binary_name.or(loaded.config.target_binary_name);
    }

    let requested = cli
        .manatee_version
        .as_deref()
        .map(Version::parse)
        .transpose()
        .map_err(|e| anyhow!("failed to parse specified version: {e}"))?;

    let resolver = VersionResolver::new(KnownVersions::default());
    if let Some(version) = &requested {
        resolver.ensure_known(version)?;
    }

    require_tool("make")?;
    if !cli.no_build {
        require_tool("go")?;
        require_tool("git")?;
    }

    let driver = BuildDriver::new(
        resolver,
        SourceAcquirer::new(reqwest::Client::new()),
        Arc::new(SystemRunner),
    );
    let opts = BuildOptions {
        binary_name,
        requested,
        manatee_src: cli.manatee_src,
        manatee_lib: cli.manatee_lib,
        run_tests: cli.test,
        cmd_dir: cli.cmd_dir,
        prepare_only: cli.no_build,
        ..BuildOptions::new(cli.project_path)
    };

    let report = driver.run(seq, &opts).await?;
    if opts.prepare_only {
        print!("{}", report.flags.shell_exports());
    }
    Ok(())
}
