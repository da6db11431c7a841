use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use postern::{Config, Controller};

#[cfg(not(any(target_os = "macos", unix)))]
compile_error!("Only macos and unix are currently supported");

#[derive(Debug, Parser)]
#[command(name = "postern", about = "A minimal SMTP receiving server", version)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short = 'c', long = "config", default_value = "/etc/postern.yaml")]
    config: PathBuf,

    /// Path to the PID file written when daemonized
    #[arg(short = 'p', long = "pid-file", default_value = "/var/run/postern.pid")]
    pid_file: PathBuf,

    /// Run in the foreground (do not daemonize)
    #[arg(short = 'f', long = "foreground")]
    foreground: bool,
}

fn daemonize(pid_file: &Path) -> anyhow::Result<()> {
    daemonize::Daemonize::new()
        .pid_file(pid_file)
        .umask(0o027)
        .start()
        .context("failed to daemonize")?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Parse the configuration while stderr is still attached to the
    // terminal; after daemonizing the failure would be invisible.
    Config::load(&args.config)?;

    if !args.foreground {
        daemonize(&args.pid_file)?;
    }

    // The fork in daemonize() must happen before any runtime threads exist.
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(Controller::new(args.config).run())
}
