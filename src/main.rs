//! keg - manifest-driven installer CLI

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use keg::ops::InstallOptions;
use keg::types::Arch;

mod cmd;

#[derive(Parser)]
#[command(name = "keg")]
#[command(author, version, about = "keg - manifest-driven installer for prebuilt macOS CLI binaries")]
pub struct Cli {
    /// Show what would happen without making changes
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a package from its manifest
    Install {
        /// Package token(s), e.g. gcn or gdk
        #[arg(required = true)]
        tokens: Vec<String>,

        /// Pin a specific version (selects <token>@<version>.toml)
        #[arg(long)]
        version: Option<String>,

        /// Override the detected architecture
        #[arg(long, value_parser = clap::value_parser!(Arch))]
        arch: Option<Arch>,

        /// Directory containing package manifests
        #[arg(long, env = "KEG_MANIFEST_DIR")]
        manifest_dir: Option<PathBuf>,

        /// Directory to install binaries into
        #[arg(long, env = "KEG_INSTALL_DIR")]
        install_dir: Option<PathBuf>,

        /// Retry budget for transient download failures
        #[arg(long, default_value_t = keg::io::download::DEFAULT_MAX_ATTEMPTS)]
        max_attempts: u32,
    },
    /// Validate a manifest file
    Check {
        /// Manifest file to check
        path: PathBuf,
    },
    /// Compute SHA256 checksums of files (for manifest authoring)
    #[command(hide = true)]
    Hash {
        /// Files to hash
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let dry_run = cli.dry_run;

    match cli.command {
        Commands::Install {
            tokens,
            version,
            arch,
            manifest_dir,
            install_dir,
            max_attempts,
        } => {
            let opts = InstallOptions {
                manifest_dir: manifest_dir.unwrap_or_else(keg::manifest_dir),
                install_dir: install_dir.unwrap_or_else(keg::install_dir),
                max_attempts,
                dry_run,
            };
            if let Err(failure) =
                cmd::install::install(&tokens, version.as_deref(), arch, opts).await
            {
                std::process::exit(failure.error.exit_code());
            }
            Ok(())
        }
        Commands::Check { path } => cmd::check::check(&path),
        Commands::Hash { files } => cmd::hash::hash(&files),
        Commands::Completions { shell } => {
            cmd::completions::completions(shell);
            Ok(())
        }
    }
}
