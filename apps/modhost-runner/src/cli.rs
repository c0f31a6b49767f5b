use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser, Clone)]
#[command(name = "modhost-runner")]
#[command(about = "Load modhost modules and drive their lifecycle from stdin")]
pub struct Cli {
    /// JSON configuration file. Missing fields use defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the directory scanned for `<name>/<name>.<ext>` module libraries.
    #[arg(long)]
    pub modules_dir: Option<PathBuf>,

    /// Override the host root directory handed to every module.
    #[arg(long)]
    pub root_dir: Option<PathBuf>,

    /// Treat the initial load as a hot reload, leaving staged updates unapplied.
    #[arg(long, default_value_t = false)]
    pub no_staging: bool,
}
