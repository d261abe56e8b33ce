//! Command-line options for the daemon

use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Every option overrides the matching key of the configuration file
#[derive(Clone, Debug, Default, Parser)]
#[command(
    name = "aurorad",
    version,
    about = "AuroraSync - receives phone backups over HTTP and keeps a metadata index"
)]
pub struct DaemonOpts {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Bind address (host:port) [default: 0.0.0.0:5050]
    #[arg(long)]
    pub bind: Option<String>,

    /// Base directory; uses <base>/Backups/Received and <base>/Backups/metadata.json
    #[arg(long)]
    pub base: Option<PathBuf>,

    /// Directory that receives backed-up files
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Metadata index document
    #[arg(long)]
    pub metadata: Option<PathBuf>,

    /// Append log lines to this file as well as stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Leave received files with the time they were written instead of the client's mtime
    #[arg(long, action = ArgAction::SetTrue)]
    pub no_preserve_mtime: bool,
}
