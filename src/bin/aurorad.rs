use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;

use aurora_sync::cli::DaemonOpts;
use aurora_sync::config::ServerConfig;
use aurora_sync::logger::{ConsoleLogger, Logger, TeeLogger, TextLogger};
use aurora_sync::service::BackupService;

fn main() -> Result<()> {
    let opts = DaemonOpts::parse();
    let config = ServerConfig::from_opts(&opts)?;

    if config.backup_root.exists() && !config.backup_root.is_dir() {
        anyhow::bail!(
            "Error: Backup root is not a directory: {}",
            config.backup_root.display()
        );
    }

    let mut loggers: Vec<Arc<dyn Logger>> = vec![Arc::new(ConsoleLogger)];
    if let Some(ref path) = config.log_file {
        let text = TextLogger::new(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        loggers.push(Arc::new(text));
    }
    let logger: Arc<dyn Logger> = Arc::new(TeeLogger::new(loggers));

    let service = Arc::new(BackupService::open(&config, logger)?);

    println!("Starting AuroraSync daemon:");
    println!("  Root: {}", service.root().display());
    println!("  Metadata: {}", config.metadata_path.display());
    println!("  Indexed files: {}", service.len());
    println!("  Bind: {}", config.bind);

    // No authentication or TLS: warn when reachable from every interface
    if config.bind.starts_with("0.0.0.0") {
        eprintln!("⚠️  WARNING: Binding to 0.0.0.0 exposes the backup receiver to all network interfaces");
        eprintln!("   Uploads are UNAUTHENTICATED and UNENCRYPTED");
        eprintln!("   Only use on trusted networks (LAN)");
        eprintln!();
    }

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    rt.block_on(aurora_sync::server::serve(&config.bind, service))
}
