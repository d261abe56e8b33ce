//! Server configuration
//!
//! Defaults, then the TOML file, then command-line options.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cli::DaemonOpts;

pub const DEFAULT_BIND: &str = "0.0.0.0:5050";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on
    pub bind: String,
    /// Directory that receives backed-up files
    pub backup_root: PathBuf,
    /// Metadata index document
    pub metadata_path: PathBuf,
    /// Optional log file in addition to stderr
    pub log_file: Option<PathBuf>,
    /// Set each received file's mtime to the recorded lastModified
    pub preserve_mtime: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            backup_root: PathBuf::new(),
            metadata_path: PathBuf::new(),
            log_file: None,
            preserve_mtime: true,
        }
        .with_base(Path::new("."))
    }
}

impl ServerConfig {
    /// Point both the backup root and the metadata document under `base`
    pub fn with_base(mut self, base: &Path) -> Self {
        let backups = base.join("Backups");
        self.backup_root = backups.join("Received");
        self.metadata_path = backups.join("metadata.json");
        self
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let cfg: ServerConfig =
            toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
        Ok(cfg)
    }

    pub fn from_opts(opts: &DaemonOpts) -> Result<Self> {
        let mut cfg = match &opts.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        if let Some(base) = &opts.base {
            cfg = cfg.with_base(base);
        }
        if let Some(bind) = &opts.bind {
            cfg.bind = bind.clone();
        }
        if let Some(root) = &opts.root {
            cfg.backup_root = root.clone();
        }
        if let Some(metadata) = &opts.metadata {
            cfg.metadata_path = metadata.clone();
        }
        if let Some(log_file) = &opts.log_file {
            cfg.log_file = Some(log_file.clone());
        }
        if opts.no_preserve_mtime {
            cfg.preserve_mtime = false;
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind, DEFAULT_BIND);
        assert_eq!(cfg.backup_root, Path::new("./Backups/Received"));
        assert_eq!(cfg.metadata_path, Path::new("./Backups/metadata.json"));
        assert!(cfg.log_file.is_none());
        assert!(cfg.preserve_mtime);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("aurora.toml");
        std::fs::write(&path, "bind = \"127.0.0.1:7000\"\npreserve_mtime = false\n").unwrap();

        let cfg = ServerConfig::load(&path).unwrap();
        assert_eq!(cfg.bind, "127.0.0.1:7000");
        assert!(!cfg.preserve_mtime);
        assert_eq!(cfg.metadata_path, ServerConfig::default().metadata_path);
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("aurora.toml");
        std::fs::write(&path, "bind = [").unwrap();
        assert!(ServerConfig::load(&path).is_err());
        assert!(ServerConfig::load(&tmp.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("aurora.toml");
        std::fs::write(
            &path,
            "bind = \"127.0.0.1:7000\"\nbackup_root = \"/from/file\"\nlog_file = \"/from/file.log\"\n",
        )
        .unwrap();
        let opts = DaemonOpts {
            config: Some(path),
            bind: Some("127.0.0.1:8000".into()),
            metadata: Some(PathBuf::from("/cli/meta.json")),
            no_preserve_mtime: true,
            ..Default::default()
        };

        let cfg = ServerConfig::from_opts(&opts).unwrap();
        assert_eq!(cfg.bind, "127.0.0.1:8000");
        assert_eq!(cfg.backup_root, Path::new("/from/file"));
        assert_eq!(cfg.metadata_path, Path::new("/cli/meta.json"));
        assert_eq!(cfg.log_file, Some(PathBuf::from("/from/file.log")));
        assert!(!cfg.preserve_mtime);
    }

    #[test]
    fn test_base_then_explicit_root() {
        let opts = DaemonOpts {
            base: Some(PathBuf::from("/data")),
            root: Some(PathBuf::from("/elsewhere")),
            ..Default::default()
        };
        let cfg = ServerConfig::from_opts(&opts).unwrap();
        assert_eq!(cfg.backup_root, Path::new("/elsewhere"));
        assert_eq!(cfg.metadata_path, Path::new("/data/Backups/metadata.json"));
    }
}
