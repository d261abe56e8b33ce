//! Metadata index persistence
//!
//! The index maps every backed-up relative path to the modification time and
//! size the server last recorded for it. It is stored as one pretty-printed
//! JSON object.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};

/// Server-side state of one backed-up file
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    /// Epoch milliseconds
    pub last_modified: i64,
    /// Bytes on disk
    pub size: i64,
}

/// Relative path -> last known state
pub type MetadataIndex = HashMap<String, FileMeta>;

/// Single-file JSON store for the metadata index
#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: PathBuf,
}

impl MetadataStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the index, reporting why it could not be read.
    /// A missing document is an empty index, not an error.
    pub fn try_load(&self) -> Result<MetadataIndex> {
        if !self.path.exists() {
            return Ok(MetadataIndex::new());
        }
        let data = std::fs::read_to_string(&self.path)
            .with_context(|| format!("read metadata {}", self.path.display()))?;
        let index: MetadataIndex = serde_json::from_str(&data)
            .with_context(|| format!("parse metadata {}", self.path.display()))?;
        Ok(index)
    }

    /// Read the index; any failure yields an empty index.
    ///
    /// A damaged document must never keep the server from starting. The cost
    /// is that clients re-upload files the server already holds.
    pub fn load(&self) -> MetadataIndex {
        self.try_load().unwrap_or_default()
    }

    /// Rewrite the whole document.
    pub fn save(&self, index: &MetadataIndex) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create metadata dir {}", dir.display()))?;
        let data = serde_json::to_string_pretty(index)?;
        // atomic write
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(data.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .with_context(|| format!("write metadata {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn meta(last_modified: i64, size: i64) -> FileMeta {
        FileMeta {
            last_modified,
            size,
        }
    }

    #[test]
    fn test_missing_document_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = MetadataStore::new(tmp.path().join("metadata.json"));
        assert!(store.try_load().unwrap().is_empty());
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let tmp = TempDir::new().unwrap();
        let store = MetadataStore::new(tmp.path().join("nested/dir/metadata.json"));
        let mut index = MetadataIndex::new();
        index.insert("a/b.txt".to_string(), meta(1000, 50));
        index.insert("DCIM/photo.jpg".to_string(), meta(1_700_000_000_000, 4_194_304));
        index.insert("unicode/ファイル.txt".to_string(), meta(1, 0));

        store.save(&index).unwrap();
        assert_eq!(store.load(), index);
    }

    #[test]
    fn test_save_overwrites() {
        let tmp = TempDir::new().unwrap();
        let store = MetadataStore::new(tmp.path().join("metadata.json"));
        let mut index = MetadataIndex::new();
        index.insert("old.txt".to_string(), meta(1, 1));
        store.save(&index).unwrap();

        let mut replacement = MetadataIndex::new();
        replacement.insert("new.txt".to_string(), meta(2, 2));
        store.save(&replacement).unwrap();

        assert_eq!(store.load(), replacement);
    }

    #[test]
    fn test_document_shape() {
        let tmp = TempDir::new().unwrap();
        let store = MetadataStore::new(tmp.path().join("metadata.json"));
        let mut index = MetadataIndex::new();
        index.insert("a/b.txt".to_string(), meta(1000, 50));
        store.save(&index).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["a/b.txt"]["lastModified"], 1000);
        assert_eq!(value["a/b.txt"]["size"], 50);
        assert!(raw.contains('\n'), "document should be human-readable");
    }

    #[test]
    fn test_corrupt_document_fails_open() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("metadata.json");
        std::fs::write(&path, b"{ \"a.txt\": { \"lastModified\": ").unwrap();
        let store = MetadataStore::new(&path);

        assert!(store.try_load().is_err());
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_wrong_shape_fails_open() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("metadata.json");
        std::fs::write(&path, b"[1, 2, 3]").unwrap();
        assert!(MetadataStore::new(&path).load().is_empty());
    }
}
