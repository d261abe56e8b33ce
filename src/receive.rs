//! Upload receiver: writes uploaded files under the backup root and records
//! them in the metadata index

use anyhow::{bail, Context, Result};
use filetime::{set_file_mtime, FileTime};
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::logger::Logger;
use crate::meta::{FileMeta, MetadataIndex, MetadataStore};
use crate::normalize::{file_name_of, normalize_client_rel, TokenSource};

/// One uploaded file with the form fields that describe it
pub struct IncomingFile {
    pub reader: Box<dyn Read + Send>,
    /// File name from the multipart part header
    pub file_name: String,
    pub rel: String,
    pub path: String,
    /// Client mtime in epoch ms; 0 or less means unknown
    pub last_modified: i64,
    /// Client-reported size, informational only
    pub size: i64,
}

/// Response body for an upload batch
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub saved_count: usize,
    pub saved: Vec<String>,
}

pub struct UploadReceiver {
    root: PathBuf,
    tokens: Arc<dyn TokenSource>,
    logger: Arc<dyn Logger>,
    preserve_mtime: bool,
}

impl UploadReceiver {
    pub fn new(
        root: PathBuf,
        tokens: Arc<dyn TokenSource>,
        logger: Arc<dyn Logger>,
        preserve_mtime: bool,
    ) -> Self {
        Self {
            root,
            tokens,
            logger,
            preserve_mtime,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store a batch of uploads and persist the index once.
    ///
    /// `index` only changes if every file was written and the document was
    /// saved. Files written before a failure stay on disk.
    pub fn receive(
        &self,
        files: Vec<IncomingFile>,
        index: &mut MetadataIndex,
        store: &MetadataStore,
    ) -> Result<UploadReport> {
        let mut staged = index.clone();
        let mut saved = Vec::with_capacity(files.len());

        for file in files {
            let (rel, meta) = self.store_one(file)?;
            staged.insert(rel.clone(), meta);
            saved.push(rel);
        }

        store.save(&staged)?;
        *index = staged;

        Ok(UploadReport {
            saved_count: saved.len(),
            saved,
        })
    }

    fn store_one(&self, mut file: IncomingFile) -> Result<(String, FileMeta)> {
        // with neither hint the part's own file name comes before a token
        let unlabeled = file.rel.trim().is_empty() && file.path.trim().is_empty();
        let mut rel = if unlabeled {
            String::new()
        } else {
            normalize_client_rel(&file.rel, &file.path, self.tokens.as_ref())
        };
        if rel.trim().is_empty() {
            let name = file_name_of(&file.file_name);
            rel = if name.trim().is_empty() {
                self.tokens.next_token()
            } else {
                name.to_string()
            };
        }

        let dst = resolve_under_root(&self.root, &rel)?;
        {
            let mut out = File::create(&dst)
                .with_context(|| format!("create {}", dst.display()))?;
            std::io::copy(&mut file.reader, &mut out)
                .with_context(|| format!("write {}", dst.display()))?;
        }

        let actual = std::fs::metadata(&dst)
            .with_context(|| format!("stat {}", dst.display()))?
            .len();
        let last_modified = if file.last_modified > 0 {
            file.last_modified
        } else {
            now_millis()
        };
        if self.preserve_mtime {
            let _ = set_file_mtime(&dst, file_time_from_millis(last_modified));
        }

        self.logger.saved(&rel, actual);
        Ok((
            rel,
            FileMeta {
                last_modified,
                size: actual as i64,
            },
        ))
    }
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn file_time_from_millis(ms: i64) -> FileTime {
    FileTime::from_unix_time(ms.div_euclid(1000), (ms.rem_euclid(1000) * 1_000_000) as u32)
}

/// Map a relative path onto the backup root, creating parent directories.
///
/// Rejects NUL bytes, `..`, absolute and prefix components, a last segment
/// that names no file (`dir/`, `dir/.`), and (on Windows) `:` inside
/// components. After the parents exist, the canonical parent must
/// still be under the canonical root so symlinks cannot lead outside it.
pub fn resolve_under_root(root: &Path, rel: &str) -> Result<PathBuf> {
    use Component::{CurDir, Normal, ParentDir, Prefix, RootDir};

    if rel.contains('\0') {
        bail!("path contains NUL byte");
    }
    if matches!(file_name_of(rel), "" | "." | "..") {
        bail!("path {:?} does not name a file", rel);
    }

    let mut safe = PathBuf::new();
    for component in Path::new(rel).components() {
        match component {
            CurDir => {}
            Normal(s) => {
                // On Windows, reject components with ':' (ADS defense)
                #[cfg(windows)]
                if s.to_string_lossy().contains(':') {
                    bail!("path component contains colon (potential ADS attack)");
                }
                safe.push(s);
            }
            ParentDir | RootDir | Prefix(_) => {
                bail!("path {:?} contains disallowed component: {:?}", rel, component);
            }
        }
    }
    if safe.as_os_str().is_empty() {
        bail!("path {:?} has no file component", rel);
    }

    let joined = root.join(&safe);
    let parent = joined.parent().unwrap_or(root);
    std::fs::create_dir_all(parent)
        .with_context(|| format!("create directory {}", parent.display()))?;

    let canon_root = root
        .canonicalize()
        .with_context(|| format!("canonicalize root {}", root.display()))?;
    let canon_parent = parent
        .canonicalize()
        .with_context(|| format!("canonicalize {}", parent.display()))?;
    if !canon_parent.starts_with(&canon_root) {
        bail!("path {:?} escapes root {:?}", rel, root);
    }

    Ok(joined)
}
