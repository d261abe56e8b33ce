//! Upload planning: diff a client inventory against the metadata index

use crate::meta::MetadataIndex;
use crate::normalize::{normalize_client_rel, TokenSource};

/// One file as reported by the client
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientFile {
    pub rel: String,
    pub path: String,
    pub name: String,
    pub last_modified: i64,
    pub size: i64,
}

/// A file the client must send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeededFile {
    pub rel: String,
    pub last_modified: i64,
    pub size: i64,
}

/// Decide whether a client file is missing or stale on the server.
///
/// Newer timestamps and any size change trigger an upload. Content is not
/// hashed, so an edit that keeps the size and carries an older timestamp
/// goes unnoticed.
pub fn needs_upload(file: &ClientFile, rel: &str, index: &MetadataIndex) -> bool {
    match index.get(rel) {
        None => true,
        Some(meta) => file.last_modified > meta.last_modified || file.size != meta.size,
    }
}

/// Compute the need-upload list in inventory order.
///
/// Entries that normalize to the same path are all kept.
pub fn plan_upload(
    files: &[ClientFile],
    index: &MetadataIndex,
    tokens: &dyn TokenSource,
) -> Vec<NeededFile> {
    files
        .iter()
        .filter_map(|file| {
            let rel = normalize_client_rel(&file.rel, &file.path, tokens);
            needs_upload(file, &rel, index).then(|| NeededFile {
                rel,
                last_modified: file.last_modified,
                size: file.size,
            })
        })
        .collect()
}
