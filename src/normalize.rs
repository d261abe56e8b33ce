//! Client path normalization
//!
//! Phones report files either with an explicit relative path or with an
//! absolute device path. Both are folded into the forward-slash relative
//! path used as the metadata index key.

use std::sync::atomic::{AtomicU64, Ordering};

/// Well-known storage root on Android devices
pub const DEVICE_STORAGE_MARKER: &str = "storage/emulated/0";

/// Source of unique names for files that arrive without any usable path
pub trait TokenSource: Send + Sync {
    fn next_token(&self) -> String;
}

/// Random v4 UUIDs
pub struct UuidTokens;

impl TokenSource for UuidTokens {
    fn next_token(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Deterministic `<prefix>-<n>` tokens, starting at 1
pub struct SequenceTokens {
    prefix: String,
    next: AtomicU64,
}

impl SequenceTokens {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl TokenSource for SequenceTokens {
    fn next_token(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.prefix, n)
    }
}

/// Derive the relative path for a client file.
///
/// 1. A non-blank `rel` wins: backslashes become slashes, leading slashes go.
/// 2. A blank `path` yields a fresh token.
/// 3. A path containing the device storage marker yields whatever follows it.
/// 4. Anything else is returned without its leading slashes.
///
/// Only case 2 consults `tokens`; every other case is a pure function of
/// its input.
pub fn normalize_client_rel(rel: &str, path: &str, tokens: &dyn TokenSource) -> String {
    if !rel.trim().is_empty() {
        return rel.replace('\\', "/").trim_start_matches('/').to_string();
    }

    // a blank path has no file name either
    if path.trim().is_empty() {
        return tokens.next_token();
    }

    let p = path.replace('\\', "/");
    // ASCII lowercasing keeps byte offsets aligned with `p`
    if let Some(idx) = p.to_ascii_lowercase().find(DEVICE_STORAGE_MARKER) {
        return p[idx + DEVICE_STORAGE_MARKER.len()..]
            .trim_start_matches('/')
            .to_string();
    }

    p.trim_start_matches('/').to_string()
}

/// Last path segment, accepting both separator styles
pub fn file_name_of(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or("")
}
