//! Backup service: the metadata index plus everything that reads or
//! writes it
//!
//! The index sits behind one mutex. Planning holds it for lookups only; an
//! upload batch holds it from the first write until the document is saved,
//! so batches never interleave and the saved document always reflects a
//! prefix of the completed batches.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::logger::Logger;
use crate::meta::{MetadataIndex, MetadataStore};
use crate::normalize::{TokenSource, UuidTokens};
use crate::plan::{plan_upload, ClientFile, NeededFile};
use crate::receive::{IncomingFile, UploadReceiver, UploadReport};

pub struct BackupService {
    store: MetadataStore,
    index: Mutex<MetadataIndex>,
    receiver: UploadReceiver,
    tokens: Arc<dyn TokenSource>,
    logger: Arc<dyn Logger>,
}

impl BackupService {
    pub fn open(config: &ServerConfig, logger: Arc<dyn Logger>) -> Result<Self> {
        Self::with_tokens(config, logger, Arc::new(UuidTokens))
    }

    /// Create the backup root if needed and load the index.
    pub fn with_tokens(
        config: &ServerConfig,
        logger: Arc<dyn Logger>,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&config.backup_root).with_context(|| {
            format!("create backup root {}", config.backup_root.display())
        })?;
        let root = std::fs::canonicalize(&config.backup_root).with_context(|| {
            format!("canonicalize backup root {}", config.backup_root.display())
        })?;

        let store = MetadataStore::new(&config.metadata_path);
        let index = store.load();
        let receiver = UploadReceiver::new(
            root,
            Arc::clone(&tokens),
            Arc::clone(&logger),
            config.preserve_mtime,
        );

        Ok(Self {
            store,
            index: Mutex::new(index),
            receiver,
            tokens,
            logger,
        })
    }

    pub fn root(&self) -> &Path {
        self.receiver.root()
    }

    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    /// Number of indexed files
    pub fn len(&self) -> usize {
        self.index.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.lock().is_empty()
    }

    pub fn snapshot(&self) -> MetadataIndex {
        self.index.lock().clone()
    }

    /// Blocks while an upload batch holds the index.
    pub fn plan(&self, files: &[ClientFile]) -> Vec<NeededFile> {
        let needed = {
            let index = self.index.lock();
            plan_upload(files, &index, self.tokens.as_ref())
        };
        self.logger.inventory(files.len(), needed.len());
        needed
    }

    /// Blocking; call from a blocking-capable thread.
    pub fn receive(&self, files: Vec<IncomingFile>) -> Result<UploadReport> {
        let mut index = self.index.lock();
        self.receiver.receive(files, &mut index, &self.store)
    }
}
