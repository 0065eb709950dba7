use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;
use crate::index::inmem::MemStore;
use crate::repo::{ArtifactStore, FileStore};
use crate::repo_journal::JournalStore;

#[derive(Clone, Debug)]
pub struct OpenParams {
    pub journal_path: PathBuf,
    /// fsync the journal after every record.
    pub sync_writes: bool,
}

impl OpenParams {
    pub fn new(journal_path: impl Into<PathBuf>) -> Self {
        Self {
            journal_path: journal_path.into(),
            sync_writes: false,
        }
    }
}

pub enum Backend {
    Memory,
    Journal(OpenParams),
}

/// The shared file and artifact stores, handed to every [`ImageFile`](crate::file::ImageFile).
/// Cloning shares the same instances.
#[derive(Clone)]
pub struct Services {
    files: Arc<dyn FileStore>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl Services {
    pub fn new(files: Arc<dyn FileStore>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self { files, artifacts }
    }

    /// One store serving both tables.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: FileStore + ArtifactStore + 'static,
    {
        Self {
            files: store.clone(),
            artifacts: store,
        }
    }

    pub fn file_store(&self) -> &dyn FileStore {
        self.files.as_ref()
    }

    pub fn artifact_store(&self) -> &dyn ArtifactStore {
        self.artifacts.as_ref()
    }
}

pub fn open_services(backend: Backend) -> Result<Services> {
    match backend {
        Backend::Memory => Ok(Services::shared(Arc::new(MemStore::new()))),
        Backend::Journal(p) => Ok(Services::shared(Arc::new(JournalStore::open(&p)?))),
    }
}
