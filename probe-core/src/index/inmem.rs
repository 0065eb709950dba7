use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::domain::{Artifact, Attribute, FileRecord, FileStatus, HashKind, TypeSelector};
use crate::error::{ProbeError, Result};
use crate::journal::LogRecord;
use crate::query::ArtifactQuery;
use crate::repo::{ArtifactStore, FileStore};
use crate::stats::Stats;

/// File and artifact tables, rebuilt by applying log records in order.
#[derive(Clone, Debug, Default)]
pub struct MemIndex {
    pub files: BTreeMap<u64, FileRecord>,
    pub artifacts: BTreeMap<u64, Artifact>,
    /// Artifact ids per owning file, in creation order.
    pub by_file: HashMap<u64, Vec<u64>>,
    pub next_artifact_id: u64,
    pub stats: Stats,
}

impl MemIndex {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a LogRecord>) -> Self {
        let mut index = Self::default();
        for rec in records {
            index.apply(rec);
        }
        index
    }

    pub fn apply(&mut self, rec: &LogRecord) {
        match rec {
            LogRecord::PutFile(record) => {
                if self.files.insert(record.id, record.clone()).is_none() {
                    self.stats.files += 1;
                }
            }
            LogRecord::SetHash {
                file_id,
                kind,
                digest,
            } => {
                if let Some(f) = self.files.get_mut(file_id) {
                    f.hashes.set(*kind, digest);
                    self.stats.hash_updates += 1;
                }
            }
            LogRecord::SetStatus { file_id, status } => {
                if let Some(f) = self.files.get_mut(file_id) {
                    f.status = *status;
                    self.stats.status_updates += 1;
                }
            }
            LogRecord::NewArtifact {
                artifact_id,
                file_id,
                type_id,
                type_name,
            } => {
                let a = Artifact {
                    artifact_id: *artifact_id,
                    file_id: *file_id,
                    type_id: *type_id,
                    type_name: type_name.clone(),
                    attributes: Vec::new(),
                };
                self.artifacts.insert(*artifact_id, a);
                self.by_file.entry(*file_id).or_default().push(*artifact_id);
                self.next_artifact_id = self.next_artifact_id.max(*artifact_id + 1);
                self.stats.artifacts += 1;
            }
            LogRecord::AddAttribute {
                artifact_id,
                attribute,
            } => {
                if let Some(a) = self.artifacts.get_mut(artifact_id) {
                    a.attributes.push(attribute.clone());
                    self.stats.attributes += 1;
                }
            }
        }
    }

    fn require_file(&self, id: u64) -> Result<&FileRecord> {
        self.files.get(&id).ok_or(ProbeError::RecordNotFound(id))
    }

    pub fn set_hash_record(&self, id: u64, kind: HashKind, digest: &str) -> Result<LogRecord> {
        self.require_file(id)?;
        Ok(LogRecord::SetHash {
            file_id: id,
            kind,
            digest: digest.to_string(),
        })
    }

    pub fn set_status_record(&self, id: u64, status: FileStatus) -> Result<LogRecord> {
        self.require_file(id)?;
        Ok(LogRecord::SetStatus {
            file_id: id,
            status,
        })
    }

    pub fn new_artifact_record(&self, selector: &TypeSelector, file_id: u64) -> Result<LogRecord> {
        self.require_file(file_id)?;
        let (type_id, type_name) = selector.resolve()?;
        Ok(LogRecord::NewArtifact {
            artifact_id: self.next_artifact_id.max(1),
            file_id,
            type_id,
            type_name,
        })
    }

    pub fn add_attribute_record(
        &self,
        artifact_id: u64,
        attribute: Attribute,
    ) -> Result<LogRecord> {
        if !self.artifacts.contains_key(&artifact_id) {
            return Err(ProbeError::ArtifactNotFound(artifact_id));
        }
        Ok(LogRecord::AddAttribute {
            artifact_id,
            attribute,
        })
    }

    pub fn artifacts_for<'a>(
        &'a self,
        selector: &'a TypeSelector,
        file_id: u64,
    ) -> impl Iterator<Item = &'a Artifact> + 'a {
        self.by_file
            .get(&file_id)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.artifacts.get(id))
            .filter(move |a| selector.matches(a))
    }

    pub fn matching<'a>(
        &'a self,
        query: &'a ArtifactQuery,
    ) -> impl Iterator<Item = &'a Artifact> + 'a {
        self.artifacts.values().filter(move |a| query.matches(a))
    }
}

/// Where committed records go before they are applied to the index.
pub trait RecordSink: Send {
    fn persist(&mut self, rec: &LogRecord) -> Result<()>;
}

/// Keeps nothing; the index is the only copy.
#[derive(Debug, Default)]
pub struct Discard;

impl RecordSink for Discard {
    fn persist(&mut self, _rec: &LogRecord) -> Result<()> {
        Ok(())
    }
}

struct Shared<S> {
    index: MemIndex,
    sink: S,
}

/// A [`MemIndex`] behind one mutex; every mutation is persisted to the sink first,
/// then applied. Check-then-insert sequences run under the same lock.
pub struct IndexedStore<S> {
    state: Mutex<Shared<S>>,
}

pub type MemStore = IndexedStore<Discard>;

impl MemStore {
    pub fn new() -> Self {
        Self::with_sink(MemIndex::default(), Discard)
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: RecordSink> IndexedStore<S> {
    pub fn with_sink(index: MemIndex, sink: S) -> Self {
        Self {
            state: Mutex::new(Shared { index, sink }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Shared<S>>> {
        self.state
            .lock()
            .map_err(|_| ProbeError::Format("store lock poisoned".into()))
    }

    fn commit(shared: &mut Shared<S>, rec: LogRecord) -> Result<()> {
        shared.sink.persist(&rec)?;
        shared.index.apply(&rec);
        Ok(())
    }

    fn create_locked(
        shared: &mut Shared<S>,
        selector: &TypeSelector,
        file_id: u64,
    ) -> Result<Artifact> {
        let rec = shared.index.new_artifact_record(selector, file_id)?;
        let LogRecord::NewArtifact { artifact_id, .. } = rec else {
            return Err(ProbeError::Format("unexpected artifact record".into()));
        };
        Self::commit(shared, rec)?;
        debug!(artifact_id, file_id, ?selector, "artifact created");
        shared
            .index
            .artifacts
            .get(&artifact_id)
            .cloned()
            .ok_or(ProbeError::ArtifactNotFound(artifact_id))
    }

    /// Add or replace a file record. Populating records is the image loader's job.
    pub fn insert_file(&self, record: FileRecord) -> Result<()> {
        let mut shared = self.lock()?;
        Self::commit(&mut shared, LogRecord::PutFile(record))
    }

    pub fn file_ids(&self) -> Result<Vec<u64>> {
        Ok(self.lock()?.index.files.keys().copied().collect())
    }

    pub fn stats(&self) -> Result<Stats> {
        Ok(self.lock()?.index.stats.clone())
    }
}

impl<S: RecordSink> FileStore for IndexedStore<S> {
    fn record(&self, id: u64) -> Result<Option<FileRecord>> {
        Ok(self.lock()?.index.files.get(&id).cloned())
    }

    fn set_hash(&self, id: u64, kind: HashKind, digest: &str) -> Result<()> {
        let mut shared = self.lock()?;
        let rec = shared.index.set_hash_record(id, kind, digest)?;
        Self::commit(&mut shared, rec)
    }

    fn set_status(&self, id: u64, status: FileStatus) -> Result<()> {
        let mut shared = self.lock()?;
        let rec = shared.index.set_status_record(id, status)?;
        Self::commit(&mut shared, rec)
    }
}

impl<S: RecordSink> ArtifactStore for IndexedStore<S> {
    fn create_artifact(&self, selector: &TypeSelector, file_id: u64) -> Result<Artifact> {
        let mut shared = self.lock()?;
        Self::create_locked(&mut shared, selector, file_id)
    }

    fn artifacts_for(&self, selector: &TypeSelector, file_id: u64) -> Result<Vec<Artifact>> {
        let shared = self.lock()?;
        Ok(shared.index.artifacts_for(selector, file_id).cloned().collect())
    }

    fn matching_artifacts(&self, query: &ArtifactQuery) -> Result<Vec<Artifact>> {
        let shared = self.lock()?;
        Ok(shared.index.matching(query).cloned().collect())
    }

    fn add_attribute(&self, artifact_id: u64, attribute: Attribute) -> Result<()> {
        let mut shared = self.lock()?;
        let rec = shared.index.add_attribute_record(artifact_id, attribute)?;
        Self::commit(&mut shared, rec)
    }

    fn first_or_create(&self, selector: &TypeSelector, file_id: u64) -> Result<Artifact> {
        let mut shared = self.lock()?;
        if let Some(a) = shared.index.artifacts_for(selector, file_id).next() {
            return Ok(a.clone());
        }
        Self::create_locked(&mut shared, selector, file_id)
    }
}
