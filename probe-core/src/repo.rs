// probe_core/src/repo.rs
use crate::domain::{Artifact, Attribute, FileRecord, FileStatus, HashKind, TypeSelector};
use crate::error::Result;
use crate::query::ArtifactQuery;

/// Authoritative file-record table.
pub trait FileStore: Send + Sync {
    /// `Ok(None)` when no record has this id.
    fn record(&self, id: u64) -> Result<Option<FileRecord>>;

    fn set_hash(&self, id: u64, kind: HashKind, digest: &str) -> Result<()>;

    fn set_status(&self, id: u64, status: FileStatus) -> Result<()>;
}

/// The blackboard: typed findings keyed by artifact id, each owned by one file.
pub trait ArtifactStore: Send + Sync {
    fn create_artifact(&self, selector: &TypeSelector, file_id: u64) -> Result<Artifact>;

    /// Artifacts of `file_id` matching `selector`, in creation order.
    fn artifacts_for(&self, selector: &TypeSelector, file_id: u64) -> Result<Vec<Artifact>>;

    fn matching_artifacts(&self, query: &ArtifactQuery) -> Result<Vec<Artifact>>;

    fn add_attribute(&self, artifact_id: u64, attribute: Attribute) -> Result<()>;

    /// First artifact of `file_id` matching `selector`, creating one if none exists.
    /// The lookup and the insert happen atomically with respect to other callers.
    fn first_or_create(&self, selector: &TypeSelector, file_id: u64) -> Result<Artifact>;
}
