//! The file entity: a cached view over one file record plus the findings
//! attached to it.

use tracing::{debug, warn};

use crate::domain::{
    Artifact, ArtifactType, Attribute, FileRecord, FileStatus, FileType, HashKind, TypeSelector,
};
use crate::error::{ProbeError, Result};
use crate::query::ArtifactQuery;
use crate::services::Services;

/// One file recovered from an image.
///
/// Metadata is fetched once by [`ImageFile::open`] and served from the cache
/// afterwards. Hash and status writes go to the file store first and reach the
/// cache only once the store accepted them. Not meant to be shared between
/// threads; open one per task.
pub struct ImageFile {
    services: Services,
    record: FileRecord,
}

impl ImageFile {
    pub fn open(services: &Services, id: u64) -> Result<Self> {
        let record = fetch(services, id)?;
        debug!(id, name = %record.name, "file record loaded");
        Ok(Self {
            services: services.clone(),
            record,
        })
    }

    /// Replace the whole cached record with the store's current one.
    pub fn reload(&mut self) -> Result<()> {
        self.record = fetch(&self.services, self.record.id)?;
        Ok(())
    }

    pub fn record(&self) -> &FileRecord {
        &self.record
    }

    pub fn id(&self) -> u64 {
        self.record.id
    }

    pub fn type_id(&self) -> i32 {
        self.record.type_id
    }

    pub fn file_type(&self) -> Option<FileType> {
        self.record.file_type()
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    /// Text after the last `.` of the name, or the whole name when it has none.
    pub fn extension(&self) -> &str {
        extension_of(&self.record.name)
    }

    pub fn parent_file_id(&self) -> u64 {
        self.record.parent_file_id
    }

    pub fn dir_type(&self) -> i32 {
        self.record.dir_type
    }

    pub fn meta_type(&self) -> i32 {
        self.record.meta_type
    }

    pub fn dir_flags(&self) -> i32 {
        self.record.dir_flags
    }

    pub fn meta_flags(&self) -> i32 {
        self.record.meta_flags
    }

    pub fn size(&self) -> u64 {
        self.record.size
    }

    pub fn ctime(&self) -> i32 {
        self.record.ctime
    }

    pub fn crtime(&self) -> i32 {
        self.record.crtime
    }

    pub fn atime(&self) -> i32 {
        self.record.atime
    }

    pub fn mtime(&self) -> i32 {
        self.record.mtime
    }

    pub fn mode(&self) -> i32 {
        self.record.mode
    }

    pub fn uid(&self) -> i32 {
        self.record.uid
    }

    pub fn gid(&self) -> i32 {
        self.record.gid
    }

    pub fn status(&self) -> FileStatus {
        self.record.status
    }

    pub fn full_path(&self) -> &str {
        &self.record.full_path
    }

    pub fn hash(&self, kind: HashKind) -> &str {
        self.record.hashes.get(kind)
    }

    pub fn set_hash(&mut self, kind: HashKind, digest: &str) -> Result<()> {
        let id = self.record.id;
        self.services
            .file_store()
            .set_hash(id, kind, digest)
            .map_err(|e| persistence_failure(id, e))?;
        self.record.hashes.set(kind, digest);
        Ok(())
    }

    /// No transition order is enforced between pipeline stages.
    pub fn set_status(&mut self, status: FileStatus) -> Result<()> {
        let id = self.record.id;
        self.services
            .file_store()
            .set_status(id, status)
            .map_err(|e| persistence_failure(id, e))?;
        self.record.status = status;
        Ok(())
    }

    /// Always creates a new artifact, even if one of the same type exists.
    pub fn new_artifact(&self, selector: impl Into<TypeSelector>) -> Result<Artifact> {
        self.services
            .artifact_store()
            .create_artifact(&selector.into(), self.record.id)
    }

    pub fn artifacts(&self, selector: impl Into<TypeSelector>) -> Result<Vec<Artifact>> {
        self.services
            .artifact_store()
            .artifacts_for(&selector.into(), self.record.id)
    }

    pub fn all_artifacts(&self) -> Result<Vec<Artifact>> {
        self.services
            .artifact_store()
            .matching_artifacts(&ArtifactQuery::for_file(self.record.id))
    }

    /// The file's general-info artifact, created on first use.
    pub fn gen_info(&self) -> Result<Artifact> {
        self.services
            .artifact_store()
            .first_or_create(&ArtifactType::GenInfo.into(), self.record.id)
    }

    pub fn add_gen_info_attribute(&self, attribute: Attribute) -> Result<()> {
        let gen_info = self.gen_info()?;
        self.services
            .artifact_store()
            .add_attribute(gen_info.artifact_id, attribute)
    }
}

fn fetch(services: &Services, id: u64) -> Result<FileRecord> {
    services
        .file_store()
        .record(id)?
        .ok_or(ProbeError::RecordNotFound(id))
}

fn persistence_failure(file_id: u64, e: ProbeError) -> ProbeError {
    warn!(file_id, error = %e, "write-through rejected by file store");
    ProbeError::Persistence {
        file_id,
        reason: e.to_string(),
    }
}

fn extension_of(name: &str) -> &str {
    match name.rfind('.') {
        Some(i) => &name[i + 1..],
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::AttributeValue;
    use crate::index::inmem::{IndexedStore, MemIndex, MemStore, RecordSink};
    use crate::journal::LogRecord;
    use crate::repo::FileStore;

    fn full_record(id: u64) -> FileRecord {
        FileRecord {
            id,
            type_id: 1,
            name: "report.final.pdf".into(),
            parent_file_id: 5,
            dir_type: 5,
            meta_type: 1,
            dir_flags: 1,
            meta_flags: 5,
            size: 48_213,
            ctime: 1_300_000_001,
            crtime: 1_300_000_002,
            atime: 1_300_000_003,
            mtime: 1_300_000_004,
            mode: 0o644,
            uid: 1000,
            gid: 100,
            status: FileStatus::ReadyForAnalysis,
            full_path: "/home/alice/report.final.pdf".into(),
            hashes: Default::default(),
        }
    }

    fn services_with(records: Vec<FileRecord>) -> (Arc<MemStore>, Services) {
        let store = Arc::new(MemStore::new());
        for r in records {
            store.insert_file(r).unwrap();
        }
        (store.clone(), Services::shared(store))
    }

    #[test]
    fn accessors_mirror_the_stored_record() {
        let expected = full_record(42);
        let (_, services) = services_with(vec![expected.clone()]);
        let f = ImageFile::open(&services, 42).unwrap();

        assert_eq!(f.id(), expected.id);
        assert_eq!(f.type_id(), expected.type_id);
        assert_eq!(f.file_type(), Some(FileType::Carved));
        assert_eq!(f.name(), expected.name);
        assert_eq!(f.parent_file_id(), expected.parent_file_id);
        assert_eq!(f.dir_type(), expected.dir_type);
        assert_eq!(f.meta_type(), expected.meta_type);
        assert_eq!(f.dir_flags(), expected.dir_flags);
        assert_eq!(f.meta_flags(), expected.meta_flags);
        assert_eq!(f.size(), expected.size);
        assert_eq!(f.ctime(), expected.ctime);
        assert_eq!(f.crtime(), expected.crtime);
        assert_eq!(f.atime(), expected.atime);
        assert_eq!(f.mtime(), expected.mtime);
        assert_eq!(f.mode(), expected.mode);
        assert_eq!(f.uid(), expected.uid);
        assert_eq!(f.gid(), expected.gid);
        assert_eq!(f.status(), expected.status);
        assert_eq!(f.full_path(), expected.full_path);
        assert_eq!(f.record(), &expected);
    }

    #[test]
    fn missing_record_is_reported() {
        let (_, services) = services_with(vec![]);
        assert!(matches!(
            ImageFile::open(&services, 7),
            Err(ProbeError::RecordNotFound(7))
        ));
    }

    #[test]
    fn extension_cases() {
        assert_eq!(extension_of("report.pdf"), "pdf");
        assert_eq!(extension_of("README"), "README");
        assert_eq!(extension_of("a.b.c"), "c");
        assert_eq!(extension_of("trailing."), "");
        assert_eq!(extension_of(".bashrc"), "bashrc");
        assert_eq!(extension_of(""), "");
    }

    #[test]
    fn set_hash_writes_through() {
        let (store, services) = services_with(vec![full_record(1)]);
        let mut f = ImageFile::open(&services, 1).unwrap();
        f.set_hash(HashKind::Md5, "d41d8cd98f00b204e9800998ecf8427e").unwrap();
        assert_eq!(f.hash(HashKind::Md5), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(f.hash(HashKind::Sha1), "");
        let stored = store.record(1).unwrap().unwrap();
        assert_eq!(stored.hashes.md5, "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn set_status_is_visible_to_a_fresh_load() {
        let (_, services) = services_with(vec![full_record(1)]);
        let mut f = ImageFile::open(&services, 1).unwrap();
        f.set_status(FileStatus::AnalysisFailed).unwrap();
        let fresh = ImageFile::open(&services, 1).unwrap();
        assert_eq!(fresh.status(), FileStatus::AnalysisFailed);
    }

    #[test]
    fn status_moves_backwards_without_complaint() {
        let (_, services) = services_with(vec![full_record(1)]);
        let mut f = ImageFile::open(&services, 1).unwrap();
        f.set_status(FileStatus::AnalysisComplete).unwrap();
        f.set_status(FileStatus::Created).unwrap();
        assert_eq!(f.status(), FileStatus::Created);
    }

    /// Accepts file records, refuses every later write.
    struct ReadOnlyAfterLoad;

    impl RecordSink for ReadOnlyAfterLoad {
        fn persist(&mut self, rec: &LogRecord) -> Result<()> {
            match rec {
                LogRecord::PutFile(_) => Ok(()),
                _ => Err(ProbeError::Io(std::io::Error::other("disk full"))),
            }
        }
    }

    #[test]
    fn rejected_write_leaves_cache_and_store_in_agreement() {
        let store = Arc::new(IndexedStore::with_sink(MemIndex::default(), ReadOnlyAfterLoad));
        store.insert_file(full_record(3)).unwrap();
        let services = Services::shared(store.clone());
        let mut f = ImageFile::open(&services, 3).unwrap();

        let err = f.set_hash(HashKind::Sha2_256, "ab").unwrap_err();
        assert!(matches!(err, ProbeError::Persistence { file_id: 3, .. }));
        assert_eq!(f.hash(HashKind::Sha2_256), "");
        assert_eq!(store.record(3).unwrap().unwrap().hashes.sha2_256, "");

        let err = f.set_status(FileStatus::AnalysisComplete).unwrap_err();
        assert!(matches!(err, ProbeError::Persistence { file_id: 3, .. }));
        assert_eq!(f.status(), FileStatus::ReadyForAnalysis);
        assert_eq!(
            store.record(3).unwrap().unwrap().status,
            FileStatus::ReadyForAnalysis
        );
    }

    #[test]
    fn reload_picks_up_changes_made_elsewhere() {
        let (store, services) = services_with(vec![full_record(9)]);
        let mut f = ImageFile::open(&services, 9).unwrap();
        store.set_status(9, FileStatus::AnalysisSkipped).unwrap();
        assert_eq!(f.status(), FileStatus::ReadyForAnalysis);
        f.reload().unwrap();
        assert_eq!(f.status(), FileStatus::AnalysisSkipped);
    }

    #[test]
    fn new_artifact_never_deduplicates() {
        let (_, services) = services_with(vec![full_record(1)]);
        let f = ImageFile::open(&services, 1).unwrap();
        let a = f.new_artifact(ArtifactType::WebHistory).unwrap();
        let b = f.new_artifact(4).unwrap();
        assert_ne!(a.artifact_id, b.artifact_id);
        assert_eq!(f.artifacts("TSK_WEB_HISTORY").unwrap().len(), 2);
        assert_eq!(f.artifacts(ArtifactType::WebHistory).unwrap().len(), 2);
        assert_eq!(f.artifacts(4).unwrap().len(), 2);
    }

    #[test]
    fn artifacts_with_no_match_is_empty() {
        let (_, services) = services_with(vec![full_record(1)]);
        let f = ImageFile::open(&services, 1).unwrap();
        f.new_artifact(ArtifactType::KeywordHit).unwrap();
        assert!(f.artifacts(ArtifactType::WebCookie).unwrap().is_empty());
        assert!(f.artifacts("NOT_A_TYPE").unwrap().is_empty());
    }

    #[test]
    fn all_artifacts_is_scoped_to_the_file() {
        let (_, services) = services_with(vec![full_record(1), full_record(2)]);
        let one = ImageFile::open(&services, 1).unwrap();
        let two = ImageFile::open(&services, 2).unwrap();
        one.new_artifact(ArtifactType::KeywordHit).unwrap();
        one.gen_info().unwrap();
        two.new_artifact(ArtifactType::KeywordHit).unwrap();

        let all = one.all_artifacts().unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|a| a.file_id == 1));
    }

    #[test]
    fn gen_info_is_created_once() {
        let (store, services) = services_with(vec![full_record(1)]);
        let f = ImageFile::open(&services, 1).unwrap();
        let first = f.gen_info().unwrap();
        let second = f.gen_info().unwrap();
        assert_eq!(first.artifact_id, second.artifact_id);
        assert_eq!(f.artifacts(ArtifactType::GenInfo).unwrap().len(), 1);
        assert_eq!(store.stats().unwrap().artifacts, 1);
    }

    #[test]
    fn gen_info_attributes_accumulate_on_one_artifact() {
        let (_, services) = services_with(vec![full_record(1)]);
        let f = ImageFile::open(&services, 1).unwrap();
        f.add_gen_info_attribute(Attribute::new(1, "m", AttributeValue::Text("a".into())))
            .unwrap();
        f.add_gen_info_attribute(Attribute::new(2, "m", AttributeValue::Double(0.5)))
            .unwrap();

        let gi = f.artifacts(ArtifactType::GenInfo).unwrap();
        assert_eq!(gi.len(), 1);
        assert_eq!(gi[0].attributes.len(), 2);
        assert_eq!(gi[0].attributes[1].value, AttributeValue::Double(0.5));
    }
}
