use tracing::info;

use crate::error::Result;
use crate::index::inmem::{IndexedStore, MemIndex, RecordSink};
use crate::journal::{Journal, LogRecord};
use crate::services::OpenParams;

impl RecordSink for Journal {
    fn persist(&mut self, rec: &LogRecord) -> Result<()> {
        self.append(rec)
    }
}

/// File and artifact tables persisted as an append-only journal, replayed on open.
pub type JournalStore = IndexedStore<Journal>;

impl IndexedStore<Journal> {
    pub fn open(params: &OpenParams) -> Result<Self> {
        let mut journal = Journal::open(&params.journal_path, params.sync_writes)?;
        let records = journal.replay()?;
        let index = MemIndex::from_records(&records);
        info!(
            path = %params.journal_path.display(),
            files = index.stats.files,
            artifacts = index.stats.artifacts,
            "journal store opened"
        );
        Ok(Self::with_sink(index, journal))
    }
}
