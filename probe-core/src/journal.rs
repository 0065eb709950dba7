use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::domain::{Attribute, FileRecord, FileStatus, HashKind};
use crate::error::{ProbeError, Result};

const MAGIC: &[u8; 8] = b"PRBJRNL\0";
const VERSION: u8 = 1;
const HEADER_LEN: u64 = (MAGIC.len() + 1) as u64;
const TAG_LEN: usize = 32;
/// Largest payload a record may claim; a bigger length prefix is corruption.
const MAX_RECORD_LEN: u64 = 64 * 1024 * 1024;

/// One mutation of the file or artifact tables.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum LogRecord {
    PutFile(FileRecord),
    SetHash {
        file_id: u64,
        kind: HashKind,
        digest: String,
    },
    SetStatus {
        file_id: u64,
        status: FileStatus,
    },
    NewArtifact {
        artifact_id: u64,
        file_id: u64,
        type_id: i32,
        type_name: String,
    },
    AddAttribute {
        artifact_id: u64,
        attribute: Attribute,
    },
}

pub struct Journal {
    f: File,
    path: PathBuf,
    sync_writes: bool,
}

pub struct JournalIter<'a> {
    f: &'a mut File,
    /// Offset just past the last intact record.
    good_end: u64,
}

impl<'a> Iterator for JournalIter<'a> {
    type Item = Result<LogRecord>;
    fn next(&mut self) -> Option<Self::Item> {
        match read_next_record(self.f) {
            Ok(Some(r)) => match self.f.stream_position() {
                Ok(pos) => {
                    self.good_end = pos;
                    Some(Ok(r))
                }
                Err(e) => Some(Err(e.into())),
            },
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

fn read_next_record(f: &mut File) -> Result<Option<LogRecord>> {
    let len = match get_uvarint(f)? {
        Some(n) => n,
        None => return Ok(None),
    };
    if len > MAX_RECORD_LEN {
        return Err(ProbeError::Format(format!(
            "journal record length {len} exceeds {MAX_RECORD_LEN}"
        )));
    }
    let frame_len = len
        .checked_add(TAG_LEN as u64)
        .ok_or_else(|| ProbeError::Format("journal record length overflow".into()))?;
    let remaining = f.metadata()?.len().saturating_sub(f.stream_position()?);
    if frame_len > remaining {
        // torn tail
        return Ok(None);
    }
    let len = usize::try_from(len)
        .map_err(|_| ProbeError::Format(format!("journal record length {len} too large")))?;

    let mut buf = vec![0u8; len + TAG_LEN];
    if let Err(e) = f.read_exact(&mut buf) {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            return Ok(None);
        }
        return Err(e.into());
    }
    let (payload, tag) = buf.split_at(len);
    if blake3::hash(payload).as_bytes() != tag {
        return Err(ProbeError::Format("journal record checksum mismatch".into()));
    }

    let rec: LogRecord = serde_cbor::from_slice(payload)
        .map_err(|e| ProbeError::Format(format!("journal record decode: {e}")))?;
    Ok(Some(rec))
}

fn encode_frame(rec: &LogRecord) -> Result<Vec<u8>> {
    let mut plain = Vec::with_capacity(256);
    serde_cbor::to_writer(&mut plain, rec)
        .map_err(|e| ProbeError::Format(format!("journal record encode: {e}")))?;

    let mut frame = Vec::with_capacity(plain.len() + 10 + TAG_LEN);
    put_uvarint(&mut frame, plain.len() as u64);
    frame.extend_from_slice(&plain);
    frame.extend_from_slice(blake3::hash(&plain).as_bytes());
    Ok(frame)
}

/// What [`write_frame`] needs from the journal file.
trait FrameFile: Write + Seek {
    fn truncate_to(&mut self, len: u64) -> std::io::Result<()>;
    fn sync(&mut self) -> std::io::Result<()>;
}

impl FrameFile for File {
    fn truncate_to(&mut self, len: u64) -> std::io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> std::io::Result<()> {
        self.sync_data()
    }
}

/// Write one frame at the current position. On failure the file is cut back to
/// where the frame started, so no partial frame precedes the next append.
fn write_frame<F: FrameFile>(f: &mut F, frame: &[u8], sync: bool) -> Result<()> {
    let start = f.stream_position()?;
    let written = f
        .write_all(frame)
        .and_then(|_| f.flush())
        .and_then(|_| if sync { f.sync() } else { Ok(()) });
    if let Err(e) = written {
        warn!(error = %e, offset = start, "journal append failed, rolling back");
        f.truncate_to(start)?;
        f.seek(SeekFrom::Start(start))?;
        return Err(e.into());
    }
    Ok(())
}

fn put_uvarint(out: &mut Vec<u8>, mut x: u64) {
    while x >= 0x80 {
        out.push((x as u8) | 0x80);
        x >>= 7;
    }
    out.push(x as u8);
}

/// `Ok(None)` on a clean or torn end of file.
fn get_uvarint<R: Read>(r: &mut R) -> Result<Option<u64>> {
    let mut x: u64 = 0;
    let mut s: u32 = 0;
    for _ in 0..10 {
        let mut b = [0u8; 1];
        match r.read(&mut b) {
            Ok(0) => return Ok(None),
            Ok(_) => {
                let byte = b[0];
                if byte < 0x80 {
                    x |= (byte as u64) << s;
                    return Ok(Some(x));
                }
                x |= ((byte & 0x7f) as u64) << s;
                s += 7;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(ProbeError::Format("journal varint too long".into()))
}

impl Journal {
    pub fn open(path: &Path, sync_writes: bool) -> Result<Self> {
        let mut f = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        match FileExt::try_lock_exclusive(&f) {
            Ok(()) => {}
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                return Err(ProbeError::Locked(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        }

        let len = f.metadata()?.len();
        if len < HEADER_LEN {
            // Empty, or a header cut short by a crash.
            let mut existing = vec![0u8; len as usize];
            f.read_exact(&mut existing)?;
            let mut header = MAGIC.to_vec();
            header.push(VERSION);
            if !header.starts_with(&existing) {
                return Err(ProbeError::Format(format!("{}: not a journal", path.display())));
            }
            if len > 0 {
                warn!(path = %path.display(), len, "rewriting partial journal header");
            }
            f.set_len(0)?;
            f.seek(SeekFrom::Start(0))?;
            f.write_all(&header)?;
            f.flush()?;
            if sync_writes {
                f.sync_data()?;
            }
        } else {
            let mut header = [0u8; HEADER_LEN as usize];
            f.read_exact(&mut header)?;
            if &header[..MAGIC.len()] != MAGIC {
                return Err(ProbeError::Format(format!(
                    "{}: bad journal magic",
                    path.display()
                )));
            }
            let ver = header[MAGIC.len()];
            if ver != VERSION {
                return Err(ProbeError::Format(format!(
                    "{}: unsupported journal version {ver}",
                    path.display()
                )));
            }
        }

        // Seek to end for appends
        f.seek(SeekFrom::End(0))?;
        Ok(Self {
            f,
            path: path.to_path_buf(),
            sync_writes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a single record (length-delimited, checksummed). A failed append
    /// leaves the file as it was before the call.
    pub fn append(&mut self, rec: &LogRecord) -> Result<()> {
        let frame = encode_frame(rec)?;
        write_frame(&mut self.f, &frame, self.sync_writes)
    }

    /// Create an iterator starting after the header.
    pub fn iter(&mut self) -> Result<JournalIter<'_>> {
        self.f.flush()?;
        self.f.seek(SeekFrom::Start(HEADER_LEN))?;
        Ok(JournalIter {
            f: &mut self.f,
            good_end: HEADER_LEN,
        })
    }

    /// Read every intact record, cut off a torn tail, and leave the file positioned for appends.
    pub fn replay(&mut self) -> Result<Vec<LogRecord>> {
        let mut records = Vec::new();
        let good_end = {
            let mut it = self.iter()?;
            for rec in &mut it {
                records.push(rec?);
            }
            it.good_end
        };
        let len = self.f.metadata()?.len();
        if len > good_end {
            warn!(
                path = %self.path.display(),
                dropped = len - good_end,
                "truncating torn journal tail"
            );
            self.f.set_len(good_end)?;
        }
        self.f.seek(SeekFrom::End(0))?;
        debug!(path = %self.path.display(), records = records.len(), "journal replayed");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<LogRecord> {
        vec![
            LogRecord::PutFile(FileRecord::new(1, "a.txt")),
            LogRecord::SetStatus {
                file_id: 1,
                status: FileStatus::ReadyForAnalysis,
            },
        ]
    }

    #[test]
    fn replays_appended_records_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("case.journal");
        {
            let mut j = Journal::open(&path, false).unwrap();
            for rec in sample() {
                j.append(&rec).unwrap();
            }
        }
        let mut j = Journal::open(&path, false).unwrap();
        assert_eq!(j.replay().unwrap(), sample());
    }

    #[test]
    fn torn_tail_is_dropped_and_appends_continue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("case.journal");
        {
            let mut j = Journal::open(&path, false).unwrap();
            for rec in sample() {
                j.append(&rec).unwrap();
            }
        }
        let full = std::fs::metadata(&path).unwrap().len();
        let f = OpenOptions::new().write(true).open(&path).unwrap();
        f.set_len(full - 5).unwrap();
        drop(f);

        let mut j = Journal::open(&path, false).unwrap();
        assert_eq!(j.replay().unwrap(), sample()[..1].to_vec());
        let extra = LogRecord::PutFile(FileRecord::new(2, "b"));
        j.append(&extra).unwrap();
        drop(j);

        let mut j = Journal::open(&path, false).unwrap();
        assert_eq!(j.replay().unwrap(), vec![sample()[0].clone(), extra]);
    }

    #[test]
    fn corrupted_payload_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("case.journal");
        {
            let mut j = Journal::open(&path, false).unwrap();
            j.append(&sample()[0]).unwrap();
        }
        let mut bytes = std::fs::read(&path).unwrap();
        let mid = HEADER_LEN as usize + 4;
        bytes[mid] ^= 0xff;
        std::fs::write(&path, bytes).unwrap();

        let mut j = Journal::open(&path, false).unwrap();
        assert!(matches!(j.replay(), Err(ProbeError::Format(_))));
    }

    #[test]
    fn foreign_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello, this is not a journal").unwrap();
        assert!(matches!(Journal::open(&path, false), Err(ProbeError::Format(_))));
    }

    fn append_raw(path: &Path, bytes: &[u8]) {
        let mut f = OpenOptions::new().append(true).open(path).unwrap();
        f.write_all(bytes).unwrap();
    }

    #[test]
    fn oversized_length_prefix_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("case.journal");
        {
            let mut j = Journal::open(&path, false).unwrap();
            j.append(&sample()[0]).unwrap();
        }
        let mut garbage = Vec::new();
        put_uvarint(&mut garbage, u64::MAX);
        garbage.extend_from_slice(&[0u8; 40]);
        append_raw(&path, &garbage);

        let mut j = Journal::open(&path, false).unwrap();
        assert!(matches!(j.replay(), Err(ProbeError::Format(_))));
    }

    #[test]
    fn length_past_end_of_file_is_a_torn_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("case.journal");
        {
            let mut j = Journal::open(&path, false).unwrap();
            j.append(&sample()[0]).unwrap();
        }
        let mut partial = Vec::new();
        put_uvarint(&mut partial, 1000);
        partial.extend_from_slice(&[0u8; 40]);
        append_raw(&path, &partial);

        let mut j = Journal::open(&path, false).unwrap();
        assert_eq!(j.replay().unwrap(), sample()[..1].to_vec());
    }

    /// A file that accepts at most `room` bytes, then fails mid-write.
    struct ShortDisk {
        inner: std::io::Cursor<Vec<u8>>,
        room: usize,
    }

    impl Write for ShortDisk {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let used = self.inner.position() as usize;
            let free = self.room.saturating_sub(used);
            if free == 0 {
                return Err(std::io::Error::other("no space left on device"));
            }
            let n = buf.len().min(free);
            self.inner.write(&buf[..n])
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Seek for ShortDisk {
        fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    impl FrameFile for ShortDisk {
        fn truncate_to(&mut self, len: u64) -> std::io::Result<()> {
            self.inner.get_mut().truncate(len as usize);
            Ok(())
        }

        fn sync(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_append_rolls_back_its_partial_frame() {
        let mut header = MAGIC.to_vec();
        header.push(VERSION);
        let mut disk = ShortDisk {
            inner: std::io::Cursor::new(header),
            room: usize::MAX,
        };
        disk.seek(SeekFrom::End(0)).unwrap();

        let first = LogRecord::PutFile(FileRecord::new(1, "a.txt"));
        let lost = LogRecord::PutFile(FileRecord::new(2, "b.txt"));
        let after = LogRecord::SetStatus {
            file_id: 1,
            status: FileStatus::AnalysisComplete,
        };

        write_frame(&mut disk, &encode_frame(&first).unwrap(), true).unwrap();
        let committed = disk.inner.get_ref().len();

        disk.room = committed + 6;
        assert!(matches!(
            write_frame(&mut disk, &encode_frame(&lost).unwrap(), false),
            Err(ProbeError::Io(_))
        ));
        assert_eq!(disk.inner.get_ref().len(), committed);
        assert_eq!(disk.inner.position() as usize, committed);

        disk.room = usize::MAX;
        write_frame(&mut disk, &encode_frame(&after).unwrap(), false).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("case.journal");
        std::fs::write(&path, disk.inner.get_ref()).unwrap();
        let mut j = Journal::open(&path, false).unwrap();
        assert_eq!(j.replay().unwrap(), vec![first, after]);
    }

    #[test]
    fn partial_header_is_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("case.journal");
        std::fs::write(&path, &MAGIC[..4]).unwrap();
        {
            let mut j = Journal::open(&path, true).unwrap();
            assert!(j.replay().unwrap().is_empty());
            j.append(&sample()[0]).unwrap();
        }
        let mut j = Journal::open(&path, false).unwrap();
        assert_eq!(j.replay().unwrap(), sample()[..1].to_vec());
    }

    #[test]
    fn short_foreign_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hi").unwrap();
        assert!(matches!(Journal::open(&path, false), Err(ProbeError::Format(_))));
        assert_eq!(std::fs::read(&path).unwrap(), b"hi");
    }

    #[test]
    fn second_open_is_refused_while_the_first_is_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("case.journal");
        let first = Journal::open(&path, false).unwrap();
        assert!(matches!(Journal::open(&path, false), Err(ProbeError::Locked(_))));
        drop(first);
        Journal::open(&path, false).unwrap();
    }
}
