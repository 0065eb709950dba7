// probe_core/src/domain.rs
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ProbeError, Result};

#[allow(non_camel_case_types)]
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HashKind {
    Md5,
    Sha1,
    Sha2_256,
    Sha2_512,
}

impl HashKind {
    pub const ALL: [HashKind; 4] = [
        HashKind::Md5,
        HashKind::Sha1,
        HashKind::Sha2_256,
        HashKind::Sha2_512,
    ];

    /// Column name the file table keeps this digest under.
    pub fn column(self) -> &'static str {
        match self {
            HashKind::Md5 => "md5",
            HashKind::Sha1 => "sha1",
            HashKind::Sha2_256 => "sha2_256",
            HashKind::Sha2_512 => "sha2_512",
        }
    }

    /// Raw digest length in bytes.
    pub fn digest_len(self) -> usize {
        match self {
            HashKind::Md5 => 16,
            HashKind::Sha1 => 20,
            HashKind::Sha2_256 => 32,
            HashKind::Sha2_512 => 64,
        }
    }
}

impl fmt::Display for HashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for HashKind {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "md5" => Ok(HashKind::Md5),
            "sha1" => Ok(HashKind::Sha1),
            "sha2_256" | "sha256" => Ok(HashKind::Sha2_256),
            "sha2_512" | "sha512" => Ok(HashKind::Sha2_512),
            _ => Err(ProbeError::InvalidHashKind(s.to_string())),
        }
    }
}

/// Hex digests per hash kind; an empty string means "not computed yet".
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct FileHashes {
    pub md5: String,
    pub sha1: String,
    pub sha2_256: String,
    pub sha2_512: String,
}

impl FileHashes {
    pub fn get(&self, kind: HashKind) -> &str {
        match kind {
            HashKind::Md5 => &self.md5,
            HashKind::Sha1 => &self.sha1,
            HashKind::Sha2_256 => &self.sha2_256,
            HashKind::Sha2_512 => &self.sha2_512,
        }
    }

    pub fn set(&mut self, kind: HashKind, digest: &str) {
        let slot = match kind {
            HashKind::Md5 => &mut self.md5,
            HashKind::Sha1 => &mut self.sha1,
            HashKind::Sha2_256 => &mut self.sha2_256,
            HashKind::Sha2_512 => &mut self.sha2_512,
        };
        *slot = digest.to_string();
    }
}

/// Processing stage of a file in the analysis pipeline (not filesystem allocation state).
#[derive(Serialize, Deserialize, Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum FileStatus {
    #[default]
    Unknown,
    Created,
    ReadyForAnalysis,
    AnalysisInProgress,
    AnalysisComplete,
    AnalysisFailed,
    AnalysisSkipped,
}

impl FileStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FileStatus::Unknown => "unknown",
            FileStatus::Created => "created",
            FileStatus::ReadyForAnalysis => "ready",
            FileStatus::AnalysisInProgress => "in-progress",
            FileStatus::AnalysisComplete => "complete",
            FileStatus::AnalysisFailed => "failed",
            FileStatus::AnalysisSkipped => "skipped",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileStatus {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self> {
        let status = match s.trim().to_ascii_lowercase().as_str() {
            "unknown" => FileStatus::Unknown,
            "created" => FileStatus::Created,
            "ready" => FileStatus::ReadyForAnalysis,
            "in-progress" => FileStatus::AnalysisInProgress,
            "complete" => FileStatus::AnalysisComplete,
            "failed" => FileStatus::AnalysisFailed,
            "skipped" => FileStatus::AnalysisSkipped,
            _ => return Err(ProbeError::InvalidStatus(s.to_string())),
        };
        Ok(status)
    }
}

/// Where a file's content came from.
#[repr(i32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FileType {
    Fs = 0,
    Carved = 1,
    Derived = 2,
    Unused = 3,
}

impl FileType {
    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            0 => Some(FileType::Fs),
            1 => Some(FileType::Carved),
            2 => Some(FileType::Derived),
            3 => Some(FileType::Unused),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct FileRecord {
    pub id: u64,
    pub type_id: i32,
    pub name: String,
    pub parent_file_id: u64,
    pub dir_type: i32,
    pub meta_type: i32,
    pub dir_flags: i32,
    pub meta_flags: i32,
    pub size: u64,
    pub ctime: i32,
    pub crtime: i32,
    pub atime: i32,
    pub mtime: i32,
    pub mode: i32,
    pub uid: i32,
    pub gid: i32,
    pub status: FileStatus,
    pub full_path: String,
    pub hashes: FileHashes,
}

impl FileRecord {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn file_type(&self) -> Option<FileType> {
        FileType::from_id(self.type_id)
    }
}

#[repr(i32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArtifactType {
    GenInfo = 1,
    WebBookmark = 2,
    WebCookie = 3,
    WebHistory = 4,
    WebDownload = 5,
    RecentObject = 6,
    TrackPoint = 7,
    InstalledProg = 8,
    KeywordHit = 9,
    HashsetHit = 10,
    DeviceAttached = 11,
    InterestingFile = 12,
}

impl ArtifactType {
    pub const ALL: [ArtifactType; 12] = [
        ArtifactType::GenInfo,
        ArtifactType::WebBookmark,
        ArtifactType::WebCookie,
        ArtifactType::WebHistory,
        ArtifactType::WebDownload,
        ArtifactType::RecentObject,
        ArtifactType::TrackPoint,
        ArtifactType::InstalledProg,
        ArtifactType::KeywordHit,
        ArtifactType::HashsetHit,
        ArtifactType::DeviceAttached,
        ArtifactType::InterestingFile,
    ];

    pub fn id(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            ArtifactType::GenInfo => "TSK_GEN_INFO",
            ArtifactType::WebBookmark => "TSK_WEB_BOOKMARK",
            ArtifactType::WebCookie => "TSK_WEB_COOKIE",
            ArtifactType::WebHistory => "TSK_WEB_HISTORY",
            ArtifactType::WebDownload => "TSK_WEB_DOWNLOAD",
            ArtifactType::RecentObject => "TSK_RECENT_OBJECT",
            ArtifactType::TrackPoint => "TSK_TRACKPOINT",
            ArtifactType::InstalledProg => "TSK_INSTALLED_PROG",
            ArtifactType::KeywordHit => "TSK_KEYWORD_HIT",
            ArtifactType::HashsetHit => "TSK_HASHSET_HIT",
            ArtifactType::DeviceAttached => "TSK_DEVICE_ATTACHED",
            ArtifactType::InterestingFile => "TSK_INTERESTING_FILE_HIT",
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.id() == id)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Display name for any type id, including ones outside the built-in set.
    pub fn label_for(id: i32) -> String {
        match Self::from_id(id) {
            Some(t) => t.name().to_string(),
            None => format!("custom:{id}"),
        }
    }
}

/// Picks artifacts by type id, type name, or a built-in type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeSelector {
    Id(i32),
    Name(String),
    Known(ArtifactType),
}

impl TypeSelector {
    /// `(type_id, type_name)` a new artifact of this selector gets.
    pub fn resolve(&self) -> Result<(i32, String)> {
        match self {
            TypeSelector::Id(id) => Ok((*id, ArtifactType::label_for(*id))),
            TypeSelector::Known(t) => Ok((t.id(), t.name().to_string())),
            TypeSelector::Name(name) => ArtifactType::from_name(name)
                .map(|t| (t.id(), t.name().to_string()))
                .ok_or_else(|| ProbeError::UnknownArtifactType(name.clone())),
        }
    }

    pub fn matches(&self, artifact: &Artifact) -> bool {
        match self {
            TypeSelector::Id(id) => artifact.type_id == *id,
            TypeSelector::Known(t) => artifact.type_id == t.id(),
            TypeSelector::Name(name) => artifact.type_name == *name,
        }
    }
}

impl From<i32> for TypeSelector {
    fn from(id: i32) -> Self {
        TypeSelector::Id(id)
    }
}

impl From<ArtifactType> for TypeSelector {
    fn from(t: ArtifactType) -> Self {
        TypeSelector::Known(t)
    }
}

impl From<&str> for TypeSelector {
    fn from(name: &str) -> Self {
        TypeSelector::Name(name.to_string())
    }
}

impl From<String> for TypeSelector {
    fn from(name: String) -> Self {
        TypeSelector::Name(name)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum AttributeValue {
    Text(String),
    Int(i32),
    Long(i64),
    Double(f64),
    Bytes(Vec<u8>),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Text(s) => f.write_str(s),
            AttributeValue::Int(v) => write!(f, "{v}"),
            AttributeValue::Long(v) => write!(f, "{v}"),
            AttributeValue::Double(v) => write!(f, "{v}"),
            AttributeValue::Bytes(b) => f.write_str(&hex::encode(b)),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Attribute {
    pub type_id: i32,
    pub module: String,
    pub context: String,
    pub value: AttributeValue,
}

impl Attribute {
    pub fn new(type_id: i32, module: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            type_id,
            module: module.into(),
            context: String::new(),
            value,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Artifact {
    pub artifact_id: u64,
    pub file_id: u64,
    pub type_id: i32,
    pub type_name: String,
    pub attributes: Vec<Attribute>,
}
