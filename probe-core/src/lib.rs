#![forbid(unsafe_code)]

pub mod digest;
pub mod domain;
pub mod error;
pub mod file;
pub mod journal;
pub mod query;
pub mod repo;
pub mod repo_journal;
pub mod services;
pub mod stats;

pub mod index {
    pub mod inmem;
}

// Re-exports: stable API surface
pub use domain::{
    Artifact, ArtifactType, Attribute, AttributeValue, FileRecord, FileStatus, HashKind,
    TypeSelector,
};
pub use file::ImageFile;
pub use index::inmem::MemStore;
pub use repo_journal::JournalStore;
pub use services::{Backend, OpenParams, Services, open_services};
