use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "probedev CLI (alpha)", long_about = None)]
pub struct Cli {
    /// Journal holding the file and artifact tables
    #[arg(long, global = true, default_value = "image.journal")]
    pub journal: PathBuf,

    /// fsync the journal after every write
    #[arg(long, global = true)]
    pub sync: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add (or replace) a file record, as an image loader would
    AddFile {
        id: u64,
        name: String,
        #[arg(long, default_value_t = 0)]
        parent: u64,
        #[arg(long, default_value_t = 0)]
        size: u64,
        /// 0=fs, 1=carved, 2=derived
        #[arg(long = "type", default_value_t = 0)]
        type_id: i32,
        #[arg(long, default_value = "")]
        path: String,
        #[arg(long, default_value_t = 0)]
        mtime: i32,
    },

    /// Print a file record
    Show { id: u64 },

    /// Record a content hash for a file
    Hash {
        id: u64,
        /// md5, sha1, sha2_256 or sha2_512
        kind: String,
        digest: String,
    },

    /// Move a file to another pipeline stage
    Status {
        id: u64,
        /// unknown, created, ready, in-progress, complete, failed, skipped
        status: String,
    },

    /// List artifacts of a file, or run a raw filter over all artifacts
    Artifacts {
        id: Option<u64>,
        /// type name (e.g. TSK_KEYWORD_HIT) or numeric type id
        #[arg(long = "type")]
        type_sel: Option<String>,
        /// raw filter, e.g. "WHERE artifact_type_id = 9"
        #[arg(long = "where", conflicts_with_all = ["id", "type_sel"])]
        filter: Option<String>,
    },

    /// Create an artifact of the given type for a file
    NewArtifact {
        id: u64,
        /// type name or numeric type id
        type_sel: String,
    },

    /// Show (creating if needed) the general-info artifact, optionally adding a text attribute
    Geninfo {
        id: u64,
        /// attribute type id for --text
        #[arg(long, requires = "text")]
        attr_type: Option<i32>,
        #[arg(long, requires = "attr_type")]
        text: Option<String>,
        #[arg(long, default_value = "probedev")]
        module: String,
    },

    /// Table counters
    Stats,
}
