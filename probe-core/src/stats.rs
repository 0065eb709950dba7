use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub files: u64,
    pub artifacts: u64,
    pub attributes: u64,
    pub hash_updates: u64,
    pub status_updates: u64,
}
