use std::{cmp, collections::BTreeMap, collections::BTreeSet, time};

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};

pub mod config;
pub mod descriptor;
pub mod digest;
pub mod headers;

mod error;
mod tree;

pub use crate::config::Config;
pub use crate::descriptor::CacheDescriptor;
pub use crate::error::*;
pub use crate::headers::Headers;
pub use crate::tree::*;

pub const MTIME_TOL: time::Duration = time::Duration::from_secs(1);

pub fn compare_mtime(lhs: DateTime<Utc>, rhs: DateTime<Utc>) -> cmp::Ordering {
    if lhs + MTIME_TOL < rhs {
        cmp::Ordering::Less
    } else if lhs - MTIME_TOL > rhs {
        cmp::Ordering::Greater
    } else {
        cmp::Ordering::Equal
    }
}

/// Actions reconciling a remote tree with the local tree.
///
/// Paths are relative to the synchronization root and slash separated.
/// The lexicographic order of the sets lists parent directories before
/// their children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub obsolete_files: BTreeSet<String>,
    pub obsolete_directories: BTreeSet<String>,
    pub new_files: BTreeMap<String, FileInfo>,
    pub new_directories: BTreeSet<String>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.obsolete_files.is_empty()
            && self.obsolete_directories.is_empty()
            && self.new_files.is_empty()
            && self.new_directories.is_empty()
    }

    /// Bytes to upload
    pub fn upload_length(&self) -> u64 {
        self.new_files.values().map(|f| f.length).sum()
    }
}

/// One file to upload, produced from [`Plan::new_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    pub remote_path: String,
    pub local_path: Utf8PathBuf,
    pub base_dir: Utf8PathBuf,
    pub length: u64,
    pub hash: String,
    pub headers: Headers,
}

impl UploadTask {
    pub fn new(base_dir: &camino::Utf8Path, remote_path: &str, info: &FileInfo) -> Self {
        Self {
            remote_path: remote_path.to_string(),
            local_path: base_dir.join(remote_path),
            base_dir: base_dir.to_owned(),
            length: info.length,
            hash: info.hash.clone(),
            headers: Headers::new(),
        }
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }
}
