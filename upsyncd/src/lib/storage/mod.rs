use futures::{future, Future};
use upsync::{config::ProviderConfig, Node, UploadTask};

use crate::{provider::CompareFile, Shutdown};

pub mod bucket;
pub mod cache;
pub mod fs;
pub mod ftp;
pub mod op;
pub mod sftp;

pub use cache::CacheStorage;
pub use op::OpStorage;

/// Most backends reject batch deletions of more keys than this
pub const MAX_DELETE_BATCH: usize = 999;

pub trait Init {
    /// Connect and make sure the base path exists
    fn init(&self) -> impl Future<Output = upsync::Result<()>> + Send;
}

pub trait DirEntries {
    /// Entries of the directory at `dir`, `""` being the base path.
    /// Directories are returned without children.
    fn dir_entries(&self, dir: &str) -> impl Future<Output = upsync::Result<Vec<Node>>> + Send;
}

pub trait ReadFile {
    /// Whole content of the file at `path`, `None` if it doesn't exist.
    fn read_file(&self, path: &str) -> impl Future<Output = upsync::Result<Option<Vec<u8>>>> + Send;
}

pub trait WriteFile {
    fn write_file(&self, path: &str, data: Vec<u8>) -> impl Future<Output = upsync::Result<()>> + Send;
}

pub trait Upload {
    fn upload(&self, task: &UploadTask) -> impl Future<Output = upsync::Result<()>> + Send;
}

pub trait MkDir {
    /// Create the directory at `path`. Existing directories are not an error.
    fn mkdir(&self, path: &str) -> impl Future<Output = upsync::Result<()>> + Send;
}

/// A trait to delete files or folders
pub trait Delete {
    /// Deletes at most [`MAX_DELETE_BATCH`] files.
    /// Missing files are not an error.
    fn delete_files(&self, paths: &[String]) -> impl Future<Output = upsync::Result<()>> + Send;

    /// Deletes the folder at `path`, whose content was already deleted.
    fn delete_dir(&self, path: &str) -> impl Future<Output = upsync::Result<()>> + Send;
}

pub trait Fragments {
    /// Incomplete uploads left by previous runs
    fn fragments(&self) -> impl Future<Output = upsync::Result<Vec<String>>> + Send {
        future::ready(Ok(Vec::new()))
    }
}

/// A trait for path-based storage
pub trait Storage:
    Init
    + DirEntries
    + ReadFile
    + WriteFile
    + Upload
    + MkDir
    + Delete
    + Fragments
    + CompareFile
    + Shutdown
    + Send
    + Sync
    + 'static
{
    fn name(&self) -> String;
}

/// Build the backend described by `config`.
pub fn create(config: &ProviderConfig, trust_mtime: bool) -> upsync::Result<OpStorage> {
    let storage = match config {
        ProviderConfig::Bucket(config) => bucket::storage(config)?,
        ProviderConfig::Ftp(config) => ftp::storage(config)?,
        ProviderConfig::Sftp(config) => sftp::storage(config)?,
        ProviderConfig::Fs(config) => fs::storage(config)?,
    };
    Ok(storage.with_trust_mtime(trust_mtime))
}
