use async_trait::async_trait;
use camino::Utf8Path;
use upsync::{FileInfo, LocalNode, RemoteNode, UploadTask};

/// File equality predicate used by the diff engine
pub trait CompareFile {
    /// Whether the `remote` file can be kept as is for the local file
    /// at `rel_path`.
    fn compare_file(&self, remote: &FileInfo, local: &FileInfo, rel_path: &str) -> bool {
        let _ = rel_path;
        compare_hash(remote, local)
    }
}

/// Hash equality. An empty remote hash means unknown content and never
/// compares equal.
pub fn compare_hash(remote: &FileInfo, local: &FileInfo) -> bool {
    remote.has_hash() && remote.hash == local.hash
}

/// Size and modification time equality, for backends that can't report
/// a content hash. Hash equality is used when the remote hash is known.
/// The remote copy is considered current if it isn't older than the
/// local file.
pub fn compare_mtime(remote: &FileInfo, local: &FileInfo) -> bool {
    use std::cmp::Ordering;

    if remote.has_hash() {
        return compare_hash(remote, local);
    }
    match (remote.modified, local.modified) {
        (Some(rmt), Some(lmt)) if remote.length == local.length => {
            upsync::compare_mtime(rmt, lmt) != Ordering::Less
        }
        _ => false,
    }
}

/// The capability set of a synchronization target.
///
/// All operations take root-relative, slash separated paths.
/// Errors are not retried at this level.
#[async_trait]
pub trait Provider: CompareFile + Send + Sync {
    /// Human readable identifier, for logging
    fn name(&self) -> String;

    /// One time setup, before any other call
    async fn init(&self, local_root: &Utf8Path) -> upsync::Result<()>;

    /// The remote tree, from the cache descriptor when readable,
    /// from a live listing otherwise.
    async fn list_all(&self) -> upsync::Result<RemoteNode>;

    async fn delete_files(&self, paths: &[String]) -> upsync::Result<()>;

    async fn delete_directories(&self, paths: &[String]) -> upsync::Result<()>;

    async fn upload(&self, task: &UploadTask) -> upsync::Result<()>;

    /// Idempotent
    async fn make_directory(&self, path: &str) -> upsync::Result<()>;

    /// Identifiers of incomplete uploads left by previous runs
    async fn list_fragments(&self) -> upsync::Result<Vec<String>>;

    /// End of a successful run: rewrites the cache descriptor from `local`
    /// if anything was mutated, then releases resources.
    async fn cleanup(&self, local: &LocalNode) -> upsync::Result<()>;
}
