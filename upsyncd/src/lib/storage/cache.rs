use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use camino::Utf8Path;
use futures::future::BoxFuture;
use tokio::task::JoinSet;
use upsync::{CacheDescriptor, FileInfo, LocalNode, Node, RemoteNode, UploadTask};

use super::{
    Delete, DirEntries, Fragments, Init, MkDir, ReadFile, Storage, Upload, WriteFile,
    MAX_DELETE_BATCH,
};
use crate::{join_path, provider::CompareFile, Provider, Shutdown};

/// A [`Provider`] over a storage backend.
///
/// The remote tree is read from a descriptor stored beside the synchronized
/// files, and only listed when the descriptor is missing or unreadable.
/// The descriptor is rewritten on cleanup if anything was mutated.
#[derive(Debug)]
pub struct CacheStorage<S> {
    storage: Arc<S>,
    cache_file: String,
    mutated: AtomicBool,
}

impl<S> CacheStorage<S>
where
    S: Storage,
{
    pub fn new(storage: S, cache_file: impl Into<String>) -> Self {
        Self {
            storage: Arc::new(storage),
            cache_file: cache_file.into(),
            mutated: AtomicBool::new(false),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn cache_file(&self) -> &str {
        &self.cache_file
    }

    /// Whether a mutating call was issued since creation
    pub fn is_mutated(&self) -> bool {
        self.mutated.load(Ordering::Acquire)
    }

    fn set_mutated(&self) {
        self.mutated.store(true, Ordering::Release);
    }

    /// Read the remote tree from the descriptor.
    /// Any failure is reported as [`upsync::Error::Cache`].
    pub async fn load_cache(&self) -> upsync::Result<RemoteNode> {
        let bytes = self
            .storage
            .read_file(&self.cache_file)
            .await
            .map_err(|err| upsync::cache_error!("reading {}: {err}", self.cache_file))?
            .ok_or_else(|| upsync::cache_error!("{} not found", self.cache_file))?;
        CacheDescriptor::parse(&bytes)
    }

    /// Read the remote tree from a full listing.
    pub async fn populate_from_entries(&self) -> upsync::Result<RemoteNode> {
        let children = populate_recurse(String::new(), self.storage.clone()).await?;
        let children = children
            .into_iter()
            .filter(|c| c.name() != self.cache_file)
            .collect();
        Node::root(children)
    }
}

fn populate_recurse<S>(dir: String, storage: Arc<S>) -> BoxFuture<'static, upsync::Result<Vec<Node>>>
where
    S: DirEntries + Send + Sync + 'static,
{
    Box::pin(async move {
        let entries = storage.dir_entries(&dir).await?;

        let mut children = Vec::with_capacity(entries.len());
        let mut set = JoinSet::new();

        for entry in entries {
            if entry.is_file() {
                children.push(entry);
                continue;
            }
            let storage = storage.clone();
            let path = join_path(&dir, entry.name());
            set.spawn(async move {
                let grand_children = populate_recurse(path, storage).await?;
                Node::directory(entry.name(), grand_children)
            });
        }

        while let Some(res) = set.join_next().await {
            let node = res.map_err(|err| upsync::other_error!("listing task failed: {err}"))??;
            children.push(node);
        }
        children.sort_unstable_by(|a, b| a.name().cmp(b.name()));
        Ok(children)
    })
}

impl<S> CompareFile for CacheStorage<S>
where
    S: Storage,
{
    fn compare_file(&self, remote: &FileInfo, local: &FileInfo, rel_path: &str) -> bool {
        self.storage.compare_file(remote, local, rel_path)
    }
}

#[async_trait]
impl<S> Provider for CacheStorage<S>
where
    S: Storage,
{
    fn name(&self) -> String {
        self.storage.name()
    }

    async fn init(&self, local_root: &Utf8Path) -> upsync::Result<()> {
        log::info!("synchronizing {local_root} to {}", self.storage.name());
        self.storage.init().await
    }

    async fn list_all(&self) -> upsync::Result<RemoteNode> {
        match self.load_cache().await {
            Ok(tree) => {
                log::info!("remote state read from {}", self.cache_file);
                Ok(tree)
            }
            Err(err) => {
                log::info!("{err}, listing {}", self.storage.name());
                self.populate_from_entries().await
            }
        }
    }

    async fn delete_files(&self, paths: &[String]) -> upsync::Result<()> {
        for chunk in paths.chunks(MAX_DELETE_BATCH) {
            for path in chunk {
                log::info!("delete {path}");
            }
            self.set_mutated();
            self.storage.delete_files(chunk).await?;
        }
        Ok(())
    }

    async fn delete_directories(&self, paths: &[String]) -> upsync::Result<()> {
        for path in paths {
            log::info!("rmdir {path}");
            self.set_mutated();
            self.storage.delete_dir(path).await?;
        }
        Ok(())
    }

    async fn upload(&self, task: &UploadTask) -> upsync::Result<()> {
        log::info!("upload {}", task.remote_path);
        self.set_mutated();
        self.storage.upload(task).await
    }

    async fn make_directory(&self, path: &str) -> upsync::Result<()> {
        log::info!("mkdir {path}");
        self.set_mutated();
        self.storage.mkdir(path).await
    }

    async fn list_fragments(&self) -> upsync::Result<Vec<String>> {
        self.storage.fragments().await
    }

    async fn cleanup(&self, local: &LocalNode) -> upsync::Result<()> {
        if self.is_mutated() {
            let bytes = CacheDescriptor::to_bytes(local)?;
            log::info!("rewriting {}", self.cache_file);
            // missing files are not an error
            self.storage
                .delete_files(std::slice::from_ref(&self.cache_file))
                .await?;
            self.storage.write_file(&self.cache_file, bytes).await?;
        } else {
            log::info!("nothing changed, {} left untouched", self.cache_file);
        }
        self.storage.shutdown().await
    }
}
