#![allow(dead_code)]

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use upsync::{
    config::{FsConfig, ProviderConfig},
    CacheDescriptor, Config, LocalNode, Plan, RemoteNode,
};
use upsyncd::{
    local::LocalTree,
    service::{DryRun, Service},
    storage::CacheStorage,
    upload::NoProgress,
};

use crate::{
    dataset::{Dataset, Patch},
    stubs::mem::Stub,
    utils,
};

/// A local tree in a temporary directory, synchronized to an in-memory stub
pub struct Harness {
    pub root: Utf8PathBuf,
    pub stub: Stub,
    pub config: Config,
}

impl Harness {
    pub async fn new(dataset: Dataset, hashes: bool) -> Self {
        let root = utils::temp_path(Some("upsync-local"), None);
        tokio::fs::create_dir(&root).await.unwrap();
        dataset.create_fs(&root).await;

        // never used to reach a backend
        let config = Config::new(ProviderConfig::Fs(FsConfig {
            root: "/nonexistent".into(),
        }));

        Self {
            root,
            stub: Stub::new(hashes),
            config,
        }
    }

    pub fn cache_file(&self) -> &str {
        &self.config.cache_file
    }

    /// A fresh provider and service, as built by a new process
    pub fn service(&self) -> (Service, Arc<CacheStorage<Stub>>) {
        let provider = Arc::new(CacheStorage::new(
            self.stub.clone(),
            self.config.cache_file.clone(),
        ));
        let service = Service::with_provider(&self.config, &self.root, provider.clone()).unwrap();
        (service, provider)
    }

    pub async fn sync(&self) -> upsync::Result<Plan> {
        let (service, _) = self.service();
        service.sync(&NoProgress).await
    }

    pub async fn dry_run(&self) -> upsync::Result<DryRun> {
        let (service, _) = self.service();
        service.dry_run().await
    }

    pub async fn patch(&self, patch: Patch) {
        patch.apply(&self.root).await;
    }

    pub async fn local_tree(&self) -> LocalNode {
        LocalTree::new(&self.root)
            .unwrap()
            .with_ignore(self.config.ignore_patterns().unwrap())
            .read()
            .await
            .unwrap()
    }

    /// The tree held by the cache descriptor of the stub, if any
    pub fn cached_tree(&self) -> Option<RemoteNode> {
        let file = self.stub.file(self.cache_file())?;
        Some(CacheDescriptor::parse(&file.content).unwrap())
    }

    pub fn local_content(&self, path: &str) -> Vec<u8> {
        std::fs::read(self.root.join(path)).unwrap()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

/// A local tree synchronized to a local directory through the real backend
pub struct FsHarness {
    pub root: Utf8PathBuf,
    pub target: Utf8PathBuf,
    pub config: Config,
}

impl FsHarness {
    pub async fn new(dataset: Dataset) -> Self {
        let root = utils::temp_path(Some("upsync-local"), None);
        tokio::fs::create_dir(&root).await.unwrap();
        dataset.create_fs(&root).await;

        let target = utils::temp_path(Some("upsync-target"), None);
        let config = Config::new(ProviderConfig::Fs(FsConfig {
            root: target.clone(),
        }));
        Self {
            root,
            target,
            config,
        }
    }

    pub fn with_trust_mtime(mut self, trust_mtime: bool) -> Self {
        self.config.trust_mtime = trust_mtime;
        self
    }

    pub async fn sync(&self) -> upsync::Result<Plan> {
        let service = Service::new(&self.config, &self.root)?;
        service.sync(&NoProgress).await
    }

    pub async fn patch(&self, patch: Patch) {
        patch.apply(&self.root).await;
    }

    pub fn cache_path(&self) -> Utf8PathBuf {
        self.target.join(&self.config.cache_file)
    }

    pub async fn target_files(&self) -> Vec<String> {
        utils::file_paths(&self.target)
            .await
            .into_iter()
            .filter(|p| p != &self.config.cache_file)
            .collect()
    }

    pub fn same_content(&self, path: &str) -> bool {
        let local = std::fs::read(self.root.join(path)).unwrap();
        let target = std::fs::read(self.target.join(path)).unwrap();
        local == target
    }

    pub fn target(&self) -> &Utf8Path {
        &self.target
    }
}

impl Drop for FsHarness {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
        let _ = std::fs::remove_dir_all(&self.target);
    }
}
