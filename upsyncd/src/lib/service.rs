use std::sync::Arc;

use camino::Utf8Path;
use upsync::{headers::HeaderRules, Config, LocalNode, Node, Plan, UploadTask};

use crate::{
    diff::diff,
    local::LocalTree,
    storage::{self, CacheStorage},
    upload::{Progress, Scheduler},
    Provider,
};

/// Plan of a run, computed without mutating anything
#[derive(Debug, Clone)]
pub struct DryRun {
    pub plan: Plan,
    pub fragments: Vec<String>,
}

/// Drives a synchronization run
pub struct Service {
    provider: Arc<dyn Provider>,
    local: LocalTree,
    headers: HeaderRules,
    scheduler: Scheduler,
    cache_file: String,
    write_descriptors: bool,
}

impl Service {
    /// Build the service for the backend described by `config`.
    pub fn new<P>(config: &Config, local_root: P) -> upsync::Result<Self>
    where
        P: AsRef<Utf8Path>,
    {
        let storage = storage::create(&config.provider, config.trust_mtime)?;
        let provider = Arc::new(CacheStorage::new(storage, config.cache_file.clone()));
        Self::with_provider(config, local_root, provider)
    }

    pub fn with_provider<P>(
        config: &Config,
        local_root: P,
        provider: Arc<dyn Provider>,
    ) -> upsync::Result<Self>
    where
        P: AsRef<Utf8Path>,
    {
        config.check()?;
        let local = LocalTree::new(local_root)?.with_ignore(config.ignore_patterns()?);
        Ok(Self {
            provider,
            local,
            headers: config.header_rules()?,
            scheduler: Scheduler::new(config.workers),
            cache_file: config.cache_file.clone(),
            write_descriptors: config.write_descriptors,
        })
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn local(&self) -> &LocalTree {
        &self.local
    }

    /// Run the whole synchronization and return the executed plan.
    ///
    /// Any backend failure stops the run before the cache descriptor is
    /// rewritten.
    pub async fn sync(&self, progress: &dyn Progress) -> upsync::Result<Plan> {
        self.provider.init(self.local.root()).await?;

        if self.write_descriptors {
            self.local.write_descriptors().await?;
        }

        let local = self.read_local().await?;
        let remote = self.provider.list_all().await?;
        let plan = diff(&remote, &local, &*self.provider)?;
        log_plan(&plan);

        for fragment in self.provider.list_fragments().await? {
            log::info!("incomplete upload: {fragment}");
        }

        if !plan.obsolete_files.is_empty() {
            let files: Vec<String> = plan.obsolete_files.iter().cloned().collect();
            self.provider.delete_files(&files).await?;
        }
        if !plan.obsolete_directories.is_empty() {
            // children first
            let dirs: Vec<String> = plan.obsolete_directories.iter().rev().cloned().collect();
            self.provider.delete_directories(&dirs).await?;
        }
        // parents first
        for dir in &plan.new_directories {
            self.provider.make_directory(dir).await?;
        }

        let tasks = self.upload_tasks(&plan);
        self.scheduler
            .run(self.provider.clone(), tasks, progress)
            .await?;

        self.provider.cleanup(&local).await?;
        Ok(plan)
    }

    /// Compute the plan of a run, without mutating the remote side.
    pub async fn dry_run(&self) -> upsync::Result<DryRun> {
        let local = self.read_local().await?;
        let remote = self.provider.list_all().await?;
        let plan = diff(&remote, &local, &*self.provider)?;
        log_plan(&plan);
        let fragments = self.provider.list_fragments().await?;
        Ok(DryRun { plan, fragments })
    }

    fn upload_tasks(&self, plan: &Plan) -> Vec<UploadTask> {
        plan.new_files
            .iter()
            .map(|(path, info)| {
                UploadTask::new(self.local.root(), path, info)
                    .with_headers(self.headers.headers_for(path))
            })
            .collect()
    }

    /// The local tree, without any file shadowing the cache descriptor
    async fn read_local(&self) -> upsync::Result<LocalNode> {
        let tree = self.local.read().await?;
        if !tree.contains(&self.cache_file) {
            return Ok(tree);
        }
        log::warn!(
            "{} is reserved for the cache descriptor and won't be synchronized",
            self.local.root().join(&self.cache_file)
        );
        let children = tree
            .into_children()
            .into_iter()
            .filter(|c| c.name() != self.cache_file)
            .collect();
        Node::root(children)
    }
}

fn log_plan(plan: &Plan) {
    log::info!(
        "{} obsolete files, {} obsolete directories, {} new directories, {} new files ({} bytes)",
        plan.obsolete_files.len(),
        plan.obsolete_directories.len(),
        plan.new_directories.len(),
        plan.new_files.len(),
        plan.upload_length()
    );
}
