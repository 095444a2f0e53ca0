use camino::{Utf8Path, Utf8PathBuf};
use futures::{future::BoxFuture, StreamExt, TryStreamExt};
use tokio::fs;
use upsync::{config::PatternList, digest, io_error, CacheDescriptor, LocalNode, Node};

/// Number of entries of a directory read or hashed concurrently
const READ_CONCURRENCY: usize = 8;

/// Reader of the synchronization root
#[derive(Debug)]
pub struct LocalTree {
    root: Utf8PathBuf,
    ignore: PatternList,
}

impl LocalTree {
    /// Build a reader of the directory at `root`.
    /// Fails if `root` is not a directory.
    pub fn new<P>(root: P) -> upsync::Result<Self>
    where
        P: AsRef<Utf8Path>,
    {
        let root = root.as_ref();
        let root = root
            .canonicalize_utf8()
            .map_err(|err| io_error!("{root}: {err}"))?;
        if !root.is_dir() {
            upsync::io_bail!("{root} is not a directory");
        }
        log::debug!("local tree rooted at {root}");
        Ok(Self {
            root,
            ignore: PatternList::default(),
        })
    }

    pub fn with_ignore(mut self, ignore: PatternList) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Walk the whole tree, hashing every file.
    pub async fn read(&self) -> upsync::Result<LocalNode> {
        let children = self.read_children(Utf8PathBuf::new()).await?;
        Node::root(children)
    }

    /// Walk the sub-tree at `rel_path`.
    /// The returned node is named after the last component of `rel_path`.
    pub async fn read_dir(&self, rel_path: &Utf8Path) -> upsync::Result<LocalNode> {
        let name = rel_path.file_name().unwrap_or("");
        let children = self.read_children(rel_path.to_owned()).await?;
        Node::directory(name, children)
    }

    /// Write a `<name>.json` descriptor beside each top-level directory.
    /// Returns the paths written.
    pub async fn write_descriptors(&self) -> upsync::Result<Vec<Utf8PathBuf>> {
        let mut written = Vec::new();
        let root = &self.root;
        let mut read_dir = fs::read_dir(root)
            .await
            .map_err(|err| io_error!("{root}: {err}"))?;
        let mut dirs = Vec::new();
        while let Some(direntry) = read_dir
            .next_entry()
            .await
            .map_err(|err| io_error!("{root}: {err}"))?
        {
            let name = String::from_utf8(direntry.file_name().into_encoded_bytes())?;
            let metadata = direntry
                .metadata()
                .await
                .map_err(|err| io_error!("{root}/{name}: {err}"))?;
            if metadata.is_dir() && !self.ignore.matches_with(&name) {
                dirs.push(name);
            }
        }
        dirs.sort_unstable();

        for name in dirs {
            let node = self.read_dir(Utf8Path::new(&name)).await?;
            let path = self.root.join(format!("{name}.json"));
            log::info!("writing descriptor {path}");
            fs::write(&path, CacheDescriptor::to_bytes(&node)?)
                .await
                .map_err(|err| io_error!("{path}: {err}"))?;
            written.push(path);
        }
        Ok(written)
    }

    fn read_children(&self, rel_dir: Utf8PathBuf) -> BoxFuture<'_, upsync::Result<Vec<Node>>> {
        Box::pin(async move {
            let fs_dir = self.root.join(&rel_dir);
            log::trace!("listing entries of {fs_dir}");

            let mut names = Vec::new();
            let mut read_dir = fs::read_dir(&fs_dir)
                .await
                .map_err(|err| io_error!("{fs_dir}: {err}"))?;
            while let Some(direntry) = read_dir
                .next_entry()
                .await
                .map_err(|err| io_error!("{fs_dir}: {err}"))?
            {
                let name = String::from_utf8(direntry.file_name().into_encoded_bytes())?;
                let rel_path = rel_dir.join(&name);
                if self.ignore.matches_with(&rel_path) {
                    log::debug!("ignoring {rel_path}");
                    continue;
                }
                names.push(name);
            }
            names.sort_unstable();

            let children: Vec<Option<Node>> = futures::stream::iter(names)
                .map(|name| self.read_entry(rel_dir.clone(), name))
                .buffered(READ_CONCURRENCY)
                .try_collect()
                .await?;

            Ok(children.into_iter().flatten().collect())
        })
    }

    async fn read_entry(&self, rel_dir: Utf8PathBuf, name: String) -> upsync::Result<Option<Node>> {
        let rel_path = rel_dir.join(&name);
        let fs_path = self.root.join(&rel_path);
        // follows symlinks
        let metadata = fs::metadata(&fs_path)
            .await
            .map_err(|err| io_error!("{fs_path}: {err}"))?;

        if metadata.is_dir() {
            let children = self.read_children(rel_path).await?;
            Ok(Some(Node::directory(name, children)?))
        } else if metadata.is_file() {
            let info = digest::file_info(&fs_path).await?;
            Ok(Some(Node::file(name, info)))
        } else {
            log::warn!("skipping {rel_path}: neither a file nor a directory");
            Ok(None)
        }
    }
}
