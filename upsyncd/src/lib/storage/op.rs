//! Storage over an [`opendal::Operator`], shared by every backend.

use std::{collections::HashSet, time::Duration};

use futures::TryStreamExt;
use opendal::{layers::TimeoutLayer, EntryMode, ErrorKind, Metadata, Metakey, Operator};
use tokio::io::AsyncReadExt;
use upsync::{io_error, provider_error, FileInfo, Node, UploadTask};

use super::bucket::{MultipartUploads, ObjectProps, HASH_KEY};
use crate::{
    provider::{compare_hash, compare_mtime, CompareFile},
    Shutdown,
};

const OP_TIMEOUT: Duration = Duration::from_secs(120);
const IO_TIMEOUT: Duration = Duration::from_secs(30);
const UPLOAD_CHUNK: usize = 8 * 1024 * 1024;
const READ_BUF: usize = 256 * 1024;

/// Backend family, driving the few behaviours that differ between them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    /// Object storage: no real directories, hash kept in user metadata
    Bucket,
    Ftp,
    Sftp,
    Fs,
}

impl Flavor {
    pub fn has_directories(self) -> bool {
        !matches!(self, Flavor::Bucket)
    }

    pub fn stores_hash(self) -> bool {
        matches!(self, Flavor::Bucket)
    }
}

#[derive(Debug, Clone)]
pub struct OpStorage {
    op: Operator,
    flavor: Flavor,
    name: String,
    trust_mtime: bool,
    uploads: Option<MultipartUploads>,
}

impl OpStorage {
    pub(super) fn new<B>(builder: B, flavor: Flavor, name: String) -> upsync::Result<Self>
    where
        B: opendal::Builder,
    {
        let op = Operator::new(builder)
            .map_err(|err| provider_error!("connect", name, "{err}"))?
            .layer(
                TimeoutLayer::default()
                    .with_timeout(OP_TIMEOUT)
                    .with_io_timeout(IO_TIMEOUT),
            )
            .finish();
        Ok(Self {
            op,
            flavor,
            name,
            trust_mtime: false,
            uploads: None,
        })
    }

    pub(super) fn with_uploads(mut self, uploads: MultipartUploads) -> Self {
        self.uploads = Some(uploads);
        self
    }

    /// Compare files by size and modification time when no hash is known.
    /// Ignored by object storage, which always reports hashes it was given.
    pub fn with_trust_mtime(mut self, trust_mtime: bool) -> Self {
        self.trust_mtime = trust_mtime && !self.flavor.stores_hash();
        self
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    async fn file_info(&self, path: &str, meta: &Metadata) -> upsync::Result<FileInfo> {
        let hash = if self.flavor.stores_hash() {
            // listings don't carry user metadata
            let meta = self
                .op
                .stat(path)
                .await
                .map_err(|err| provider_error!("stat", path, "{err}"))?;
            meta.user_metadata()
                .and_then(|md| md.get(HASH_KEY))
                .cloned()
                .unwrap_or_default()
        } else {
            String::new()
        };
        Ok(FileInfo::new(meta.content_length(), hash).with_modified(meta.last_modified()))
    }

    async fn write_stream(&self, task: &UploadTask) -> upsync::Result<()> {
        let path = task.remote_path.as_str();

        let mut writer = self.op.writer_with(path).chunk(UPLOAD_CHUNK);
        if self.flavor == Flavor::Bucket {
            let props = ObjectProps::from_task(task);
            if let Some(ct) = &props.content_type {
                writer = writer.content_type(ct);
            }
            if let Some(cc) = &props.cache_control {
                writer = writer.cache_control(cc);
            }
            if let Some(cd) = &props.content_disposition {
                writer = writer.content_disposition(cd);
            }
            writer = writer.user_metadata(props.user_metadata);
        }
        let mut writer = writer
            .await
            .map_err(|err| provider_error!("upload", path, "{err}"))?;

        let local = &task.local_path;
        let mut file = tokio::fs::File::open(local)
            .await
            .map_err(|err| io_error!("{local}: {err}"))?;
        let mut buf = vec![0u8; READ_BUF];
        let res: upsync::Result<()> = async {
            loop {
                let n = file
                    .read(&mut buf)
                    .await
                    .map_err(|err| io_error!("{local}: {err}"))?;
                if n == 0 {
                    break;
                }
                writer
                    .write(buf[..n].to_vec())
                    .await
                    .map_err(|err| provider_error!("upload", path, "{err}"))?;
            }
            Ok(())
        }
        .await;

        if let Err(err) = res {
            if let Err(abort_err) = writer.abort().await {
                log::warn!("could not abort upload of {path}: {abort_err}");
            }
            return Err(err);
        }
        writer
            .close()
            .await
            .map_err(|err| provider_error!("upload", path, "{err}"))?;
        Ok(())
    }
}

/// Operator path of the directory at root-relative `path`
fn dir_path(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        format!("{path}/")
    }
}

impl super::Init for OpStorage {
    async fn init(&self) -> upsync::Result<()> {
        if !self.flavor.has_directories() {
            log::debug!("{}: nothing to initialize", self.name);
            return Ok(());
        }
        match self.op.stat("/").await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                log::info!("{}: creating base path", self.name);
                self.op
                    .create_dir("/")
                    .await
                    .map_err(|err| provider_error!("init", "/", "{err}"))
            }
            Err(err) => Err(provider_error!("init", "/", "{err}")),
        }
    }
}

impl super::DirEntries for OpStorage {
    async fn dir_entries(&self, dir: &str) -> upsync::Result<Vec<Node>> {
        let path = dir_path(dir);
        log::trace!("listing {}{path}", self.name);

        let mut lister = self
            .op
            .lister_with(&path)
            .metakey(Metakey::ContentLength | Metakey::LastModified | Metakey::Mode)
            .await
            .map_err(|err| provider_error!("list", dir, "{err}"))?;

        let mut names = HashSet::new();
        let mut nodes = Vec::new();
        while let Some(entry) = lister
            .try_next()
            .await
            .map_err(|err| provider_error!("list", dir, "{err}"))?
        {
            let name = entry.name().trim_end_matches('/');
            if entry.path() == path || name.is_empty() {
                continue;
            }
            // object storage may report a prefix and its marker
            if !names.insert(name.to_string()) {
                continue;
            }
            let meta = entry.metadata();
            match meta.mode() {
                EntryMode::DIR => nodes.push(Node::directory(name, Vec::new())?),
                EntryMode::FILE => {
                    let info = self.file_info(entry.path(), meta).await?;
                    nodes.push(Node::file(name, info));
                }
                EntryMode::Unknown => log::warn!("{}: skipping {}", self.name, entry.path()),
            }
        }
        Ok(nodes)
    }
}

impl super::ReadFile for OpStorage {
    async fn read_file(&self, path: &str) -> upsync::Result<Option<Vec<u8>>> {
        match self.op.read(path).await {
            Ok(buf) => Ok(Some(buf.to_vec())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(provider_error!("read", path, "{err}")),
        }
    }
}

impl super::WriteFile for OpStorage {
    async fn write_file(&self, path: &str, data: Vec<u8>) -> upsync::Result<()> {
        self.op
            .write(path, data)
            .await
            .map_err(|err| provider_error!("write", path, "{err}"))?;
        Ok(())
    }
}

impl super::Upload for OpStorage {
    async fn upload(&self, task: &UploadTask) -> upsync::Result<()> {
        log::debug!("{}: uploading {} ({} bytes)", self.name, task.remote_path, task.length);
        self.write_stream(task).await
    }
}

impl super::MkDir for OpStorage {
    async fn mkdir(&self, path: &str) -> upsync::Result<()> {
        if !self.flavor.has_directories() {
            return Ok(());
        }
        let dir = dir_path(path);
        log::debug!("{}: creating {dir}", self.name);
        match self.op.create_dir(&dir).await {
            Ok(()) => Ok(()),
            Err(err) => match self.op.stat(&dir).await {
                Ok(meta) if meta.is_dir() => Ok(()),
                _ => Err(provider_error!("mkdir", path, "{err}")),
            },
        }
    }
}

impl super::Delete for OpStorage {
    async fn delete_files(&self, paths: &[String]) -> upsync::Result<()> {
        debug_assert!(paths.len() <= super::MAX_DELETE_BATCH);
        log::debug!("{}: deleting {} files", self.name, paths.len());
        self.op.remove(paths.to_vec()).await.map_err(|err| {
            let first = paths.first().map(String::as_str).unwrap_or_default();
            provider_error!("delete", first, "{err}")
        })
    }

    async fn delete_dir(&self, path: &str) -> upsync::Result<()> {
        log::debug!("{}: deleting directory {path}", self.name);
        // a marker object for buckets, the empty folder otherwise
        self.op
            .delete(&dir_path(path))
            .await
            .map_err(|err| provider_error!("delete", path, "{err}"))
    }
}

impl super::Fragments for OpStorage {
    async fn fragments(&self) -> upsync::Result<Vec<String>> {
        match &self.uploads {
            Some(uploads) => uploads.list().await,
            None => Ok(Vec::new()),
        }
    }
}

impl CompareFile for OpStorage {
    fn compare_file(&self, remote: &FileInfo, local: &FileInfo, _rel_path: &str) -> bool {
        if self.trust_mtime {
            compare_mtime(remote, local)
        } else {
            compare_hash(remote, local)
        }
    }
}

impl Shutdown for OpStorage {}

impl super::Storage for OpStorage {
    fn name(&self) -> String {
        self.name.clone()
    }
}
