//! In-memory storage recording every call.
//!
//! Mimics a backend with real directories: a directory must exist before
//! anything is created in it, and only empty directories can be deleted.

use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    sync::{Arc, Mutex},
};

use futures::future::{self, BoxFuture};
use upsync::{digest, provider_error, FileInfo, Headers, Node, UploadTask};
use upsyncd::{
    storage::{
        Delete, DirEntries, Fragments, Init, MkDir, ReadFile, Storage, Upload, WriteFile,
        MAX_DELETE_BATCH,
    },
    CompareFile, Shutdown,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Init,
    List(String),
    Read(String),
    Write(String),
    Upload(String),
    MkDir(String),
    DeleteFiles(usize),
    DeleteDir(String),
    Shutdown,
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Call::Write(..)
                | Call::Upload(..)
                | Call::MkDir(..)
                | Call::DeleteFiles(..)
                | Call::DeleteDir(..)
        )
    }
}

#[derive(Debug, Clone)]
pub struct MemFile {
    pub content: Vec<u8>,
    pub hash: String,
    pub headers: Headers,
}

#[derive(Debug, Default)]
struct Inner {
    files: BTreeMap<String, MemFile>,
    dirs: BTreeSet<String>,
    calls: Vec<Call>,
    fail_uploads: HashSet<String>,
    fragments: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Stub {
    inner: Arc<Mutex<Inner>>,
    /// Whether listings report content hashes
    hashes: bool,
}

fn parent(path: &str) -> &str {
    path.rsplit_once('/').map(|(p, _)| p).unwrap_or("")
}

fn name(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, n)| n).unwrap_or(path)
}

impl Stub {
    pub fn new(hashes: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            hashes,
        }
    }

    fn record(&self, call: Call) {
        self.inner.lock().unwrap().calls.push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    pub fn file(&self, path: &str) -> Option<MemFile> {
        self.inner.lock().unwrap().files.get(path).cloned()
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.inner.lock().unwrap().dirs.contains(path)
    }

    pub fn file_paths(&self) -> Vec<String> {
        self.inner.lock().unwrap().files.keys().cloned().collect()
    }

    pub fn fail_upload(&self, path: &str) {
        self.inner
            .lock()
            .unwrap()
            .fail_uploads
            .insert(path.to_string());
    }

    pub fn clear_failures(&self) {
        self.inner.lock().unwrap().fail_uploads.clear();
    }

    pub fn add_fragment(&self, id: &str) {
        self.inner.lock().unwrap().fragments.push(id.to_string());
    }

    /// Insert a file, creating its ancestors, without recording a call
    pub fn insert_file(&self, path: &str, content: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        let mut dir = parent(path);
        while !dir.is_empty() {
            inner.dirs.insert(dir.to_string());
            dir = parent(dir);
        }
        inner.files.insert(
            path.to_string(),
            MemFile {
                content: content.to_vec(),
                hash: digest::bytes_digest(content),
                headers: Headers::new(),
            },
        );
    }

    fn check_parent(inner: &Inner, op: &'static str, path: &str) -> upsync::Result<()> {
        let dir = parent(path);
        if dir.is_empty() || inner.dirs.contains(dir) {
            Ok(())
        } else {
            Err(provider_error!(op, path, "no such directory: {dir}"))
        }
    }
}

impl Init for Stub {
    async fn init(&self) -> upsync::Result<()> {
        self.record(Call::Init);
        Ok(())
    }
}

impl DirEntries for Stub {
    async fn dir_entries(&self, dir: &str) -> upsync::Result<Vec<Node>> {
        self.record(Call::List(dir.to_string()));
        let inner = self.inner.lock().unwrap();
        if !dir.is_empty() && !inner.dirs.contains(dir) {
            return Err(provider_error!("list", dir, "no such directory"));
        }
        let mut nodes = Vec::new();
        for d in inner.dirs.iter().filter(|d| parent(d) == dir) {
            nodes.push(Node::directory(name(d), Vec::new())?);
        }
        for (path, file) in inner.files.iter().filter(|(p, _)| parent(p) == dir) {
            let hash = if self.hashes {
                file.hash.clone()
            } else {
                String::new()
            };
            nodes.push(Node::file(
                name(path),
                FileInfo::new(file.content.len() as u64, hash),
            ));
        }
        Ok(nodes)
    }
}

impl ReadFile for Stub {
    async fn read_file(&self, path: &str) -> upsync::Result<Option<Vec<u8>>> {
        self.record(Call::Read(path.to_string()));
        Ok(self.file(path).map(|f| f.content))
    }
}

impl WriteFile for Stub {
    async fn write_file(&self, path: &str, data: Vec<u8>) -> upsync::Result<()> {
        self.record(Call::Write(path.to_string()));
        let mut inner = self.inner.lock().unwrap();
        Self::check_parent(&inner, "write", path)?;
        let hash = digest::bytes_digest(&data);
        inner.files.insert(
            path.to_string(),
            MemFile {
                content: data,
                hash,
                headers: Headers::new(),
            },
        );
        Ok(())
    }
}

impl Upload for Stub {
    async fn upload(&self, task: &UploadTask) -> upsync::Result<()> {
        let path = task.remote_path.as_str();
        self.record(Call::Upload(path.to_string()));
        let content = tokio::fs::read(&task.local_path).await?;

        let mut inner = self.inner.lock().unwrap();
        if inner.fail_uploads.contains(path) {
            return Err(provider_error!("upload", path, "injected failure"));
        }
        Self::check_parent(&inner, "upload", path)?;
        if inner.dirs.contains(path) {
            return Err(provider_error!("upload", path, "is a directory"));
        }
        inner.files.insert(
            path.to_string(),
            MemFile {
                content,
                hash: task.hash.clone(),
                headers: task.headers.clone(),
            },
        );
        Ok(())
    }
}

impl MkDir for Stub {
    async fn mkdir(&self, path: &str) -> upsync::Result<()> {
        self.record(Call::MkDir(path.to_string()));
        let mut inner = self.inner.lock().unwrap();
        if inner.dirs.contains(path) {
            return Ok(());
        }
        Self::check_parent(&inner, "mkdir", path)?;
        if inner.files.contains_key(path) {
            return Err(provider_error!("mkdir", path, "is a file"));
        }
        inner.dirs.insert(path.to_string());
        Ok(())
    }
}

impl Delete for Stub {
    async fn delete_files(&self, paths: &[String]) -> upsync::Result<()> {
        self.record(Call::DeleteFiles(paths.len()));
        if paths.len() > MAX_DELETE_BATCH {
            return Err(provider_error!("delete", "", "batch too large: {}", paths.len()));
        }
        let mut inner = self.inner.lock().unwrap();
        for path in paths {
            inner.files.remove(path);
        }
        Ok(())
    }

    async fn delete_dir(&self, path: &str) -> upsync::Result<()> {
        self.record(Call::DeleteDir(path.to_string()));
        let mut inner = self.inner.lock().unwrap();
        let prefix = format!("{path}/");
        let not_empty = inner.files.keys().any(|p| p.starts_with(&prefix))
            || inner.dirs.iter().any(|d| d.starts_with(&prefix));
        if not_empty {
            return Err(provider_error!("delete", path, "directory not empty"));
        }
        inner.dirs.remove(path);
        Ok(())
    }
}

impl Fragments for Stub {
    async fn fragments(&self) -> upsync::Result<Vec<String>> {
        Ok(self.inner.lock().unwrap().fragments.clone())
    }
}

impl CompareFile for Stub {}

impl Shutdown for Stub {
    fn shutdown(&self) -> BoxFuture<'_, upsync::Result<()>> {
        self.record(Call::Shutdown);
        Box::pin(future::ready(Ok(())))
    }
}

impl Storage for Stub {
    fn name(&self) -> String {
        "mem".into()
    }
}
