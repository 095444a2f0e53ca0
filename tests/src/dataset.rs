use camino::Utf8Path;
use futures::future::BoxFuture;
use tokio::fs;

mod build {
    #[derive(Debug, Copy, Clone)]
    pub enum Entry {
        Dir {
            /// Name of the directory
            name: &'static str,
            /// Entries of the directory
            entries: &'static [Entry],
        },
        File {
            /// Name of the file
            name: &'static str,
            /// Content of the file
            content: &'static str,
        },
    }

    #[rustfmt::skip]
    pub const SITE: &[Entry] = &[
        Entry::File{name: "index.html", content: "<html>index</html>"},
        Entry::File{name: "about.html", content: "<html>about</html>"},
        Entry::File{name: "robots.txt", content: "User-agent: *"},
        Entry::Dir{name: "assets", entries: &[
            Entry::File{name: "app.js", content: "console.log('app')"},
            Entry::File{name: "style.css", content: "body {}"},
            Entry::Dir{name: "img", entries: &[
                Entry::File{name: "logo.svg", content: "<svg/>"},
            ]},
        ]},
        Entry::Dir{name: "docs", entries: &[
            Entry::File{name: "faq.html", content: "<html>faq</html>"},
            Entry::Dir{name: "guide", entries: &[
                Entry::File{name: "intro.html", content: "<html>intro</html>"},
                Entry::File{name: "setup.html", content: "<html>setup</html>"},
            ]},
        ]},
        Entry::Dir{name: "empty", entries: &[]},
    ];
}

pub const SITE_FILES: usize = 9;
pub const SITE_DIRS: usize = 5;

#[derive(Debug, Clone)]
pub enum Entry {
    Dir { name: String, entries: Vec<Entry> },
    File { name: String, content: String },
}

impl Entry {
    pub fn name(&self) -> &str {
        match self {
            Entry::Dir { name, .. } => name,
            Entry::File { name, .. } => name,
        }
    }
}

impl From<build::Entry> for Entry {
    fn from(e: build::Entry) -> Self {
        match e {
            build::Entry::Dir { name, entries } => Entry::Dir {
                name: name.into(),
                entries: entries.iter().map(|e| (*e).into()).collect(),
            },
            build::Entry::File { name, content } => Entry::File {
                name: name.into(),
                content: content.into(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub entries: Vec<Entry>,
}

impl Default for Dataset {
    fn default() -> Self {
        Self {
            entries: build::SITE.iter().map(|e| (*e).into()).collect(),
        }
    }
}

impl Dataset {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add a file at the root
    pub fn with_file(mut self, name: &str, content: &str) -> Self {
        self.entries.push(Entry::File {
            name: name.into(),
            content: content.into(),
        });
        self
    }

    /// Relative paths of every file
    pub fn file_paths(&self) -> Vec<String> {
        fn inner(entries: &[Entry], dir: &str, paths: &mut Vec<String>) {
            for e in entries {
                let path = upsyncd::join_path(dir, e.name());
                match e {
                    Entry::File { .. } => paths.push(path),
                    Entry::Dir { entries, .. } => inner(entries, &path, paths),
                }
            }
        }
        let mut paths = Vec::new();
        inner(&self.entries, "", &mut paths);
        paths.sort();
        paths
    }

    pub async fn create_fs(&self, root: &Utf8Path) {
        create_entries(root, &self.entries).await;
    }
}

fn create_entries<'a>(dir: &'a Utf8Path, entries: &'a [Entry]) -> BoxFuture<'a, ()> {
    Box::pin(async move {
        for e in entries {
            let path = dir.join(e.name());
            match e {
                Entry::File { content, .. } => fs::write(&path, content).await.unwrap(),
                Entry::Dir { entries, .. } => {
                    fs::create_dir(&path).await.unwrap();
                    create_entries(&path, entries).await;
                }
            }
        }
    })
}

/// A change of the local tree between two runs
#[derive(Debug, Clone)]
pub enum Patch {
    Content(&'static str, &'static str),
    Delete(&'static str),
    /// Replace a file by a directory holding one file
    FileToDir(&'static str, &'static str),
    /// Replace a directory by a file with the given content
    DirToFile(&'static str, &'static str),
}

impl Patch {
    pub async fn apply(&self, root: &Utf8Path) {
        match self {
            Patch::Content(path, content) => fs::write(root.join(path), content).await.unwrap(),
            Patch::Delete(path) => {
                let path = root.join(path);
                if path.is_dir() {
                    fs::remove_dir_all(&path).await.unwrap();
                } else {
                    fs::remove_file(&path).await.unwrap();
                }
            }
            Patch::FileToDir(path, child) => {
                let path = root.join(path);
                fs::remove_file(&path).await.unwrap();
                fs::create_dir(&path).await.unwrap();
                fs::write(path.join(child), "child").await.unwrap();
            }
            Patch::DirToFile(path, content) => {
                let path = root.join(path);
                fs::remove_dir_all(&path).await.unwrap();
                fs::write(&path, content).await.unwrap();
            }
        }
    }
}

#[test]
fn test_file_paths() {
    let dataset = Dataset::default();
    let paths = dataset.file_paths();
    assert_eq!(paths.len(), SITE_FILES);
    assert!(paths.contains(&"assets/img/logo.svg".to_string()));
    assert!(paths.contains(&"docs/guide/setup.html".to_string()));
}
