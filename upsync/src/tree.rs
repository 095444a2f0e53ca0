use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Content description of a regular file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub length: u64,
    /// Hex encoded content digest. Empty when a backend can't report it.
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

impl FileInfo {
    pub fn new(length: u64, hash: impl Into<String>) -> Self {
        Self {
            length,
            hash: hash.into(),
            modified: None,
        }
    }

    pub fn with_modified(mut self, modified: Option<DateTime<Utc>>) -> Self {
        self.modified = modified;
        self
    }

    pub fn has_hash(&self) -> bool {
        !self.hash.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    File(FileInfo),
    Directory(Vec<Node>),
}

/// A node of a local or remote tree.
///
/// Directories exclusively own their children. Names are unique among
/// siblings, which is checked when a directory is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "NodeRepr", into = "NodeRepr")]
pub struct Node {
    name: String,
    kind: NodeKind,
}

/// A node of the tree read from the synchronization root.
pub type LocalNode = Node;

/// A node of the tree listed from, or cached about, a backend.
pub type RemoteNode = Node;

impl Node {
    pub fn file(name: impl Into<String>, info: FileInfo) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::File(info),
        }
    }

    pub fn directory(name: impl Into<String>, children: Vec<Node>) -> Result<Self> {
        let name = name.into();
        check_siblings(&name, &children)?;
        Ok(Self {
            name,
            kind: NodeKind::Directory(children),
        })
    }

    /// The synthetic root wrapping the top-level entries of a tree.
    pub fn root(children: Vec<Node>) -> Result<Self> {
        Self::directory("", children)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File(..))
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory(..))
    }

    pub fn file_info(&self) -> Option<&FileInfo> {
        match &self.kind {
            NodeKind::File(info) => Some(info),
            NodeKind::Directory(..) => None,
        }
    }

    /// The children of a directory, empty for a file.
    pub fn children(&self) -> &[Node] {
        match &self.kind {
            NodeKind::Directory(children) => children,
            NodeKind::File(..) => &[],
        }
    }

    pub fn into_children(self) -> Vec<Node> {
        match self.kind {
            NodeKind::Directory(children) => children,
            NodeKind::File(..) => Vec::new(),
        }
    }

    /// Look up a direct child by exact name.
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children().iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.child(name).is_some()
    }

    /// Number of files in the whole sub-tree
    pub fn file_count(&self) -> usize {
        match &self.kind {
            NodeKind::File(..) => 1,
            NodeKind::Directory(children) => children.iter().map(Node::file_count).sum(),
        }
    }

    /// Cumulated length of the files in the whole sub-tree
    pub fn total_length(&self) -> u64 {
        match &self.kind {
            NodeKind::File(info) => info.length,
            NodeKind::Directory(children) => children.iter().map(Node::total_length).sum(),
        }
    }
}

fn check_siblings(dir: &str, children: &[Node]) -> Result<()> {
    let mut names = HashSet::with_capacity(children.len());
    for c in children {
        if c.name.is_empty() {
            crate::structure_bail!("empty entry name in directory '{dir}'");
        }
        if !names.insert(c.name.as_str()) {
            crate::structure_bail!("duplicate entry '{}' in directory '{dir}'", c.name);
        }
    }
    Ok(())
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct DirRepr {
    name: String,
    children: Vec<Node>,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileRepr {
    name: String,
    length: u64,
    hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    modified: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum NodeRepr {
    Directory(DirRepr),
    File(FileRepr),
}

impl TryFrom<NodeRepr> for Node {
    type Error = crate::Error;

    fn try_from(value: NodeRepr) -> Result<Self> {
        match value {
            NodeRepr::Directory(DirRepr { name, children }) => Node::directory(name, children),
            NodeRepr::File(FileRepr {
                name,
                length,
                hash,
                modified,
            }) => Ok(Node::file(
                name,
                FileInfo {
                    length,
                    hash,
                    modified,
                },
            )),
        }
    }
}

impl From<Node> for NodeRepr {
    fn from(value: Node) -> Self {
        match value.kind {
            NodeKind::Directory(children) => NodeRepr::Directory(DirRepr {
                name: value.name,
                children,
            }),
            NodeKind::File(FileInfo {
                length,
                hash,
                modified,
            }) => NodeRepr::File(FileRepr {
                name: value.name,
                length,
                hash,
                modified,
            }),
        }
    }
}
