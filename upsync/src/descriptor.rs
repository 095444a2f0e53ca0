//! Serialized form of a tree, stored on the backend as the remote-state
//! cache and written beside local directories as descriptor files.
//!
//! The document is the JSON array of the root's children. Each element is
//! either `{name, length, hash[, modified]}` or `{name, children}`.

use crate::{Node, Result};

pub struct CacheDescriptor;

impl CacheDescriptor {
    /// Serialize the children of `root`.
    pub fn to_bytes(root: &Node) -> Result<Vec<u8>> {
        let bytes = serde_json::to_vec_pretty(root.children())?;
        Ok(bytes)
    }

    /// Parse a descriptor into a tree wrapped in a synthetic root.
    pub fn parse(bytes: &[u8]) -> Result<Node> {
        let children: Vec<Node> =
            serde_json::from_slice(bytes).map_err(|err| crate::cache_error!("{err}"))?;
        Node::root(children).map_err(|err| crate::cache_error!("{err}"))
    }
}
