//! Reconciliation of a remote tree with the local tree.
//!
//! Two independent walks accumulate into the same [`Plan`]:
//! - `find_new` walks the local children and records what is missing or
//!   differs remotely. Type mismatches and content mismatches are only
//!   detected here, and mark the remote entry obsolete at the same time.
//! - `find_obsolete` walks the remote children and records what no longer
//!   exists locally.
//!
//! The local tree is authoritative. No backend is called.

use std::collections::HashMap;

use upsync::{LocalNode, Node, NodeKind, Plan, RemoteNode};

use crate::{join_path as join, provider::CompareFile};

/// Compute the plan turning `current` (remote) into `template` (local).
/// Both must be directories, typically synthetic roots.
pub fn diff<C>(current: &RemoteNode, template: &LocalNode, cmp: &C) -> upsync::Result<Plan>
where
    C: CompareFile + ?Sized,
{
    if !current.is_dir() || !template.is_dir() {
        upsync::structure_bail!("diff must start from two directories");
    }

    let mut diff = Diff {
        cmp,
        plan: Plan::default(),
    };
    diff.find_new(current, template, "");
    diff.find_obsolete(current, template, "");

    log::debug!(
        "diff: {} obsolete files, {} obsolete directories, {} new files, {} new directories",
        diff.plan.obsolete_files.len(),
        diff.plan.obsolete_directories.len(),
        diff.plan.new_files.len(),
        diff.plan.new_directories.len()
    );
    Ok(diff.plan)
}

struct Diff<'a, C: ?Sized> {
    cmp: &'a C,
    plan: Plan,
}

fn index(dir: &Node) -> HashMap<&str, &Node> {
    dir.children().iter().map(|c| (c.name(), c)).collect()
}

impl<'a, C> Diff<'a, C>
where
    C: CompareFile + ?Sized,
{
    fn find_new(&mut self, current: &Node, template: &Node, dir: &str) {
        let current_children = index(current);

        for t in template.children() {
            let path = join(dir, t.name());
            let Some(c) = current_children.get(t.name()) else {
                self.add_new(t, &path);
                continue;
            };

            match (t.kind(), c.kind()) {
                (NodeKind::Directory(..), NodeKind::Directory(..)) => {
                    self.find_new(c, t, &path);
                }
                (NodeKind::File(local), NodeKind::File(remote)) => {
                    if !self.cmp.compare_file(remote, local, &path) {
                        log::trace!("{path} differs");
                        self.add_obsolete(c, &path);
                        self.add_new(t, &path);
                    }
                }
                _ => {
                    log::trace!("{path} changed type");
                    self.add_obsolete(c, &path);
                    self.add_new(t, &path);
                }
            }
        }
    }

    fn find_obsolete(&mut self, current: &Node, template: &Node, dir: &str) {
        let template_children = index(template);

        for c in current.children() {
            let path = join(dir, c.name());
            match template_children.get(c.name()) {
                None => self.add_obsolete(c, &path),
                Some(t) if t.is_dir() && c.is_dir() => self.find_obsolete(c, t, &path),
                // mismatches were handled by find_new
                Some(_) => (),
            }
        }
    }

    fn add_obsolete(&mut self, node: &Node, path: &str) {
        match node.kind() {
            NodeKind::File(..) => {
                self.plan.obsolete_files.insert(path.to_string());
            }
            NodeKind::Directory(children) => {
                for c in children {
                    self.add_obsolete(c, &join(path, c.name()));
                }
                self.plan.obsolete_directories.insert(path.to_string());
            }
        }
    }

    fn add_new(&mut self, node: &Node, path: &str) {
        self.add_parents(path);
        match node.kind() {
            NodeKind::File(info) => {
                self.plan.new_files.insert(path.to_string(), info.clone());
            }
            NodeKind::Directory(children) => {
                self.plan.new_directories.insert(path.to_string());
                for c in children {
                    self.add_new(c, &join(path, c.name()));
                }
            }
        }
    }

    /// Register every ancestor of `path`, the root excepted.
    fn add_parents(&mut self, path: &str) {
        let mut path = path;
        while let Some((parent, _)) = path.rsplit_once('/') {
            // ancestors of a registered directory are registered too
            if !self.plan.new_directories.insert(parent.to_string()) {
                break;
            }
            path = parent;
        }
    }
}
