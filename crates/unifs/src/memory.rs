// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Volatile in-memory backend.
//!
//! The whole tree lives behind one async mutex, so every operation is atomic
//! with respect to the others. Content is gone when the process exits.

use crate::error::{Error, Result};
use crate::path::{entry_name, is_dir_path, segments};
use crate::storage::{MkdirPolicy, Storage};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug)]
enum Node {
    File(Bytes),
    Directory(BTreeMap<String, Node>),
}

impl Node {
    fn empty_dir() -> Self {
        Node::Directory(BTreeMap::new())
    }
}

/// In-memory hierarchical storage. Clones share the same tree.
#[derive(Clone)]
pub struct MemoryStorage {
    root: Arc<Mutex<Node>>,
    policy: MkdirPolicy,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new(MkdirPolicy::default())
    }
}

impl MemoryStorage {
    #[must_use]
    pub fn new(policy: MkdirPolicy) -> Self {
        Self {
            root: Arc::new(Mutex::new(Node::empty_dir())),
            policy,
        }
    }
}

fn lookup<'a>(root: &'a Node, segs: &[&str]) -> Option<&'a Node> {
    segs.iter().try_fold(root, |node, seg| match node {
        Node::Directory(children) => children.get(*seg),
        Node::File(_) => None,
    })
}

/// Walk to the directory at `segs`, optionally creating missing directories
/// along the way.
fn dir_at<'a>(
    node: &'a mut Node,
    segs: &[&str],
    create: bool,
    path: &str,
) -> Result<&'a mut BTreeMap<String, Node>> {
    let Node::Directory(children) = node else {
        return Err(Error::type_mismatch(path));
    };
    match segs.split_first() {
        None => Ok(children),
        Some((seg, rest)) => {
            let child = if create {
                children
                    .entry((*seg).to_string())
                    .or_insert_with(Node::empty_dir)
            } else {
                children
                    .get_mut(*seg)
                    .ok_or_else(|| Error::not_found(path))?
            };
            dir_at(child, rest, create, path)
        }
    }
}

/// Parent directory for a lookup; a missing or non-directory ancestor means
/// the entry itself does not exist.
fn existing_parent<'a>(
    root: &'a mut Node,
    parent: &[&str],
    path: &str,
) -> Result<&'a mut BTreeMap<String, Node>> {
    dir_at(root, parent, false, path).map_err(|_| Error::not_found(path))
}

#[async_trait]
impl Storage for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn mkdir_policy(&self) -> MkdirPolicy {
        self.policy
    }

    async fn read_file(&self, path: &str) -> Result<Bytes> {
        let segs = segments(path)?;
        let root = self.root.lock().await;
        match lookup(&root, &segs) {
            Some(Node::File(content)) => Ok(content.clone()),
            Some(Node::Directory(_)) => Err(Error::type_mismatch(path)),
            None => Err(Error::not_found(path)),
        }
    }

    async fn write_file(&self, path: &str, content: Bytes) -> Result<()> {
        let segs = segments(path)?;
        let Some((name, parent)) = segs.split_last() else {
            return Err(Error::type_mismatch(path));
        };
        if is_dir_path(path) {
            return Err(Error::type_mismatch(path));
        }

        let mut root = self.root.lock().await;
        let dir = dir_at(&mut root, parent, true, path)?;
        if let Some(Node::Directory(_)) = dir.get(*name) {
            return Err(Error::type_mismatch(path));
        }
        _ = dir.insert((*name).to_string(), Node::File(content));
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        let segs = segments(path)?;
        let Some((name, parent)) = segs.split_last() else {
            return Err(Error::type_mismatch(path));
        };

        let mut root = self.root.lock().await;
        let dir = existing_parent(&mut root, parent, path)?;
        match dir.get(*name) {
            None => Err(Error::not_found(path)),
            Some(Node::Directory(_)) => Err(Error::type_mismatch(path)),
            Some(Node::File(_)) => {
                _ = dir.remove(*name);
                Ok(())
            }
        }
    }

    async fn list_files(&self, path: &str) -> Result<Vec<String>> {
        let segs = segments(path)?;
        let root = self.root.lock().await;
        match lookup(&root, &segs) {
            Some(Node::Directory(children)) => Ok(children
                .iter()
                .map(|(name, node)| entry_name(name, matches!(node, Node::Directory(_))))
                .collect()),
            Some(Node::File(_)) => Err(Error::type_mismatch(path)),
            None => Err(Error::not_found(path)),
        }
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        let segs = segments(path)?;
        let recursive = self.policy == MkdirPolicy::Recursive;
        let Some((name, parent)) = segs.split_last() else {
            // The root always exists
            return if recursive {
                Ok(())
            } else {
                Err(Error::already_exists(path))
            };
        };

        let mut root = self.root.lock().await;
        let dir = dir_at(&mut root, parent, recursive, path)?;
        match dir.get(*name) {
            Some(Node::File(_)) => Err(Error::already_exists(path)),
            Some(Node::Directory(_)) if recursive => Ok(()),
            Some(Node::Directory(_)) => Err(Error::already_exists(path)),
            None => {
                _ = dir.insert((*name).to_string(), Node::empty_dir());
                Ok(())
            }
        }
    }

    async fn rmdir(&self, path: &str) -> Result<()> {
        let segs = segments(path)?;
        let Some((name, parent)) = segs.split_last() else {
            return Err(Error::invalid_path(path));
        };

        let mut root = self.root.lock().await;
        let dir = existing_parent(&mut root, parent, path)?;
        match dir.get(*name) {
            None => Err(Error::not_found(path)),
            Some(Node::File(_)) => Err(Error::type_mismatch(path)),
            Some(Node::Directory(children)) if !children.is_empty() => {
                Err(Error::not_empty(path))
            }
            Some(Node::Directory(_)) => {
                _ = dir.remove(*name);
                Ok(())
            }
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let segs = segments(path)?;
        let root = self.root.lock().await;
        Ok(lookup(&root, &segs).is_some())
    }
}
