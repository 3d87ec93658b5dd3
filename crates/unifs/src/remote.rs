// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Remote object backend.
//!
//! The first path segment is the bucket, the rest is the object key. The
//! object store has no directories, so a directory is a zero-byte marker
//! object whose wire key ends in `/`. Inside this module keys are kept as
//! `ObjectKey` variants and the suffix only appears at the client boundary.

use crate::error::{Error, Result};
use crate::object::{ListOptions, ObjectClient, ObjectError};
use crate::path::segments;
use crate::storage::{MkdirPolicy, Storage};
use async_trait::async_trait;
use bytes::Bytes;

/// Listing limit used when checking whether a directory is empty. Two is
/// enough to see the directory's own marker plus one child.
const EMPTY_CHECK_LIMIT: usize = 2;

/// An object key, tagged by what it represents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectKey {
    File(String),
    /// Directory name without the trailing `/`; empty for the bucket root
    DirectoryMarker(String),
}

impl ObjectKey {
    #[must_use]
    pub fn parse(key: &str) -> Self {
        if key.is_empty() || key.ends_with('/') {
            ObjectKey::DirectoryMarker(key.trim_end_matches('/').to_string())
        } else {
            ObjectKey::File(key.to_string())
        }
    }

    /// The same name seen as a directory
    #[must_use]
    pub fn as_directory(&self) -> Self {
        match self {
            ObjectKey::File(name) => ObjectKey::DirectoryMarker(name.clone()),
            marker => marker.clone(),
        }
    }

    #[must_use]
    pub fn is_bucket_root(&self) -> bool {
        matches!(self, ObjectKey::DirectoryMarker(name) if name.is_empty())
    }

    /// Key as sent to the object client
    #[must_use]
    pub fn wire(&self) -> String {
        match self {
            ObjectKey::File(name) => name.clone(),
            ObjectKey::DirectoryMarker(name) if name.is_empty() => String::new(),
            ObjectKey::DirectoryMarker(name) => format!("{name}/"),
        }
    }

    /// Split into the listing scope that contains this key and the name the
    /// key has in that listing.
    #[must_use]
    pub fn scope_and_leaf(&self) -> (Option<String>, String) {
        let (name, is_dir) = match self {
            ObjectKey::File(name) => (name.as_str(), false),
            ObjectKey::DirectoryMarker(name) => (name.as_str(), true),
        };
        let (scope, leaf) = match name.rsplit_once('/') {
            Some((parent, leaf)) => (Some(format!("{parent}/")), leaf),
            None => (None, name),
        };
        let leaf = if is_dir {
            format!("{leaf}/")
        } else {
            leaf.to_string()
        };
        (scope, leaf)
    }
}

/// A parsed remote path: bucket plus key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePath {
    pub bucket: String,
    pub key: ObjectKey,
}

impl RemotePath {
    pub fn parse(path: &str) -> Result<Self> {
        let (bucket, rest) = path.split_once('/').unwrap_or((path, ""));
        if bucket.is_empty() {
            return Err(Error::invalid_path(path));
        }
        // Validate the key's segments; the key itself keeps its trailing `/`
        _ = segments(rest)?;
        Ok(Self {
            bucket: bucket.to_string(),
            key: ObjectKey::parse(rest),
        })
    }
}

fn map_object_error(path: &str, err: ObjectError) -> Error {
    match err {
        ObjectError::BucketNotFound(_) | ObjectError::NotFound(_) => Error::not_found(path),
        ObjectError::Duplicate(_) => Error::already_exists(path),
        ObjectError::InvalidKey(_) => Error::invalid_path(path),
        ObjectError::Transport(reason) => Error::BackendUnavailable(reason),
    }
}

/// Storage over a bucket/key object service
pub struct RemoteStorage<C: ObjectClient> {
    client: C,
}

impl<C: ObjectClient> RemoteStorage<C> {
    #[must_use]
    pub fn new(client: C) -> Self {
        Self { client }
    }

    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Whether `key` shows up by exact name in a search of its parent scope
    async fn lookup(&self, bucket: &str, key: &ObjectKey, path: &str) -> Result<bool> {
        let (scope, leaf) = key.scope_and_leaf();
        match self
            .client
            .list(bucket, scope.as_deref(), &ListOptions::search(leaf.as_str()))
            .await
        {
            Ok(entries) => Ok(entries.iter().any(|e| e.name == leaf)),
            Err(ObjectError::BucketNotFound(_) | ObjectError::NotFound(_)) => Ok(false),
            Err(e) => Err(map_object_error(path, e)),
        }
    }

    /// Whether the bucket can be listed at all
    async fn bucket_listable(&self, bucket: &str, path: &str) -> Result<bool> {
        match self.client.list(bucket, None, &ListOptions::limit(1)).await {
            Ok(_) => Ok(true),
            Err(ObjectError::BucketNotFound(_)) => Ok(false),
            Err(e) => Err(map_object_error(path, e)),
        }
    }

    fn file_key(path: &str) -> Result<(String, String)> {
        let remote = RemotePath::parse(path)?;
        match remote.key {
            ObjectKey::File(key) => Ok((remote.bucket, key)),
            ObjectKey::DirectoryMarker(_) => Err(Error::type_mismatch(path)),
        }
    }

    fn dir_key(path: &str) -> Result<(String, ObjectKey)> {
        let remote = RemotePath::parse(path)?;
        match remote.key {
            ObjectKey::File(_) => Err(Error::type_mismatch(path)),
            marker => Ok((remote.bucket, marker)),
        }
    }
}

#[async_trait]
impl<C: ObjectClient> Storage for RemoteStorage<C> {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn mkdir_policy(&self) -> MkdirPolicy {
        MkdirPolicy::Recursive
    }

    async fn read_file(&self, path: &str) -> Result<Bytes> {
        let (bucket, key) = Self::file_key(path)?;
        match self.client.download(&bucket, &key).await {
            Ok(data) => Ok(data),
            Err(ObjectError::NotFound(_)) => {
                let as_dir = ObjectKey::DirectoryMarker(key);
                if self.lookup(&bucket, &as_dir, path).await? {
                    Err(Error::type_mismatch(path))
                } else {
                    Err(Error::not_found(path))
                }
            }
            Err(e) => Err(map_object_error(path, e)),
        }
    }

    async fn write_file(&self, path: &str, content: Bytes) -> Result<()> {
        let (bucket, key) = Self::file_key(path)?;
        // Marked or implied, a directory of the same name blocks the write
        let file = ObjectKey::File(key);
        if self.lookup(&bucket, &file.as_directory(), path).await? {
            return Err(Error::type_mismatch(path));
        }
        self.client
            .upload(&bucket, &file.wire(), content, true)
            .await
            .map_err(|e| map_object_error(path, e))
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        let (bucket, key) = Self::file_key(path)?;
        let file = ObjectKey::File(key);
        if !self.lookup(&bucket, &file, path).await? {
            return if self.lookup(&bucket, &file.as_directory(), path).await? {
                Err(Error::type_mismatch(path))
            } else {
                Err(Error::not_found(path))
            };
        }
        self.client
            .remove(&bucket, &[file.wire()])
            .await
            .map_err(|e| map_object_error(path, e))
    }

    async fn list_files(&self, path: &str) -> Result<Vec<String>> {
        let remote = RemotePath::parse(path)?;
        let dir = remote.key.as_directory();
        let prefix = dir.wire();
        let prefix = (!prefix.is_empty()).then_some(prefix);

        let entries = self
            .client
            .list(&remote.bucket, prefix.as_deref(), &ListOptions::default())
            .await
            .map_err(|e| map_object_error(path, e))?;

        if entries.is_empty() && !dir.is_bucket_root() {
            // No marker and nothing under it
            let ObjectKey::DirectoryMarker(name) = &dir else {
                return Err(Error::not_found(path));
            };
            let file = ObjectKey::File(name.clone());
            return if self.lookup(&remote.bucket, &file, path).await? {
                Err(Error::type_mismatch(path))
            } else {
                Err(Error::not_found(path))
            };
        }

        Ok(entries
            .into_iter()
            .filter(|e| !e.is_self_marker())
            .map(|e| e.name)
            .collect())
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        let (bucket, marker) = Self::dir_key(path)?;
        if marker.is_bucket_root() {
            return if self.bucket_listable(&bucket, path).await? {
                Ok(())
            } else {
                Err(Error::not_found(path))
            };
        }

        if self.lookup(&bucket, &marker, path).await? {
            diagnostics::debug!("remote mkdir {path}: marker already present", path: path);
            return Ok(());
        }
        if let ObjectKey::DirectoryMarker(name) = &marker {
            if self.lookup(&bucket, &ObjectKey::File(name.clone()), path).await? {
                return Err(Error::already_exists(path));
            }
        }

        match self
            .client
            .upload(&bucket, &marker.wire(), Bytes::new(), false)
            .await
        {
            Ok(()) => Ok(()),
            Err(ObjectError::Duplicate(_)) => {
                diagnostics::debug!("remote mkdir {path}: concurrent create", path: path);
                Ok(())
            }
            Err(e) => Err(map_object_error(path, e)),
        }
    }

    async fn rmdir(&self, path: &str) -> Result<()> {
        let (bucket, marker) = Self::dir_key(path)?;
        if marker.is_bucket_root() {
            return Err(Error::invalid_path(path));
        }
        let wire = marker.wire();

        let entries = self
            .client
            .list(&bucket, Some(&wire), &ListOptions::limit(EMPTY_CHECK_LIMIT))
            .await
            .map_err(|e| map_object_error(path, e))?;

        if entries.iter().any(|e| !e.is_self_marker()) {
            return Err(Error::not_empty(path));
        }
        if entries.is_empty() {
            return Err(Error::not_found(path));
        }

        match self.client.remove(&bucket, &[wire]).await {
            Ok(()) | Err(ObjectError::NotFound(_)) => Ok(()),
            Err(e) => Err(map_object_error(path, e)),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        if path.trim_matches('/').is_empty() {
            return Ok(true);
        }
        let remote = RemotePath::parse(path)?;
        if remote.key.is_bucket_root() {
            return self.bucket_listable(&remote.bucket, path).await;
        }
        self.lookup(&remote.bucket, &remote.key, path).await
    }
}
