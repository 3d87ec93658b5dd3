// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Bucket-scoped object storage client.
//!
//! `ObjectClient` is the boundary between the remote backend and whatever
//! object service sits behind it. Keys are flat strings; a key ending in `/`
//! is a zero-byte directory marker.
//!
//! Listing returns the immediate children of a prefix, relative to it:
//! - files by name (`report.pdf`)
//! - child directories, marked or implied by deeper keys, as `name/`
//! - the prefix's own directory marker as the empty name `""`

mod store;

pub use store::{FOLDER_PLACEHOLDER, ObjectStoreClient};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ObjectError {
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    /// A create-only upload hit an existing object
    #[error("Object already exists: {0}")]
    Duplicate(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Object store error: {0}")]
    Transport(String),
}

/// Filters for `ObjectClient::list`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Keep only names starting with this string
    pub search: Option<String>,
    /// Maximum number of names returned, after sorting
    pub limit: Option<usize>,
}

impl ListOptions {
    #[must_use]
    pub fn search<S: Into<String>>(search: S) -> Self {
        Self {
            search: Some(search.into()),
            limit: None,
        }
    }

    #[must_use]
    pub fn limit(limit: usize) -> Self {
        Self {
            search: None,
            limit: Some(limit),
        }
    }

    /// Apply search, ordering, de-duplication and limit to raw names
    #[must_use]
    pub fn apply(&self, mut names: Vec<String>) -> Vec<ObjectEntry> {
        if let Some(search) = &self.search {
            names.retain(|name| name.starts_with(search.as_str()));
        }
        names.sort();
        names.dedup();
        if let Some(limit) = self.limit {
            names.truncate(limit);
        }
        names.into_iter().map(|name| ObjectEntry { name }).collect()
    }
}

/// One listing result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub name: String,
}

impl ObjectEntry {
    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.name.ends_with('/')
    }

    /// The queried prefix's own directory marker
    #[must_use]
    pub fn is_self_marker(&self) -> bool {
        self.name.is_empty()
    }
}

#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// Store `data` at `key`. With `upsert == false` an existing object fails
    /// with `ObjectError::Duplicate`.
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        upsert: bool,
    ) -> Result<(), ObjectError>;

    async fn download(&self, bucket: &str, key: &str) -> Result<Bytes, ObjectError>;

    /// List the children of `prefix` (the bucket root when `None`)
    async fn list(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        options: &ListOptions,
    ) -> Result<Vec<ObjectEntry>, ObjectError>;

    async fn remove(&self, bucket: &str, keys: &[String]) -> Result<(), ObjectError>;
}
