// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// How a backend treats `mkdir` on a directory that already exists, and on a
/// path whose parent is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MkdirPolicy {
    /// Existing directory fails with `AlreadyExists`; the parent must exist.
    #[default]
    Exclusive,
    /// Missing ancestors are created; an existing directory is left as is.
    Recursive,
}

/// Operations every storage backend provides.
///
/// Paths are relative to the backend (the router has already removed its
/// prefix). A trailing `/` denotes a directory. Listings hold immediate
/// children only, sorted, with directories suffixed by `/`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Short label used in log events
    fn name(&self) -> &'static str;

    fn mkdir_policy(&self) -> MkdirPolicy;

    async fn read_file(&self, path: &str) -> Result<Bytes>;

    /// Create or overwrite a file
    async fn write_file(&self, path: &str, content: Bytes) -> Result<()>;

    async fn delete_file(&self, path: &str) -> Result<()>;

    async fn list_files(&self, path: &str) -> Result<Vec<String>>;

    async fn mkdir(&self, path: &str) -> Result<()>;

    /// Remove an empty directory
    async fn rmdir(&self, path: &str) -> Result<()>;

    /// Returns `Ok(false)` rather than `NotFound`
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Wait for background work started by earlier calls
    async fn settle(&self) {}
}
