// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use crate::path::{Probe, entry_name, is_dir_path, segments};
use crate::storage::{MkdirPolicy, Storage};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Durable storage in a host directory tree.
///
/// The configured root maps to the empty path. Every path is normalized by
/// trimming `/` on both ends and split into segments; `.` and `..` never
/// reach the host, so operations stay under the root.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    policy: MkdirPolicy,
}

impl LocalStorage {
    /// Open (creating if needed) a local store rooted at `root`.
    pub async fn open<P: AsRef<Path>>(root: P, policy: MkdirPolicy) -> Result<Self> {
        let root = root.as_ref();
        tokio::fs::create_dir_all(root).await.map_err(|e| {
            Error::BackendUnavailable(format!(
                "local root '{}' cannot be created: {}",
                root.display(),
                e
            ))
        })?;

        let canonical = tokio::fs::canonicalize(root).await.map_err(|e| {
            Error::BackendUnavailable(format!(
                "local root '{}' cannot be resolved: {}",
                root.display(),
                e
            ))
        })?;

        diagnostics::debug!("opened local store at {root}", root: canonical.display().to_string());

        Ok(Self {
            root: canonical,
            policy,
        })
    }

    /// Another handle on the same directory tree with a different mkdir policy
    #[must_use]
    pub fn with_policy(&self, policy: MkdirPolicy) -> Self {
        Self {
            root: self.root.clone(),
            policy,
        }
    }

    #[must_use]
    pub fn root_path(&self) -> &Path {
        &self.root
    }

    fn host_path(&self, segs: &[&str]) -> PathBuf {
        let mut host = self.root.clone();
        host.extend(segs);
        host
    }

    /// Classify a host path. An intermediate component that is a file means
    /// the path does not exist.
    async fn probe(&self, host: &Path, path: &str) -> Result<Probe> {
        match tokio::fs::metadata(host).await {
            Ok(meta) if meta.is_dir() => Ok(Probe::Directory),
            Ok(_) => Ok(Probe::File),
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                Ok(Probe::Missing)
            }
            Err(e) => Err(Error::from_io(path, &e)),
        }
    }

    /// Create `dir` and its ancestors; a file in the way is a type mismatch
    async fn ensure_dir(&self, dir: &Path, path: &str) -> Result<()> {
        tokio::fs::create_dir_all(dir).await.map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists | ErrorKind::NotADirectory => Error::type_mismatch(path),
            _ => Error::from_io(path, &e),
        })
    }
}

#[async_trait]
impl Storage for LocalStorage {
    fn name(&self) -> &'static str {
        "local"
    }

    fn mkdir_policy(&self) -> MkdirPolicy {
        self.policy
    }

    async fn read_file(&self, path: &str) -> Result<Bytes> {
        let host = self.host_path(&segments(path)?);
        match self.probe(&host, path).await? {
            Probe::Missing => Err(Error::not_found(path)),
            Probe::Directory => Err(Error::type_mismatch(path)),
            Probe::File => {
                let mut file = tokio::fs::File::open(&host)
                    .await
                    .map_err(|e| Error::from_io(path, &e))?;
                let mut buf = Vec::new();
                _ = file
                    .read_to_end(&mut buf)
                    .await
                    .map_err(|e| Error::from_io(path, &e))?;
                Ok(Bytes::from(buf))
            }
        }
    }

    async fn write_file(&self, path: &str, content: Bytes) -> Result<()> {
        let segs = segments(path)?;
        if segs.is_empty() || is_dir_path(path) {
            return Err(Error::type_mismatch(path));
        }
        let host = self.host_path(&segs);
        if let Some(parent) = host.parent() {
            self.ensure_dir(parent, path).await?;
        }
        if self.probe(&host, path).await? == Probe::Directory {
            return Err(Error::type_mismatch(path));
        }

        let mut file = tokio::fs::File::create(&host)
            .await
            .map_err(|e| Error::from_io(path, &e))?;
        file.write_all(&content)
            .await
            .map_err(|e| Error::from_io(path, &e))?;
        file.flush().await.map_err(|e| Error::from_io(path, &e))?;
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        let host = self.host_path(&segments(path)?);
        match self.probe(&host, path).await? {
            Probe::Missing => Err(Error::not_found(path)),
            Probe::Directory => Err(Error::type_mismatch(path)),
            Probe::File => tokio::fs::remove_file(&host)
                .await
                .map_err(|e| Error::from_io(path, &e)),
        }
    }

    async fn list_files(&self, path: &str) -> Result<Vec<String>> {
        let host = self.host_path(&segments(path)?);
        match self.probe(&host, path).await? {
            Probe::Missing => return Err(Error::not_found(path)),
            Probe::File => return Err(Error::type_mismatch(path)),
            Probe::Directory => {}
        }

        let mut reader = tokio::fs::read_dir(&host)
            .await
            .map_err(|e| Error::from_io(path, &e))?;
        let mut names = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| Error::from_io(path, &e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map_err(|e| Error::from_io(path, &e))?
                .is_dir();
            let name = entry.file_name().to_string_lossy().into_owned();
            names.push(entry_name(&name, is_dir));
        }
        names.sort();
        Ok(names)
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        let segs = segments(path)?;
        let host = self.host_path(&segs);

        match (self.policy, self.probe(&host, path).await?) {
            (_, Probe::File) => return Err(Error::already_exists(path)),
            (MkdirPolicy::Recursive, Probe::Directory) => return Ok(()),
            (MkdirPolicy::Exclusive, Probe::Directory) => {
                return Err(Error::already_exists(path));
            }
            (_, Probe::Missing) => {}
        }

        match self.policy {
            MkdirPolicy::Recursive => self.ensure_dir(&host, path).await,
            MkdirPolicy::Exclusive => {
                let parent = self.host_path(&segs[..segs.len() - 1]);
                match self.probe(&parent, path).await? {
                    Probe::Missing => Err(Error::not_found(path)),
                    Probe::File => Err(Error::type_mismatch(path)),
                    Probe::Directory => tokio::fs::create_dir(&host)
                        .await
                        .map_err(|e| Error::from_io(path, &e)),
                }
            }
        }
    }

    async fn rmdir(&self, path: &str) -> Result<()> {
        let segs = segments(path)?;
        if segs.is_empty() {
            return Err(Error::invalid_path(path));
        }
        let host = self.host_path(&segs);
        match self.probe(&host, path).await? {
            Probe::Missing => return Err(Error::not_found(path)),
            Probe::File => return Err(Error::type_mismatch(path)),
            Probe::Directory => {}
        }

        // Refuse before touching anything; there is no recursive delete.
        let mut reader = tokio::fs::read_dir(&host)
            .await
            .map_err(|e| Error::from_io(path, &e))?;
        if reader
            .next_entry()
            .await
            .map_err(|e| Error::from_io(path, &e))?
            .is_some()
        {
            return Err(Error::not_empty(path));
        }

        tokio::fs::remove_dir(&host)
            .await
            .map_err(|e| Error::from_io(path, &e))
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let host = self.host_path(&segments(path)?);
        Ok(self.probe(&host, path).await?.exists())
    }
}
