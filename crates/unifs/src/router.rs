// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Prefix router over the volatile, local and remote backends.
//!
//! The first path segment picks the backend. The rest of the path, with the
//! prefix and its separator removed, is what the backend sees. Remote paths
//! require a session.

use crate::caching::CachingStorage;
use crate::config::{Prefixes, StoreConfig};
use crate::error::{Error, Result};
use crate::local::LocalStorage;
use crate::locks::PathLocks;
use crate::memory::MemoryStorage;
use crate::object::ObjectStoreClient;
use crate::remote::RemoteStorage;
use crate::storage::{MkdirPolicy, Storage};
use bytes::Bytes;
use std::sync::Arc;

/// Opaque token identifying an authenticated caller
#[derive(Clone, PartialEq, Eq)]
pub struct Session(String);

impl Session {
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Session(..)")
    }
}

/// Backend chosen by a path's first segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Volatile,
    Local,
    Remote,
}

pub struct Router {
    prefixes: Prefixes,
    volatile: Arc<dyn Storage>,
    local: Arc<dyn Storage>,
    remote: Arc<dyn Storage>,
    locks: PathLocks,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("prefixes", &self.prefixes)
            .field("volatile", &self.volatile.name())
            .field("local", &self.local.name())
            .field("remote", &self.remote.name())
            .finish_non_exhaustive()
    }
}

impl Router {
    pub fn new(
        prefixes: Prefixes,
        volatile: Arc<dyn Storage>,
        local: Arc<dyn Storage>,
        remote: Arc<dyn Storage>,
    ) -> Result<Self> {
        prefixes.validate()?;
        Ok(Self {
            prefixes,
            volatile,
            local,
            remote,
            locks: PathLocks::new(),
        })
    }

    /// Build every backend described by `config`
    pub async fn from_config(config: &StoreConfig) -> Result<Self> {
        config.validate()?;

        let volatile = Arc::new(MemoryStorage::new(config.volatile.mkdir));
        let local = LocalStorage::open(&config.local.root, config.local.mkdir).await?;

        let mut client = ObjectStoreClient::new();
        for (name, bucket) in &config.remote.buckets {
            client
                .insert_bucket_url(name.as_str(), &bucket.url, &bucket.options)
                .map_err(|e| Error::config(e.to_string()))?;
        }
        let remote = Arc::new(RemoteStorage::new(client));

        let remote: Arc<dyn Storage> = if config.cache.enabled {
            let cache = Arc::new(local.with_policy(MkdirPolicy::Recursive));
            Arc::new(CachingStorage::new(remote, cache, &config.cache.prefix))
        } else {
            remote
        };

        diagnostics::info!(
            "router ready: local root {root}, cache {cache}",
            root: local.root_path().display().to_string(),
            cache: config.cache.enabled
        );

        Self::new(config.prefixes.clone(), volatile, Arc::new(local), remote)
    }

    #[must_use]
    pub fn prefixes(&self) -> &Prefixes {
        &self.prefixes
    }

    /// Pick the backend for `path` and return the backend-relative remainder
    pub fn route<'p>(&self, path: &'p str, session: Option<&Session>) -> Result<(Route, &'p str)> {
        let (head, rest) = path.split_once('/').unwrap_or((path, ""));

        let route = if head == self.prefixes.volatile {
            Route::Volatile
        } else if head == self.prefixes.local {
            Route::Local
        } else if head == self.prefixes.remote {
            Route::Remote
        } else {
            return Err(Error::invalid_path(path));
        };

        if route == Route::Remote && session.is_none() {
            return Err(Error::permission_denied(path));
        }

        Ok((route, rest))
    }

    fn backend(&self, route: Route) -> &Arc<dyn Storage> {
        match route {
            Route::Volatile => &self.volatile,
            Route::Local => &self.local,
            Route::Remote => &self.remote,
        }
    }

    fn dispatch<'p>(
        &self,
        op: &str,
        path: &'p str,
        session: Option<&Session>,
    ) -> Result<(&Arc<dyn Storage>, &'p str)> {
        match self.route(path, session) {
            Ok((route, rest)) => {
                let backend = self.backend(route);
                diagnostics::debug!(
                    "{op} {path} on {backend}",
                    op: op,
                    path: path,
                    backend: backend.name()
                );
                Ok((backend, rest))
            }
            Err(e) => {
                diagnostics::debug!("{op} {path} rejected: {reason}", op: op, path: path, reason: e.to_string());
                Err(e)
            }
        }
    }

    pub async fn read_file(&self, path: &str, session: Option<&Session>) -> Result<Bytes> {
        let (backend, rest) = self.dispatch("read_file", path, session)?;
        let _guard = self.locks.lock(path).await;
        backend.read_file(rest).await
    }

    pub async fn write_file(
        &self,
        path: &str,
        content: Bytes,
        session: Option<&Session>,
    ) -> Result<()> {
        let (backend, rest) = self.dispatch("write_file", path, session)?;
        let _guard = self.locks.lock(path).await;
        backend.write_file(rest, content).await
    }

    pub async fn delete_file(&self, path: &str, session: Option<&Session>) -> Result<()> {
        let (backend, rest) = self.dispatch("delete_file", path, session)?;
        let _guard = self.locks.lock(path).await;
        backend.delete_file(rest).await
    }

    pub async fn list_files(&self, path: &str, session: Option<&Session>) -> Result<Vec<String>> {
        let (backend, rest) = self.dispatch("list_files", path, session)?;
        let _guard = self.locks.lock(path).await;
        backend.list_files(rest).await
    }

    pub async fn mkdir(&self, path: &str, session: Option<&Session>) -> Result<()> {
        let (backend, rest) = self.dispatch("mkdir", path, session)?;
        let _guard = self.locks.lock(path).await;
        backend.mkdir(rest).await
    }

    pub async fn rmdir(&self, path: &str, session: Option<&Session>) -> Result<()> {
        let (backend, rest) = self.dispatch("rmdir", path, session)?;
        let _guard = self.locks.lock(path).await;
        backend.rmdir(rest).await
    }

    pub async fn exists(&self, path: &str, session: Option<&Session>) -> Result<bool> {
        let (backend, rest) = self.dispatch("exists", path, session)?;
        let _guard = self.locks.lock(path).await;
        backend.exists(rest).await
    }

    /// Wait for background cache fills on every backend
    pub async fn settle(&self) {
        self.volatile.settle().await;
        self.local.settle().await;
        self.remote.settle().await;
    }
}
