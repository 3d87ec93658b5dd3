// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Caching decorator for `Storage`
//!
//! Wraps a system of record and mirrors its content into a cache backend
//! under a fixed prefix. The system of record decides every outcome; cache
//! failures are logged and counted, never returned.
//!
//! - `read_file`: read-through, the cache fill runs as a background task
//! - `write_file`, `delete_file`, `mkdir`, `rmdir`: system of record first,
//!   then mirror into the cache
//! - `exists`: a cache hit answers `true`, a miss asks the system of record
//! - `list_files`: system of record only
//!
//! Every cache access for a key happens under that key's lock. A mutation
//! invalidates the fills already started for its key, so a fill carrying
//! older content never lands after it.

use crate::error::{Error, Result};
use crate::locks::PathLocks;
use crate::path::{join_prefix, normalize_prefix};
use crate::storage::{MkdirPolicy, Storage};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

/// Counters kept by the decorator
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub cache_writes: u64,
    pub cache_failures: u64,
}

#[derive(Debug, Default)]
struct KeyFills {
    generation: u64,
    outstanding: usize,
}

/// Generation per cache key, kept only while a fill for the key is outstanding
#[derive(Debug, Default)]
struct FillRegistry {
    keys: std::sync::Mutex<HashMap<String, KeyFills>>,
}

impl FillRegistry {
    fn begin(self: &Arc<Self>, key: String) -> FillTicket {
        let generation = {
            let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
            let fills = keys.entry(key.clone()).or_default();
            fills.outstanding += 1;
            fills.generation
        };
        FillTicket {
            registry: Arc::clone(self),
            key,
            generation,
        }
    }

    fn invalidate(&self, key: &str) {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(fills) = keys.get_mut(key) {
            fills.generation += 1;
        }
    }

    fn generation(&self, key: &str) -> Option<u64> {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|fills| fills.generation)
    }
}

/// Permission to fill one key, valid until the key is next mutated
#[derive(Debug)]
struct FillTicket {
    registry: Arc<FillRegistry>,
    key: String,
    generation: u64,
}

impl FillTicket {
    fn is_current(&self) -> bool {
        self.registry.generation(&self.key) == Some(self.generation)
    }
}

impl Drop for FillTicket {
    fn drop(&mut self) {
        let mut keys = self
            .registry
            .keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(fills) = keys.get_mut(&self.key) {
            fills.outstanding = fills.outstanding.saturating_sub(1);
            if fills.outstanding == 0 {
                _ = keys.remove(&self.key);
            }
        }
    }
}

/// Storage decorator that mirrors a system of record into a cache
pub struct CachingStorage<S: Storage + 'static, C: Storage + 'static> {
    /// Authoritative backend
    inner: Arc<S>,

    cache: Arc<C>,

    /// Cache base prefix, without trailing `/`
    prefix: String,

    /// Serializes cache access per cache key
    key_locks: Arc<PathLocks>,

    fills: Arc<FillRegistry>,

    /// Background cache fills started by `read_file`
    pending: std::sync::Mutex<JoinSet<()>>,

    stats: Arc<Mutex<CacheStats>>,
}

impl<S: Storage + 'static, C: Storage + 'static> CachingStorage<S, C> {
    pub fn new(inner: Arc<S>, cache: Arc<C>, prefix: &str) -> Self {
        Self {
            inner,
            cache,
            prefix: normalize_prefix(prefix),
            key_locks: Arc::new(PathLocks::new()),
            fills: Arc::new(FillRegistry::default()),
            pending: std::sync::Mutex::new(JoinSet::new()),
            stats: Arc::new(Mutex::new(CacheStats::default())),
        }
    }

    #[must_use]
    pub fn inner(&self) -> &Arc<S> {
        &self.inner
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<C> {
        &self.cache
    }

    /// Where `path` lives in the cache backend
    #[must_use]
    pub fn cache_key(&self, path: &str) -> String {
        join_prefix(&self.prefix, path)
    }

    pub async fn stats(&self) -> CacheStats {
        *self.stats.lock().await
    }

    async fn drain_pending(&self) {
        let mut pending = std::mem::take(
            &mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner),
        );
        while let Some(joined) = pending.join_next().await {
            if let Err(e) = joined {
                diagnostics::warn!("cache fill task ended abnormally: {reason}", reason: e.to_string());
            }
        }
    }

    async fn record_hit(&self) {
        self.stats.lock().await.hits += 1;
    }

    async fn record_miss(&self) {
        self.stats.lock().await.misses += 1;
    }

    async fn record_write(&self) {
        self.stats.lock().await.cache_writes += 1;
    }

    async fn record_failure(&self, op: &str, key: &str, err: &Error) {
        self.stats.lock().await.cache_failures += 1;
        diagnostics::warn!(
            "cache {op} for {key} failed: {reason}",
            op: op,
            key: key,
            reason: err.to_string()
        );
    }

    /// Drop a cache entry that may no longer match the system of record.
    /// The caller holds the key lock.
    async fn evict(&self, key: &str) {
        match self.cache.delete_file(key).await {
            Ok(()) | Err(Error::NotFound(_)) => {}
            Err(e) => self.record_failure("evict", key, &e).await,
        }
    }

    /// Fill the cache without making the caller wait
    fn spawn_fill(&self, ticket: FillTicket, data: Bytes) {
        let cache = Arc::clone(&self.cache);
        let stats = Arc::clone(&self.stats);
        let key_locks = Arc::clone(&self.key_locks);
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);

        // Reap finished fills so the set does not grow without bound
        while pending.try_join_next().is_some() {}

        _ = pending.spawn(async move {
            let key = ticket.key.as_str();
            let _guard = key_locks.lock(key).await;
            if !ticket.is_current() {
                diagnostics::debug!("cache fill for {key} skipped, key changed since the read", key: key);
                return;
            }
            match cache.write_file(key, data).await {
                Ok(()) => {
                    stats.lock().await.cache_writes += 1;
                    diagnostics::debug!("cache filled {key}", key: key);
                }
                Err(e) => {
                    stats.lock().await.cache_failures += 1;
                    diagnostics::warn!(
                        "cache fill for {key} failed: {reason}",
                        key: key,
                        reason: e.to_string()
                    );
                }
            }
        });
    }
}

#[async_trait]
impl<S: Storage + 'static, C: Storage + 'static> Storage for CachingStorage<S, C> {
    fn name(&self) -> &'static str {
        "caching"
    }

    fn mkdir_policy(&self) -> MkdirPolicy {
        self.inner.mkdir_policy()
    }

    async fn settle(&self) {
        self.drain_pending().await;
        self.inner.settle().await;
    }

    async fn read_file(&self, path: &str) -> Result<Bytes> {
        let key = self.cache_key(path);
        let cached = {
            let _guard = self.key_locks.lock(&key).await;
            self.cache.read_file(&key).await
        };
        match cached {
            Ok(data) => {
                self.record_hit().await;
                diagnostics::debug!("cache HIT for {path}", path: path);
                return Ok(data);
            }
            Err(e) => {
                self.record_miss().await;
                diagnostics::debug!("cache MISS for {path}: {reason}", path: path, reason: e.to_string());
            }
        }

        // Taken before reading so a mutation racing the read voids the fill
        let ticket = self.fills.begin(key);
        let data = self.inner.read_file(path).await?;
        self.spawn_fill(ticket, data.clone());
        Ok(data)
    }

    async fn write_file(&self, path: &str, content: Bytes) -> Result<()> {
        self.inner.write_file(path, content.clone()).await?;

        let key = self.cache_key(path);
        self.fills.invalidate(&key);
        let _guard = self.key_locks.lock(&key).await;
        match self.cache.write_file(&key, content).await {
            Ok(()) => self.record_write().await,
            Err(e) => {
                self.record_failure("write", &key, &e).await;
                self.evict(&key).await;
            }
        }
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        self.inner.delete_file(path).await?;

        let key = self.cache_key(path);
        self.fills.invalidate(&key);
        let _guard = self.key_locks.lock(&key).await;
        match self.cache.exists(&key).await {
            Ok(true) => {
                if let Err(e) = self.cache.delete_file(&key).await {
                    self.record_failure("delete", &key, &e).await;
                }
            }
            Ok(false) => {}
            Err(e) => self.record_failure("exists", &key, &e).await,
        }
        Ok(())
    }

    async fn list_files(&self, path: &str) -> Result<Vec<String>> {
        self.inner.list_files(path).await
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        self.inner.mkdir(path).await?;

        let key = self.cache_key(path);
        self.fills.invalidate(&key);
        let _guard = self.key_locks.lock(&key).await;
        match self.cache.mkdir(&key).await {
            Ok(()) | Err(Error::AlreadyExists(_)) => {}
            Err(e) => self.record_failure("mkdir", &key, &e).await,
        }
        Ok(())
    }

    async fn rmdir(&self, path: &str) -> Result<()> {
        self.inner.rmdir(path).await?;

        let key = self.cache_key(path);
        self.fills.invalidate(&key);
        let _guard = self.key_locks.lock(&key).await;
        match self.cache.exists(&key).await {
            Ok(true) => {
                if let Err(e) = self.cache.rmdir(&key).await {
                    self.record_failure("rmdir", &key, &e).await;
                }
            }
            Ok(false) => {}
            Err(e) => self.record_failure("exists", &key, &e).await,
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let key = self.cache_key(path);
        let cached = {
            let _guard = self.key_locks.lock(&key).await;
            self.cache.exists(&key).await
        };
        match cached {
            Ok(true) => {
                self.record_hit().await;
                return Ok(true);
            }
            Ok(false) => self.record_miss().await,
            Err(e) => {
                self.record_miss().await;
                diagnostics::debug!("cache exists for {key} failed: {reason}", key: key.as_str(), reason: e.to_string());
            }
        }

        match self.inner.exists(path).await {
            Ok(found) => Ok(found),
            // A malformed path names nothing on any backend, so it stays an
            // error instead of reading as absent
            Err(e @ Error::InvalidPath(_)) => Err(e),
            Err(e) => {
                diagnostics::warn!(
                    "exists for {path} failed on {backend}, answering false: {reason}",
                    path: path,
                    backend: self.inner.name(),
                    reason: e.to_string()
                );
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingStorage, Op};
    use std::time::Duration;

    type Decorated = CachingStorage<CountingStorage, CountingStorage>;

    fn setup(prefix: &str) -> (Arc<CountingStorage>, Arc<CountingStorage>, Decorated) {
        let sor = Arc::new(CountingStorage::default());
        let cache = Arc::new(CountingStorage::recursive());
        let decorated = CachingStorage::new(Arc::clone(&sor), Arc::clone(&cache), prefix);
        (sor, cache, decorated)
    }

    #[test]
    fn test_cache_key_prefix() {
        let (_, _, decorated) = setup("/");
        assert_eq!(decorated.cache_key("b/f.txt"), "b/f.txt");

        let (_, _, decorated) = setup(".cache/remote/");
        assert_eq!(decorated.cache_key("/b/f.txt"), ".cache/remote/b/f.txt");
        assert_eq!(decorated.cache_key("b/dir/"), ".cache/remote/b/dir/");
    }

    #[tokio::test]
    async fn test_read_through_then_hit() {
        let (sor, cache, decorated) = setup(".cache");
        sor.write_file("b/f.txt", Bytes::from_static(b"remote")).await.unwrap();

        let first = decorated.read_file("b/f.txt").await.unwrap();
        assert_eq!(first, Bytes::from_static(b"remote"));
        assert_eq!(sor.calls(Op::Read), 1);

        decorated.settle().await;
        assert!(cache.exists(".cache/b/f.txt").await.unwrap());

        let second = decorated.read_file("b/f.txt").await.unwrap();
        assert_eq!(second, first);
        assert_eq!(sor.calls(Op::Read), 1);

        let stats = decorated.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.cache_writes, 1);
    }

    #[tokio::test]
    async fn test_read_survives_broken_cache() {
        let (sor, cache, decorated) = setup("");
        sor.write_file("b/f.txt", Bytes::from_static(b"x")).await.unwrap();
        cache.fail_everything(true);

        let data = decorated.read_file("b/f.txt").await.unwrap();
        assert_eq!(data, Bytes::from_static(b"x"));
        decorated.settle().await;
        assert_eq!(decorated.stats().await.cache_failures, 1);
    }

    #[tokio::test]
    async fn test_read_miss_everywhere() {
        let (_sor, _cache, decorated) = setup("");
        assert!(matches!(
            decorated.read_file("b/none").await,
            Err(Error::NotFound(_))
        ));
        decorated.settle().await;
        assert_eq!(decorated.stats().await.cache_writes, 0);
    }

    #[tokio::test]
    async fn test_failed_write_never_touches_cache() {
        let (sor, cache, decorated) = setup(".cache");
        sor.fail_everything(true);

        let result = decorated.write_file("b/f.txt", Bytes::from_static(b"x")).await;
        assert!(matches!(result, Err(Error::BackendUnavailable(_))));
        assert_eq!(cache.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_write_survives_cache_failure() {
        let (sor, cache, decorated) = setup(".cache");
        cache.fail_on(Op::Write, true);

        decorated
            .write_file("b/f.txt", Bytes::from_static(b"x"))
            .await
            .unwrap();
        cache.fail_on(Op::Write, false);

        assert_eq!(
            sor.read_file("b/f.txt").await.unwrap(),
            Bytes::from_static(b"x")
        );
        assert!(!cache.exists(".cache/b/f.txt").await.unwrap());
        assert_eq!(decorated.stats().await.cache_failures, 1);
    }

    #[tokio::test]
    async fn test_failed_write_through_evicts_old_copy() {
        let (_sor, cache, decorated) = setup(".cache");
        decorated
            .write_file("b/f.txt", Bytes::from_static(b"old"))
            .await
            .unwrap();

        cache.fail_on(Op::Write, true);
        decorated
            .write_file("b/f.txt", Bytes::from_static(b"new"))
            .await
            .unwrap();
        cache.fail_on(Op::Write, false);

        assert!(!cache.exists(".cache/b/f.txt").await.unwrap());
        assert_eq!(
            decorated.read_file("b/f.txt").await.unwrap(),
            Bytes::from_static(b"new")
        );
    }

    #[tokio::test]
    async fn test_fill_does_not_resurrect_deleted_file() {
        let (sor, cache, decorated) = setup(".cache");
        sor.write_file("b/f.txt", Bytes::from_static(b"old"))
            .await
            .unwrap();
        cache.delay_writes(Duration::from_millis(30));

        assert_eq!(
            decorated.read_file("b/f.txt").await.unwrap(),
            Bytes::from_static(b"old")
        );
        decorated.delete_file("b/f.txt").await.unwrap();
        decorated.settle().await;

        assert!(!decorated.exists("b/f.txt").await.unwrap());
        assert!(!cache.exists(".cache/b/f.txt").await.unwrap());
        assert!(matches!(
            decorated.read_file("b/f.txt").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fill_does_not_undo_later_write() {
        let (sor, cache, decorated) = setup(".cache");
        sor.write_file("b/f.txt", Bytes::from_static(b"old"))
            .await
            .unwrap();
        cache.delay_writes(Duration::from_millis(30));

        _ = decorated.read_file("b/f.txt").await.unwrap();
        decorated
            .write_file("b/f.txt", Bytes::from_static(b"new"))
            .await
            .unwrap();
        decorated.settle().await;

        assert_eq!(
            cache.read_file(".cache/b/f.txt").await.unwrap(),
            Bytes::from_static(b"new")
        );
        assert_eq!(
            decorated.read_file("b/f.txt").await.unwrap(),
            Bytes::from_static(b"new")
        );
    }

    #[tokio::test]
    async fn test_fill_runs_when_nothing_changed() {
        let (sor, cache, decorated) = setup(".cache");
        sor.write_file("b/f.txt", Bytes::from_static(b"x"))
            .await
            .unwrap();
        cache.delay_writes(Duration::from_millis(10));

        _ = decorated.read_file("b/f.txt").await.unwrap();
        _ = decorated.read_file("b/f.txt").await.unwrap();
        decorated.settle().await;

        assert!(cache.exists(".cache/b/f.txt").await.unwrap());
        assert!(decorated.fills.keys.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_through_populates_cache() {
        let (_sor, cache, decorated) = setup(".cache");
        decorated
            .write_file("b/f.txt", Bytes::from_static(b"x"))
            .await
            .unwrap();
        assert_eq!(
            cache.read_file(".cache/b/f.txt").await.unwrap(),
            Bytes::from_static(b"x")
        );
    }

    #[tokio::test]
    async fn test_delete_clears_cache() {
        let (sor, cache, decorated) = setup(".cache");
        decorated
            .write_file("b/f.txt", Bytes::from_static(b"x"))
            .await
            .unwrap();

        decorated.delete_file("b/f.txt").await.unwrap();
        assert!(!sor.exists("b/f.txt").await.unwrap());
        assert!(!cache.exists(".cache/b/f.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_cache() {
        let (sor, cache, decorated) = setup(".cache");
        decorated
            .write_file("b/f.txt", Bytes::from_static(b"x"))
            .await
            .unwrap();
        let before = cache.total_calls();

        sor.fail_everything(true);
        assert!(decorated.delete_file("b/f.txt").await.is_err());
        assert_eq!(cache.total_calls(), before);
    }

    #[tokio::test]
    async fn test_exists_cache_aside() {
        let (sor, cache, decorated) = setup(".cache");
        cache
            .write_file(".cache/b/cached.txt", Bytes::new())
            .await
            .unwrap();

        assert!(decorated.exists("b/cached.txt").await.unwrap());
        assert_eq!(sor.calls(Op::Exists), 0);

        sor.write_file("b/remote.txt", Bytes::new()).await.unwrap();
        assert!(decorated.exists("b/remote.txt").await.unwrap());
        assert_eq!(sor.calls(Op::Exists), 1);

        // A miss never fills the cache
        assert!(!cache.exists(".cache/b/remote.txt").await.unwrap());
        assert_eq!(cache.calls(Op::Write), 1);
    }

    #[tokio::test]
    async fn test_exists_is_total() {
        let (sor, _cache, decorated) = setup("");
        sor.fail_everything(true);
        assert!(!decorated.exists("b/f.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_bypasses_cache() {
        let (sor, cache, decorated) = setup(".cache");
        sor.write_file("b/dir/f.txt", Bytes::new()).await.unwrap();

        assert_eq!(decorated.list_files("b/dir/").await.unwrap(), vec!["f.txt"]);
        assert_eq!(cache.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_mkdir_rmdir_mirror() {
        let (sor, cache, decorated) = setup(".cache");
        decorated.mkdir("b/").await.unwrap();
        decorated.mkdir("b/dir/").await.unwrap();
        assert!(sor.exists("b/dir/").await.unwrap());
        assert!(cache.exists(".cache/b/dir/").await.unwrap());

        decorated.rmdir("b/dir/").await.unwrap();
        assert!(!sor.exists("b/dir/").await.unwrap());
        assert!(!cache.exists(".cache/b/dir/").await.unwrap());
    }

    #[tokio::test]
    async fn test_mkdir_survives_cache_failure() {
        let (sor, cache, decorated) = setup(".cache");
        cache.fail_everything(true);
        decorated.mkdir("b/").await.unwrap();
        assert!(sor.exists("b/").await.unwrap());
        assert_eq!(decorated.stats().await.cache_failures, 1);
    }

    #[tokio::test]
    async fn test_rmdir_failure_is_authoritative() {
        let (sor, cache, decorated) = setup(".cache");
        decorated
            .write_file("b/dir/f.txt", Bytes::new())
            .await
            .unwrap();
        let before = cache.total_calls();

        assert!(matches!(
            decorated.rmdir("b/dir/").await,
            Err(Error::NotEmpty(_))
        ));
        assert_eq!(cache.total_calls(), before);
        assert!(sor.exists("b/dir/f.txt").await.unwrap());
    }
}
