// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Test doubles shared by unit tests

use crate::error::{Error, Result};
use crate::memory::MemoryStorage;
use crate::storage::{MkdirPolicy, Storage};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Read,
    Write,
    Delete,
    List,
    Mkdir,
    Rmdir,
    Exists,
}

const OPS: usize = 7;

/// Memory storage that counts calls per operation and can be told to fail
/// or to stall its writes
pub struct CountingStorage {
    inner: MemoryStorage,
    calls: [AtomicUsize; OPS],
    failing: [AtomicBool; OPS],
    write_delay_ms: AtomicU64,
}

impl Default for CountingStorage {
    fn default() -> Self {
        Self::with_policy(MkdirPolicy::Exclusive)
    }
}

impl CountingStorage {
    pub fn recursive() -> Self {
        Self::with_policy(MkdirPolicy::Recursive)
    }

    pub fn with_policy(policy: MkdirPolicy) -> Self {
        Self {
            inner: MemoryStorage::new(policy),
            calls: Default::default(),
            failing: Default::default(),
            write_delay_ms: AtomicU64::new(0),
        }
    }

    /// Make every operation fail with `BackendUnavailable`
    pub fn fail_everything(&self, failing: bool) {
        for flag in &self.failing {
            flag.store(failing, Ordering::SeqCst);
        }
    }

    pub fn fail_on(&self, op: Op, failing: bool) {
        self.failing[op as usize].store(failing, Ordering::SeqCst);
    }

    /// Sleep before every write lands
    pub fn delay_writes(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.write_delay_ms.store(millis, Ordering::SeqCst);
    }

    pub fn calls(&self, op: Op) -> usize {
        self.calls[op as usize].load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.iter().map(|c| c.load(Ordering::SeqCst)).sum()
    }

    fn enter(&self, op: Op) -> Result<()> {
        _ = self.calls[op as usize].fetch_add(1, Ordering::SeqCst);
        if self.failing[op as usize].load(Ordering::SeqCst) {
            Err(Error::backend_unavailable("injected failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Storage for CountingStorage {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn mkdir_policy(&self) -> MkdirPolicy {
        self.inner.mkdir_policy()
    }

    async fn read_file(&self, path: &str) -> Result<Bytes> {
        self.enter(Op::Read)?;
        self.inner.read_file(path).await
    }

    async fn write_file(&self, path: &str, content: Bytes) -> Result<()> {
        self.enter(Op::Write)?;
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.inner.write_file(path, content).await
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        self.enter(Op::Delete)?;
        self.inner.delete_file(path).await
    }

    async fn list_files(&self, path: &str) -> Result<Vec<String>> {
        self.enter(Op::List)?;
        self.inner.list_files(path).await
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        self.enter(Op::Mkdir)?;
        self.inner.mkdir(path).await
    }

    async fn rmdir(&self, path: &str) -> Result<()> {
        self.enter(Op::Rmdir)?;
        self.inner.rmdir(path).await
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        self.enter(Op::Exists)?;
        self.inner.exists(path).await
    }
}
