// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! unifs - one file-storage surface over volatile, local and remote backends
//!
//! Paths start with a prefix segment that selects the backend:
//! - `mem/...` in-process memory, lost on exit
//! - `local/...` a host directory tree
//! - `remote/<bucket>/...` object storage, read through a local cache
//!
//! Set `UNIFS_LOG` to control logging (`off`, `error`, `warn`, `info`, `debug`).

// Capability contract and its errors
pub mod error;
pub mod storage;

pub mod path;

// Backends
pub mod local;
pub mod memory;
pub mod object;
pub mod remote;

/// Read-through / write-through cache decorator
pub mod caching;

pub mod config;
pub mod locks;
pub mod router;

#[cfg(test)]
pub(crate) mod testing;

pub use caching::{CacheStats, CachingStorage};
pub use config::{Prefixes, StoreConfig};
pub use error::{Error, Result};
pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use object::{ObjectClient, ObjectStoreClient};
pub use remote::RemoteStorage;
pub use router::{Route, Router, Session};
pub use storage::{MkdirPolicy, Storage};
