// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! YAML configuration for a router.
//!
//! Every field has a default, so an empty document is a valid configuration
//! with no remote buckets.

use crate::error::{Error, Result};
use crate::path::segments;
use crate::storage::MkdirPolicy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Overrides `local.root` when set
pub const ROOT_ENV: &str = "UNIFS_ROOT";

/// First path segment that selects each backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Prefixes {
    pub volatile: String,
    pub local: String,
    pub remote: String,
}

impl Default for Prefixes {
    fn default() -> Self {
        Self {
            volatile: "mem".into(),
            local: "local".into(),
            remote: "remote".into(),
        }
    }
}

impl Prefixes {
    pub fn validate(&self) -> Result<()> {
        let all = [&self.volatile, &self.local, &self.remote];
        for prefix in all {
            if prefix.is_empty() || prefix.contains('/') {
                return Err(Error::config(format!(
                    "prefix '{prefix}' must be a single non-empty path segment"
                )));
            }
        }
        let distinct: HashSet<&String> = all.into_iter().collect();
        if distinct.len() != all.len() {
            return Err(Error::config(format!(
                "prefixes must be distinct: {}, {}, {}",
                self.volatile, self.local, self.remote
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VolatileConfig {
    pub mkdir: MkdirPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocalConfig {
    pub root: PathBuf,
    pub mkdir: MkdirPolicy,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./unifs-data"),
            mkdir: MkdirPolicy::default(),
        }
    }
}

/// One named bucket. `url` is any URL `object_store` understands
/// (`memory://`, `file:///path`, `s3://bucket/prefix`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BucketConfig {
    pub url: String,

    /// Passed to the store builder, e.g. `region`, `endpoint`
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfig {
    pub buckets: BTreeMap<String, BucketConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub enabled: bool,

    /// Location of mirrored remote content inside the local root
    pub prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: ".remote-cache".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub prefixes: Prefixes,
    pub volatile: VolatileConfig,
    pub local: LocalConfig,
    pub remote: RemoteConfig,
    pub cache: CacheConfig,
}

impl StoreConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(text)
            .map_err(|e| Error::config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {e}", path.display())))?;
        let config = Self::from_yaml(&text)?;
        diagnostics::debug!("loaded configuration from {path}", path: path.display().to_string());
        Ok(config)
    }

    /// Apply `UNIFS_ROOT` if it is set
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(root) = std::env::var(ROOT_ENV) {
            if !root.is_empty() {
                self.local.root = PathBuf::from(root);
            }
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.prefixes.validate()?;

        if self.cache.enabled {
            _ = segments(&self.cache.prefix).map_err(|_| {
                Error::config(format!("invalid cache prefix '{}'", self.cache.prefix))
            })?;
        }

        for name in self.remote.buckets.keys() {
            if name.is_empty() || name.contains('/') {
                return Err(Error::config(format!("invalid bucket name '{name}'")));
            }
        }
        Ok(())
    }
}
