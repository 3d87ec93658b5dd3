// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Path helpers shared by the hierarchical backends.
//!
//! Paths are plain `/`-separated strings. A trailing `/` marks a directory.

use crate::error::{Error, Result};

/// Result of looking a path up in a hierarchical backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Missing,
    File,
    Directory,
}

impl Probe {
    #[must_use]
    pub fn exists(self) -> bool {
        !matches!(self, Probe::Missing)
    }
}

/// True when the path names a directory by convention
#[must_use]
pub fn is_dir_path(path: &str) -> bool {
    path.ends_with('/')
}

/// Split a path into its segments after trimming leading and trailing `/`.
///
/// The empty path (or `/`) is the root and yields no segments. Empty inner
/// segments, `.` and `..` are rejected.
pub fn segments(path: &str) -> Result<Vec<&str>> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let parts: Vec<&str> = trimmed.split('/').collect();
    if parts.iter().any(|p| p.is_empty() || *p == "." || *p == "..") {
        return Err(Error::invalid_path(path));
    }
    Ok(parts)
}

/// Normalize a cache base prefix: no trailing `/`, and the root collapses to
/// the empty string.
#[must_use]
pub fn normalize_prefix(prefix: &str) -> String {
    prefix.trim_end_matches('/').to_string()
}

/// Join a normalized prefix and a path, dropping the path's leading `/`.
#[must_use]
pub fn join_prefix(prefix: &str, path: &str) -> String {
    let path = path.trim_start_matches('/');
    if prefix.is_empty() {
        path.to_string()
    } else {
        format!("{prefix}/{path}")
    }
}

/// Render a child name for a listing, with `/` appended for directories
#[must_use]
pub fn entry_name(name: &str, is_dir: bool) -> String {
    if is_dir {
        format!("{name}/")
    } else {
        name.to_string()
    }
}
