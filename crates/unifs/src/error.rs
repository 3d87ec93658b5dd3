// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by storage backends and the router
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Unknown prefix, missing bucket, or a malformed path segment
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Remote access attempted without a session
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Entry already exists: {0}")]
    AlreadyExists(String),

    #[error("Directory not empty: {0}")]
    NotEmpty(String),

    /// File used where a directory was expected, or the reverse
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// The underlying storage could not be reached or failed for a reason
    /// outside the taxonomy above
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Cache problems are logged and swallowed by the caching layer, this
    /// variant only describes them
    #[error("Cache failure: {0}")]
    CacheFailure(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn invalid_path<S: AsRef<str>>(path: S) -> Self {
        Error::InvalidPath(path.as_ref().into())
    }

    pub fn permission_denied<S: AsRef<str>>(path: S) -> Self {
        Error::PermissionDenied(path.as_ref().into())
    }

    pub fn not_found<S: AsRef<str>>(path: S) -> Self {
        Error::NotFound(path.as_ref().into())
    }

    pub fn already_exists<S: AsRef<str>>(path: S) -> Self {
        Error::AlreadyExists(path.as_ref().into())
    }

    pub fn not_empty<S: AsRef<str>>(path: S) -> Self {
        Error::NotEmpty(path.as_ref().into())
    }

    pub fn type_mismatch<S: AsRef<str>>(path: S) -> Self {
        Error::TypeMismatch(path.as_ref().into())
    }

    pub fn backend_unavailable<S: AsRef<str>>(reason: S) -> Self {
        Error::BackendUnavailable(reason.as_ref().into())
    }

    pub fn cache_failure<S: AsRef<str>>(reason: S) -> Self {
        Error::CacheFailure(reason.as_ref().into())
    }

    pub fn config<S: AsRef<str>>(reason: S) -> Self {
        Error::Config(reason.as_ref().into())
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Map a host I/O error on `path` into the taxonomy
    pub fn from_io(path: &str, err: &std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::NotFound => Error::not_found(path),
            ErrorKind::AlreadyExists => Error::already_exists(path),
            ErrorKind::DirectoryNotEmpty => Error::not_empty(path),
            ErrorKind::NotADirectory | ErrorKind::IsADirectory => Error::type_mismatch(path),
            _ => Error::BackendUnavailable(format!("{path}: {err}")),
        }
    }
}
