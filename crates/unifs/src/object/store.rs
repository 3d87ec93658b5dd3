// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! `ObjectClient` over the `object_store` crate.
//!
//! Each bucket name maps to its own `ObjectStore`. Object store paths cannot
//! end in `/`, so a directory marker `a/b/` is stored as the object
//! `a/b/.emptyFolderPlaceholder` and translated back when listing.

use super::{ListOptions, ObjectClient, ObjectEntry, ObjectError};
use async_trait::async_trait;
use bytes::Bytes;
use object_store::path::Path as StorePath;
use object_store::prefix::PrefixStore;
use object_store::{ObjectStore, PutMode, PutOptions, PutPayload};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use url::Url;

/// Leaf name standing in for a directory marker inside an object store
pub const FOLDER_PLACEHOLDER: &str = ".emptyFolderPlaceholder";

/// Registry of named buckets, each backed by an `ObjectStore`
#[derive(Clone, Default)]
pub struct ObjectStoreClient {
    buckets: HashMap<String, Arc<dyn ObjectStore>>,
}

impl std::fmt::Debug for ObjectStoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.buckets.keys().collect();
        names.sort();
        f.debug_struct("ObjectStoreClient")
            .field("buckets", &names)
            .finish()
    }
}

impl ObjectStoreClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bucket backed by an existing store
    pub fn insert_bucket<S: Into<String>>(&mut self, name: S, store: Arc<dyn ObjectStore>) {
        _ = self.buckets.insert(name.into(), store);
    }

    #[must_use]
    pub fn with_bucket<S: Into<String>>(mut self, name: S, store: Arc<dyn ObjectStore>) -> Self {
        self.insert_bucket(name, store);
        self
    }

    /// Register a bucket from a URL such as `memory://`, `file:///srv/objects`
    /// or `s3://bucket/prefix`. Options are passed to the store builder
    /// (region, credentials, endpoint).
    pub fn insert_bucket_url<S: Into<String>>(
        &mut self,
        name: S,
        url: &str,
        options: &BTreeMap<String, String>,
    ) -> Result<(), ObjectError> {
        let name = name.into();
        let parsed = Url::parse(url)
            .map_err(|e| ObjectError::Transport(format!("bucket {name}: invalid url {url}: {e}")))?;
        let (store, prefix) = object_store::parse_url_opts(&parsed, options.iter())
            .map_err(|e| ObjectError::Transport(format!("bucket {name}: {e}")))?;
        let store: Arc<dyn ObjectStore> = Arc::from(store);

        let store: Arc<dyn ObjectStore> = if prefix.as_ref().is_empty() {
            store
        } else {
            Arc::new(PrefixStore::new(store, prefix))
        };

        diagnostics::info!("registered bucket {name} at {url}", name: name.as_str(), url: url);
        self.insert_bucket(name, store);
        Ok(())
    }

    #[must_use]
    pub fn bucket_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.buckets.keys().cloned().collect();
        names.sort();
        names
    }

    fn bucket(&self, bucket: &str) -> Result<&Arc<dyn ObjectStore>, ObjectError> {
        self.buckets
            .get(bucket)
            .ok_or_else(|| ObjectError::BucketNotFound(bucket.to_string()))
    }
}

/// Translate a wire key into an object store path
fn store_path(key: &str) -> Result<StorePath, ObjectError> {
    let raw = if key.ends_with('/') {
        format!("{key}{FOLDER_PLACEHOLDER}")
    } else {
        key.to_string()
    };
    if raw.is_empty() {
        return Err(ObjectError::InvalidKey(key.to_string()));
    }
    StorePath::parse(&raw).map_err(|e| ObjectError::InvalidKey(format!("{key}: {e}")))
}

fn map_store_error(key: &str, err: object_store::Error) -> ObjectError {
    match err {
        object_store::Error::NotFound { .. } => ObjectError::NotFound(key.to_string()),
        object_store::Error::AlreadyExists { .. } => ObjectError::Duplicate(key.to_string()),
        other => ObjectError::Transport(format!("{key}: {other}")),
    }
}

#[async_trait]
impl ObjectClient for ObjectStoreClient {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        upsert: bool,
    ) -> Result<(), ObjectError> {
        let store = self.bucket(bucket)?;
        let location = store_path(key)?;
        let mode = if upsert {
            PutMode::Overwrite
        } else {
            PutMode::Create
        };
        _ = store
            .put_opts(&location, PutPayload::from(data), PutOptions::from(mode))
            .await
            .map_err(|e| map_store_error(key, e))?;
        Ok(())
    }

    async fn download(&self, bucket: &str, key: &str) -> Result<Bytes, ObjectError> {
        let store = self.bucket(bucket)?;
        let location = store_path(key)?;
        store
            .get(&location)
            .await
            .map_err(|e| map_store_error(key, e))?
            .bytes()
            .await
            .map_err(|e| map_store_error(key, e))
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        options: &ListOptions,
    ) -> Result<Vec<ObjectEntry>, ObjectError> {
        let store = self.bucket(bucket)?;
        let prefix_key = prefix.unwrap_or("");
        let location = match prefix_key.trim_matches('/') {
            "" => None,
            trimmed => Some(
                StorePath::parse(trimmed)
                    .map_err(|e| ObjectError::InvalidKey(format!("{prefix_key}: {e}")))?,
            ),
        };

        let listing = store
            .list_with_delimiter(location.as_ref())
            .await
            .map_err(|e| map_store_error(prefix_key, e))?;

        let mut names = Vec::with_capacity(listing.common_prefixes.len() + listing.objects.len());
        for dir in &listing.common_prefixes {
            if let Some(name) = dir.filename() {
                names.push(format!("{name}/"));
            }
        }
        for object in &listing.objects {
            match object.location.filename() {
                Some(FOLDER_PLACEHOLDER) => names.push(String::new()),
                Some(name) => names.push(name.to_string()),
                None => {}
            }
        }
        Ok(options.apply(names))
    }

    async fn remove(&self, bucket: &str, keys: &[String]) -> Result<(), ObjectError> {
        let store = self.bucket(bucket)?;
        for key in keys {
            let location = store_path(key)?;
            store
                .delete(&location)
                .await
                .map_err(|e| map_store_error(key, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn client() -> ObjectStoreClient {
        ObjectStoreClient::new().with_bucket("b", Arc::new(InMemory::new()))
    }

    fn names(entries: Vec<ObjectEntry>) -> Vec<String> {
        entries.into_iter().map(|e| e.name).collect()
    }

    #[tokio::test]
    async fn test_upload_download() {
        let client = client();
        client
            .upload("b", "dir/f.txt", Bytes::from_static(b"x"), true)
            .await
            .unwrap();
        let data = client.download("b", "dir/f.txt").await.unwrap();
        assert_eq!(data, Bytes::from_static(b"x"));
    }

    #[tokio::test]
    async fn test_unknown_bucket() {
        let client = client();
        let err = client
            .list("missing", None, &ListOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, ObjectError::BucketNotFound("missing".into()));
    }

    #[tokio::test]
    async fn test_create_only_upload_is_duplicate() {
        let client = client();
        client.upload("b", "d/", Bytes::new(), false).await.unwrap();
        let err = client.upload("b", "d/", Bytes::new(), false).await.unwrap_err();
        assert_eq!(err, ObjectError::Duplicate("d/".into()));
    }

    #[tokio::test]
    async fn test_listing_translates_markers() {
        let client = client();
        client.upload("b", "dir/", Bytes::new(), false).await.unwrap();
        client.upload("b", "dir/sub/", Bytes::new(), false).await.unwrap();
        client
            .upload("b", "dir/f.txt", Bytes::from_static(b"x"), true)
            .await
            .unwrap();
        client
            .upload("b", "dir/implied/deep.txt", Bytes::new(), true)
            .await
            .unwrap();

        let listed = client
            .list("b", Some("dir/"), &ListOptions::default())
            .await
            .unwrap();
        assert_eq!(names(listed), vec!["", "f.txt", "implied/", "sub/"]);

        let root = client.list("b", None, &ListOptions::default()).await.unwrap();
        assert_eq!(names(root), vec!["dir/"]);

        let searched = client
            .list("b", Some("dir/"), &ListOptions::search("sub/"))
            .await
            .unwrap();
        assert_eq!(names(searched), vec!["sub/"]);
    }

    #[tokio::test]
    async fn test_remove() {
        let client = client();
        client.upload("b", "d/", Bytes::new(), false).await.unwrap();
        client.remove("b", &["d/".to_string()]).await.unwrap();
        let root = client.list("b", None, &ListOptions::default()).await.unwrap();
        assert!(root.is_empty());
    }

    #[test]
    fn test_store_path() {
        assert_eq!(
            store_path("a/b/").unwrap().as_ref(),
            "a/b/.emptyFolderPlaceholder"
        );
        assert_eq!(store_path("a/f.txt").unwrap().as_ref(), "a/f.txt");
        assert!(matches!(store_path(""), Err(ObjectError::InvalidKey(_))));
        assert!(matches!(store_path("a//b"), Err(ObjectError::InvalidKey(_))));
    }

    #[test]
    fn test_bucket_from_memory_url() {
        let mut client = ObjectStoreClient::new();
        client
            .insert_bucket_url("scratch", "memory://", &BTreeMap::new())
            .unwrap();
        assert_eq!(client.bucket_names(), vec!["scratch"]);

        let err = client
            .insert_bucket_url("bad", "not a url", &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, ObjectError::Transport(_)));
    }
}
