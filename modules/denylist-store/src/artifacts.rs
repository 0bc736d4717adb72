//! Report artifact storage: JSON blobs under `issues/{issue}/...` keys.

use std::sync::Arc;

use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use denylist_common::ArtifactLocation;

use crate::error::{Result, StoreError};

#[derive(Clone)]
pub struct ArtifactStore {
    inner: Arc<dyn ObjectStore>,
}

impl ArtifactStore {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self { inner }
    }

    /// S3 credentials and region come from the standard `AWS_*` variables.
    pub fn from_location(location: &ArtifactLocation) -> Result<Self> {
        let inner: Arc<dyn ObjectStore> = match location {
            ArtifactLocation::S3 { bucket } => Arc::new(
                AmazonS3Builder::from_env()
                    .with_bucket_name(bucket)
                    .build()?,
            ),
            ArtifactLocation::Local { root } => {
                std::fs::create_dir_all(root).map_err(|e| {
                    StoreError::Artifact(object_store::Error::Generic {
                        store: "LocalFileSystem",
                        source: Box::new(e),
                    })
                })?;
                Arc::new(LocalFileSystem::new_with_prefix(root)?)
            }
        };
        Ok(Self { inner })
    }

    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(InMemory::new()),
        }
    }

    pub async fn put_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let body = serde_json::to_vec(value)?;
        let size = body.len();
        self.inner
            .put(&Path::from(key), PutPayload::from(body))
            .await?;
        debug!(key, size, "Wrote artifact");
        Ok(())
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let bytes = self.inner.get(&Path::from(key)).await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Like [`get_json`](Self::get_json) but a missing object is `Ok(None)`.
    pub async fn get_json_opt<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_json(key).await {
            Ok(value) => Ok(Some(value)),
            Err(StoreError::Artifact(object_store::Error::NotFound { .. })) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        match self.inner.head(&Path::from(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn json_is_read_back_verbatim() {
        let store = ArtifactStore::in_memory();
        let body = json!({"distance_m": [1.5, 20.0], "rssi": [-100, -87]});

        store
            .put_json("issues/7/entries/11abc/distance_vs_rssi", &body)
            .await
            .unwrap();

        let read: serde_json::Value = store
            .get_json("issues/7/entries/11abc/distance_vs_rssi")
            .await
            .unwrap();
        assert_eq!(read, body);
        assert!(store.exists("issues/7/entries/11abc/distance_vs_rssi").await.unwrap());
    }

    #[tokio::test]
    async fn missing_artifact_is_none() {
        let store = ArtifactStore::in_memory();
        let read: Option<serde_json::Value> =
            store.get_json_opt("issues/1/issue_details").await.unwrap();
        assert!(read.is_none());
        assert!(!store.exists("issues/1/issue_details").await.unwrap());
    }

    #[tokio::test]
    async fn missing_artifact_maps_to_not_found() {
        let store = ArtifactStore::in_memory();
        let err = store
            .get_json::<serde_json::Value>("issues/1/issue_details")
            .await
            .unwrap_err();
        assert!(matches!(
            denylist_common::DenylistError::from(err),
            denylist_common::DenylistError::NotFound(_)
        ));
    }
}
