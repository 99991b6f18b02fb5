//! In-process object store for device images

use crate::config::ObjectStoreConfig;
use crate::domain::media::ObjectStore;
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

/// Stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Keeps objects in memory and hands out URLs under the configured bucket
pub struct InMemoryObjectStore {
    base_url: String,
    bucket: String,
    objects: DashMap<String, StoredObject>,
}

impl InMemoryObjectStore {
    pub fn new(config: &ObjectStoreConfig) -> Self {
        Self {
            base_url: config.public_base_url.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
            objects: DashMap::new(),
        }
    }

    pub fn url_for(&self, name: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.bucket, name)
    }

    pub fn get(&self, name: &str) -> Option<StoredObject> {
        self.objects.get(name).map(|o| o.clone())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, name: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        self.objects.insert(
            name.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(self.url_for(name))
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.objects.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_returns_public_url() {
        let store = InMemoryObjectStore::new(&ObjectStoreConfig {
            public_base_url: "http://minio:9000/".to_string(),
            bucket: "devices".to_string(),
        });

        let url = store
            .put("device-1/a.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();
        assert_eq!(url, "http://minio:9000/devices/device-1/a.png");
        assert_eq!(store.get("device-1/a.png").unwrap().content_type, "image/png");

        store.delete("device-1/a.png").await.unwrap();
        assert!(store.is_empty());
    }
}
