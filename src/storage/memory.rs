// src/storage/memory.rs
//! In-memory blob store.
//!
//! Addresses documents with the same [`ContentAddresser`] the engine uses, so
//! it behaves like a pinning provider with a faithful addressing scheme. Used
//! by tests and by `storage.backend = "memory"` local runs.

use crate::models::credential::{ContentIdentifier, Document};
use crate::storage::blob_store::{BlobStore, StorageResult};
use crate::utils::crypto::ContentAddresser;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use tokio::sync::RwLock;

struct StoredBlob {
    bytes: Bytes,
    name: Option<String>,
}

/// `HashMap`-backed [`BlobStore`].
pub struct InMemoryBlobStore {
    addresser: ContentAddresser,
    blobs: RwLock<HashMap<ContentIdentifier, StoredBlob>>,
}

impl InMemoryBlobStore {
    pub fn new(addresser: ContentAddresser) -> Self {
        InMemoryBlobStore {
            addresser,
            blobs: RwLock::new(HashMap::new()),
        }
    }

    /// Number of distinct documents stored.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    /// Bytes stored under `id`, if any.
    pub async fn get(&self, id: &ContentIdentifier) -> Option<Bytes> {
        self.blobs.read().await.get(id).map(|blob| blob.bytes.clone())
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new(ContentAddresser::default())
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn upload(&self, document: &Document) -> StorageResult<ContentIdentifier> {
        let id = self.addresser.digest(&document.bytes);
        let mut blobs = self.blobs.write().await;
        // Re-pinning identical bytes keeps the first stored copy, but a later
        // upload may supply a name the first one lacked.
        let entry = blobs.entry(id.clone()).or_insert_with(|| StoredBlob {
            bytes: document.bytes.clone(),
            name: None,
        });
        if entry.name.is_none() {
            entry.name = document.filename.clone();
        }
        Ok(id)
    }

    async fn resolve_names(
        &self,
        ids: &[ContentIdentifier],
    ) -> StorageResult<HashMap<ContentIdentifier, String>> {
        let blobs = self.blobs.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| {
                let name = blobs.get(id)?.name.clone()?;
                Some((id.clone(), name))
            })
            .collect())
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("addresser", &self.addresser)
            .finish()
    }
}
