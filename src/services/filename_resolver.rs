// src/services/filename_resolver.rs
//! Maps content identifiers to display names.
//!
//! Names come from the storage provider's pin metadata. Missing metadata,
//! a failing lookup or a slow provider all degrade to placeholder labels;
//! resolution never fails the surrounding operation.

use crate::error::{RegistryError, RegistryResult};
use crate::models::credential::{ContentIdentifier, NamedCredential};
use crate::storage::blob_store::BlobStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Decorates content identifiers with their original filenames.
#[derive(Clone)]
pub struct FilenameResolver {
    store: Arc<dyn BlobStore>,
    lookup_timeout: Duration,
}

impl FilenameResolver {
    pub fn new(store: Arc<dyn BlobStore>, lookup_timeout: Duration) -> Self {
        FilenameResolver {
            store,
            lookup_timeout,
        }
    }

    /// Names for `ids`, in the same order and with duplicates kept.
    ///
    /// Unresolved identifiers get [`ContentIdentifier::placeholder_label`].
    pub async fn resolve(&self, ids: &[ContentIdentifier]) -> Vec<NamedCredential> {
        if ids.is_empty() {
            return Vec::new();
        }

        let names = match self.lookup(ids).await {
            Ok(names) => names,
            Err(e) => {
                log::warn!("{}; using placeholder names for {} credentials", e, ids.len());
                HashMap::new()
            }
        };

        ids.iter()
            .map(|id| match names.get(id).filter(|name| !name.trim().is_empty()) {
                Some(name) => NamedCredential {
                    content_id: id.clone(),
                    name: name.clone(),
                    resolved: true,
                },
                None => NamedCredential {
                    content_id: id.clone(),
                    name: id.placeholder_label(),
                    resolved: false,
                },
            })
            .collect()
    }

    async fn lookup(
        &self,
        ids: &[ContentIdentifier],
    ) -> RegistryResult<HashMap<ContentIdentifier, String>> {
        match timeout(self.lookup_timeout, self.store.resolve_names(ids)).await {
            Ok(Ok(names)) => Ok(names),
            Ok(Err(e)) => Err(RegistryError::NameResolutionUnavailable(e.to_string())),
            Err(_) => Err(RegistryError::NameResolutionUnavailable(format!(
                "lookup exceeded {:?}",
                self.lookup_timeout
            ))),
        }
    }
}

impl std::fmt::Debug for FilenameResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilenameResolver")
            .field("lookup_timeout", &self.lookup_timeout)
            .finish_non_exhaustive()
    }
}
