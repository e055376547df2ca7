// src/storage/blob_store.rs
//! Content-addressed storage provider interface.
//!
//! Every backend (Pinata, a local IPFS node, the in-memory store) implements
//! [`BlobStore`]. The engine only ever talks to this trait.

use crate::models::credential::{ContentIdentifier, Document};
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Errors from storage provider operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The provider answered with a non-success status.
    #[error("provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// Connection or protocol failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider's response could not be decoded.
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    /// The client could not be built from its configuration.
    #[error("invalid storage configuration: {0}")]
    InvalidConfig(String),
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StorageError::Timeout
        } else if err.is_decode() {
            StorageError::MalformedResponse(err.to_string())
        } else {
            StorageError::Transport(err.to_string())
        }
    }
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Content-addressed blob store.
///
/// Implementations must satisfy:
/// - uploading byte-identical documents yields the same identifier;
/// - `resolve_names` returns a partial map: identifiers without known
///   metadata are absent, which is not an error.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores (pins) a document and returns its content identifier.
    async fn upload(&self, document: &Document) -> StorageResult<ContentIdentifier>;

    /// Looks up the original filenames recorded for `ids`.
    async fn resolve_names(
        &self,
        ids: &[ContentIdentifier],
    ) -> StorageResult<HashMap<ContentIdentifier, String>>;
}
