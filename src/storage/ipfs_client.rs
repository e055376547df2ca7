// src/storage/ipfs_client.rs
//! Local IPFS node storage backend.
//!
//! Adds documents through a Kubo node's HTTP RPC API (`POST /api/v0/add`)
//! with the same layout the pinning service uses (CIDv0, pinned).
//!
//! # Limitations
//! A bare IPFS node keeps no filename metadata for added content, so
//! [`BlobStore::resolve_names`] always returns an empty map and display falls
//! back to placeholder names.

use crate::models::credential::{ContentIdentifier, Document};
use crate::storage::blob_store::{BlobStore, StorageError, StorageResult};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Default node API address.
pub const DEFAULT_IPFS_API_URL: &str = "http://localhost:5001";

const ADD_TIMEOUT: Duration = Duration::from_secs(60);

/// One line of the `add` response stream.
#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

/// Thread-safe IPFS node client.
#[derive(Debug, Clone)]
pub struct IpfsStorage {
    http: reqwest::Client,
    add_url: Url,
}

impl IpfsStorage {
    /// Creates a client for the node API at `api_url`.
    ///
    /// # Errors
    /// `InvalidConfig` if `api_url` is not an absolute http(s) URL. No
    /// connection is made until the first upload.
    pub fn new(api_url: &str) -> StorageResult<Self> {
        let invalid = |reason: &str| StorageError::InvalidConfig(format!("IPFS API url {:?}: {}", api_url, reason));

        let base = Url::parse(api_url.trim_end_matches('/')).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        let mut add_url = base;
        add_url
            .path_segments_mut()
            .map_err(|_| invalid("not a base URL"))?
            .pop_if_empty()
            .extend(["api", "v0", "add"]);
        add_url
            .query_pairs_mut()
            .append_pair("cid-version", "0")
            .append_pair("pin", "true");

        let http = reqwest::Client::builder()
            .timeout(ADD_TIMEOUT)
            .build()
            .map_err(|e| StorageError::InvalidConfig(e.to_string()))?;

        Ok(IpfsStorage { http, add_url })
    }

    /// Adds raw bytes to the node and pins them.
    ///
    /// # Returns
    /// The CIDv0 of the added content.
    pub async fn store_data(&self, data: Vec<u8>, filename: &str) -> StorageResult<ContentIdentifier> {
        let part = Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        let response = self
            .http
            .post(self.add_url.clone())
            .multipart(Form::new().part("file", part))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(StorageError::Rejected {
                status: status.as_u16(),
                message: body,
            });
        }
        parse_added(&body)
    }
}

/// The node streams one JSON object per added entry; the last one is the
/// root of what was added.
fn parse_added(body: &str) -> StorageResult<ContentIdentifier> {
    let last = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .ok_or_else(|| StorageError::MalformedResponse("empty response from node".to_string()))?;
    let added: AddResponse =
        serde_json::from_str(last).map_err(|e| StorageError::MalformedResponse(e.to_string()))?;
    if added.hash.is_empty() {
        return Err(StorageError::MalformedResponse("empty hash from node".to_string()));
    }
    Ok(ContentIdentifier::new(added.hash))
}

#[async_trait]
impl BlobStore for IpfsStorage {
    async fn upload(&self, document: &Document) -> StorageResult<ContentIdentifier> {
        let filename = document.filename.as_deref().unwrap_or("document");
        let id = self.store_data(document.bytes.to_vec(), filename).await?;
        log::debug!("Added {} bytes to IPFS node as {}", document.len(), id);
        Ok(id)
    }

    async fn resolve_names(
        &self,
        ids: &[ContentIdentifier],
    ) -> StorageResult<HashMap<ContentIdentifier, String>> {
        log::debug!("IPFS node keeps no filename metadata; {} names unresolved", ids.len());
        Ok(HashMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_invalid_url() {
        for url in ["not a url", "ftp://localhost:5001", ""] {
            assert!(
                matches!(IpfsStorage::new(url), Err(StorageError::InvalidConfig(_))),
                "{}",
                url
            );
        }
        assert!(IpfsStorage::new(DEFAULT_IPFS_API_URL).is_ok());
    }

    #[test]
    fn test_add_url_keeps_base_path() {
        let storage = IpfsStorage::new("http://node.local:5001/").unwrap();
        assert_eq!(
            storage.add_url.as_str(),
            "http://node.local:5001/api/v0/add?cid-version=0&pin=true"
        );

        let storage = IpfsStorage::new("https://proxy.local/ipfs").unwrap();
        assert_eq!(storage.add_url.path(), "/ipfs/api/v0/add");
    }

    #[test]
    fn test_parse_added_takes_last_entry() {
        let body = "{\"Name\":\"a\",\"Hash\":\"QmFirst\",\"Size\":\"3\"}\n{\"Name\":\"\",\"Hash\":\"QmRoot\",\"Size\":\"9\"}\n";
        assert_eq!(parse_added(body).unwrap().as_str(), "QmRoot");
    }

    #[test]
    fn test_parse_added_rejects_garbage() {
        assert!(matches!(parse_added(""), Err(StorageError::MalformedResponse(_))));
        assert!(matches!(parse_added("not json"), Err(StorageError::MalformedResponse(_))));
        assert!(matches!(
            parse_added("{\"Hash\":\"\"}"),
            Err(StorageError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_names_is_empty() {
        let storage = IpfsStorage::new(DEFAULT_IPFS_API_URL).unwrap();
        let names = storage
            .resolve_names(&[ContentIdentifier::new("QmA")])
            .await
            .unwrap();
        assert!(names.is_empty());
    }
}
