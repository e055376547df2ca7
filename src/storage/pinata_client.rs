// src/storage/pinata_client.rs
//! Pinata pinning service client.
//!
//! Pins credential documents to IPFS through Pinata's HTTP API and reads
//! back the filename metadata recorded at pin time.
//!
//! # Endpoints
//! - `POST /pinning/pinFileToIPFS` (multipart: `file`, `pinataMetadata`, `pinataOptions`)
//! - `GET  /data/pinList` (paged with `pageLimit` / `pageOffset`)
//!
//! # Authentication
//! Either a bearer JWT or the legacy `pinata_api_key` /
//! `pinata_secret_api_key` header pair.
//!
//! # Addressing
//! Uploads request `cidVersion = 0` so the returned identifier is the same
//! CIDv0 that [`ContentAddresser`](crate::utils::crypto::ContentAddresser)
//! computes locally.

use crate::models::credential::{ContentIdentifier, Document};
use crate::storage::blob_store::{BlobStore, StorageError, StorageResult};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Default Pinata API base URL.
pub const DEFAULT_API_URL: &str = "https://api.pinata.cloud";

/// Filename used for the multipart part when the document has none.
const FALLBACK_FILENAME: &str = "document";

/// Connection settings for [`PinataClient`].
#[derive(Debug, Clone)]
pub struct PinataConfig {
    /// API base URL, without trailing slash
    pub api_url: String,
    /// Legacy API key (used with `api_secret`)
    pub api_key: Option<String>,
    /// Legacy API secret
    pub api_secret: Option<String>,
    /// Scoped JWT; takes precedence over the key pair
    pub jwt: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Rows requested per `pinList` page
    pub page_limit: usize,
    /// Upper bound on `pinList` pages fetched per lookup
    pub max_pages: usize,
}

impl Default for PinataConfig {
    fn default() -> Self {
        PinataConfig {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            api_secret: None,
            jwt: None,
            timeout: Duration::from_secs(60),
            page_limit: 1000,
            max_pages: 10,
        }
    }
}

/// `pinFileToIPFS` response body.
#[derive(Debug, Deserialize)]
struct PinFileResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

/// `pinList` response body.
#[derive(Debug, Deserialize)]
struct PinListResponse {
    #[serde(default)]
    rows: Vec<PinRow>,
}

#[derive(Debug, Deserialize)]
struct PinRow {
    ipfs_pin_hash: String,
    #[serde(default)]
    metadata: Option<PinMetadata>,
}

#[derive(Debug, Deserialize)]
struct PinMetadata {
    #[serde(default)]
    name: Option<String>,
}

/// [`BlobStore`] backed by Pinata.
#[derive(Debug, Clone)]
pub struct PinataClient {
    http: reqwest::Client,
    api_url: String,
    page_limit: usize,
    max_pages: usize,
}

impl PinataClient {
    /// Builds a client with authentication headers preset.
    ///
    /// # Errors
    /// `InvalidConfig` if no credentials are given or a credential is not a
    /// valid header value.
    pub fn new(config: PinataConfig) -> StorageResult<Self> {
        let mut headers = HeaderMap::new();
        match (&config.jwt, &config.api_key, &config.api_secret) {
            (Some(jwt), _, _) => {
                headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", jwt))?);
            }
            (None, Some(key), Some(secret)) => {
                headers.insert("pinata_api_key", header_value(key)?);
                headers.insert("pinata_secret_api_key", header_value(secret)?);
            }
            _ => {
                return Err(StorageError::InvalidConfig(
                    "Pinata needs either a JWT or an API key and secret".to_string(),
                ))
            }
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| StorageError::InvalidConfig(e.to_string()))?;

        Ok(PinataClient {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            page_limit: config.page_limit.max(1),
            max_pages: config.max_pages.max(1),
        })
    }

    async fn fetch_pin_page(&self, offset: usize) -> StorageResult<Vec<PinRow>> {
        let response = self
            .http
            .get(format!("{}/data/pinList", self.api_url))
            .query(&[
                ("status", "pinned".to_string()),
                ("pageLimit", self.page_limit.to_string()),
                ("pageOffset", offset.to_string()),
            ])
            .send()
            .await?;
        let response = check_status(response).await?;
        let list: PinListResponse = response.json().await?;
        Ok(list.rows)
    }
}

fn header_value(value: &str) -> StorageResult<HeaderValue> {
    let mut header = HeaderValue::from_str(value)
        .map_err(|_| StorageError::InvalidConfig("credential is not a valid header value".into()))?;
    header.set_sensitive(true);
    Ok(header)
}

async fn check_status(response: reqwest::Response) -> StorageResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(StorageError::Rejected {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl BlobStore for PinataClient {
    async fn upload(&self, document: &Document) -> StorageResult<ContentIdentifier> {
        let filename = document
            .filename
            .clone()
            .unwrap_or_else(|| FALLBACK_FILENAME.to_string());

        let part = Part::bytes(document.bytes.to_vec())
            .file_name(filename.clone())
            .mime_str("application/octet-stream")
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        let form = Form::new()
            .part("file", part)
            .text("pinataMetadata", serde_json::json!({ "name": filename }).to_string())
            .text("pinataOptions", serde_json::json!({ "cidVersion": 0 }).to_string());

        let response = self
            .http
            .post(format!("{}/pinning/pinFileToIPFS", self.api_url))
            .multipart(form)
            .send()
            .await?;
        let response = check_status(response).await?;
        let pinned: PinFileResponse = response.json().await?;

        if pinned.ipfs_hash.is_empty() {
            return Err(StorageError::MalformedResponse("empty IpfsHash".to_string()));
        }
        log::debug!("Pinned {} ({} bytes) as {}", filename, document.len(), pinned.ipfs_hash);
        Ok(ContentIdentifier::new(pinned.ipfs_hash))
    }

    async fn resolve_names(
        &self,
        ids: &[ContentIdentifier],
    ) -> StorageResult<HashMap<ContentIdentifier, String>> {
        let wanted: HashSet<&str> = ids.iter().map(ContentIdentifier::as_str).collect();
        let mut names = HashMap::new();
        if wanted.is_empty() {
            return Ok(names);
        }

        for page in 0..self.max_pages {
            let rows = self.fetch_pin_page(page * self.page_limit).await?;
            let row_count = rows.len();

            for row in rows {
                if !wanted.contains(row.ipfs_pin_hash.as_str()) {
                    continue;
                }
                if let Some(name) = row.metadata.and_then(|m| m.name).filter(|n| !n.is_empty()) {
                    names
                        .entry(ContentIdentifier::new(row.ipfs_pin_hash))
                        .or_insert(name);
                }
            }

            if names.len() == wanted.len() || row_count < self.page_limit {
                break;
            }
        }

        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_credentials() {
        let err = PinataClient::new(PinataConfig::default()).unwrap_err();
        assert!(matches!(err, StorageError::InvalidConfig(_)));

        let half = PinataConfig {
            api_key: Some("key".into()),
            ..PinataConfig::default()
        };
        assert!(PinataClient::new(half).is_err());
    }

    #[test]
    fn test_new_accepts_jwt_or_key_pair() {
        let jwt = PinataConfig {
            jwt: Some("token".into()),
            ..PinataConfig::default()
        };
        assert!(PinataClient::new(jwt).is_ok());

        let pair = PinataConfig {
            api_key: Some("key".into()),
            api_secret: Some("secret".into()),
            api_url: "http://localhost:9999/".into(),
            ..PinataConfig::default()
        };
        let client = PinataClient::new(pair).unwrap();
        assert_eq!(client.api_url, "http://localhost:9999");
    }

    #[test]
    fn test_pin_list_rows_tolerate_missing_metadata() {
        let body = serde_json::json!({
            "count": 3,
            "rows": [
                { "ipfs_pin_hash": "QmA", "metadata": { "name": "a.pdf" } },
                { "ipfs_pin_hash": "QmB", "metadata": null },
                { "ipfs_pin_hash": "QmC" }
            ]
        });
        let list: PinListResponse = serde_json::from_value(body).unwrap();
        assert_eq!(list.rows.len(), 3);
        assert_eq!(
            list.rows[0].metadata.as_ref().and_then(|m| m.name.as_deref()),
            Some("a.pdf")
        );
        assert!(list.rows[1].metadata.is_none());
        assert!(list.rows[2].metadata.is_none());
    }
}
