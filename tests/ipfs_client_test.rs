//! Contract tests for IpfsStorage against a mock Kubo RPC API.
//!
//! | Method | Path | Test |
//! |--------|------|------|
//! | POST | `/api/v0/add` | `add_*` |

use credential_registry::models::credential::Document;
use credential_registry::storage::blob_store::{BlobStore, StorageError};
use credential_registry::storage::ipfs_client::IpfsStorage;
use credential_registry::utils::crypto;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── POST /api/v0/add ─────────────────────────────────────────────────

#[tokio::test]
async fn add_returns_node_hash() {
    let server = MockServer::start().await;
    let bytes = b"Semester 1 marksheet".to_vec();
    let expected = crypto::digest(&bytes);

    Mock::given(method("POST"))
        .and(path("/api/v0/add"))
        .and(query_param("cid-version", "0"))
        .and(query_param("pin", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Name": "sem1.pdf",
            "Hash": expected.as_str(),
            "Size": "31"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let storage = IpfsStorage::new(&server.uri()).unwrap();
    let id = storage
        .upload(&Document::new(bytes).with_filename("sem1.pdf"))
        .await
        .unwrap();
    assert_eq!(id, expected);
}

#[tokio::test]
async fn add_sends_document_as_multipart_file() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v0/add"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"Hash\":\"QmTest\"}\n"))
        .mount(&server)
        .await;

    let storage = IpfsStorage::new(&server.uri()).unwrap();
    storage
        .upload(&Document::new(b"transcript body".to_vec()).with_filename("transcript.pdf"))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let content_type = requests[0].headers.get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.starts_with("multipart/form-data"));
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains(r#"name="file"; filename="transcript.pdf""#));
    assert!(body.contains("transcript body"));
}

#[tokio::test]
async fn add_node_error_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v0/add"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "Message": "pin: blockstore full",
            "Code": 0,
            "Type": "error"
        })))
        .mount(&server)
        .await;

    let storage = IpfsStorage::new(&server.uri()).unwrap();
    let err = storage.upload(&Document::new(b"doc".to_vec())).await.unwrap_err();
    match err {
        StorageError::Rejected { status, message } => {
            assert_eq!(status, 500);
            assert!(message.contains("blockstore full"));
        }
        other => panic!("expected Rejected, got {:?}", other),
    }
}

#[tokio::test]
async fn add_malformed_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v0/add"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let storage = IpfsStorage::new(&server.uri()).unwrap();
    let err = storage.upload(&Document::new(b"doc".to_vec())).await.unwrap_err();
    assert!(matches!(err, StorageError::MalformedResponse(_)));
}
