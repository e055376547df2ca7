//! Contract tests for PinataClient against a mock pinning API.
//!
//! | Method | Path | Test |
//! |--------|------|------|
//! | POST | `/pinning/pinFileToIPFS` | `upload_*` |
//! | GET | `/data/pinList` | `resolve_names_*` |

use credential_registry::models::credential::{ContentIdentifier, Document};
use credential_registry::storage::blob_store::{BlobStore, StorageError};
use credential_registry::storage::pinata_client::{PinataClient, PinataConfig};
use credential_registry::utils::crypto;
use std::time::Duration;
use wiremock::matchers::{header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn key_pair_client(server: &MockServer) -> PinataClient {
    PinataClient::new(PinataConfig {
        api_url: server.uri(),
        api_key: Some("test-key".into()),
        api_secret: Some("test-secret".into()),
        jwt: None,
        timeout: Duration::from_secs(5),
        page_limit: 2,
        max_pages: 3,
    })
    .unwrap()
}

fn pin_row(hash: &str, name: Option<&str>) -> serde_json::Value {
    match name {
        Some(name) => serde_json::json!({ "ipfs_pin_hash": hash, "metadata": { "name": name } }),
        None => serde_json::json!({ "ipfs_pin_hash": hash, "metadata": { "name": null } }),
    }
}

// ── POST /pinning/pinFileToIPFS ──────────────────────────────────────

#[tokio::test]
async fn upload_returns_provider_hash() {
    let server = MockServer::start().await;
    let bytes = b"Semester 1 marksheet".to_vec();
    let expected = crypto::digest(&bytes);

    Mock::given(method("POST"))
        .and(path("/pinning/pinFileToIPFS"))
        .and(header("pinata_api_key", "test-key"))
        .and(header("pinata_secret_api_key", "test-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "IpfsHash": expected.as_str(),
            "PinSize": bytes.len(),
            "Timestamp": "2024-01-01T00:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = key_pair_client(&server);
    let id = client
        .upload(&Document::new(bytes).with_filename("sem1.pdf"))
        .await
        .unwrap();
    assert_eq!(id, expected);
}

#[tokio::test]
async fn upload_sends_filename_metadata_and_cid_version() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/pinning/pinFileToIPFS"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "IpfsHash": "QmTest"
        })))
        .mount(&server)
        .await;

    let client = key_pair_client(&server);
    client
        .upload(&Document::new(b"doc".to_vec()).with_filename("transcript.pdf"))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains(r#"name="file"; filename="transcript.pdf""#));
    assert!(body.contains(r#"{"name":"transcript.pdf"}"#));
    assert!(body.contains(r#"{"cidVersion":0}"#));
}

#[tokio::test]
async fn upload_with_jwt_uses_bearer_auth() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/pinning/pinFileToIPFS"))
        .and(header("authorization", "Bearer jwt-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "IpfsHash": "QmJwt"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = PinataClient::new(PinataConfig {
        api_url: server.uri(),
        jwt: Some("jwt-token".into()),
        ..PinataConfig::default()
    })
    .unwrap();
    let id = client.upload(&Document::new(b"doc".to_vec())).await.unwrap();
    assert_eq!(id.as_str(), "QmJwt");
}

#[tokio::test]
async fn upload_rejected_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/pinning/pinFileToIPFS"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": { "reason": "INVALID_CREDENTIALS" }
        })))
        .mount(&server)
        .await;

    let client = key_pair_client(&server);
    let err = client.upload(&Document::new(b"doc".to_vec())).await.unwrap_err();
    match err {
        StorageError::Rejected { status, message } => {
            assert_eq!(status, 401);
            assert!(message.contains("INVALID_CREDENTIALS"));
        }
        other => panic!("expected Rejected, got {:?}", other),
    }
}

#[tokio::test]
async fn upload_malformed_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/pinning/pinFileToIPFS"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = key_pair_client(&server);
    let err = client.upload(&Document::new(b"doc".to_vec())).await.unwrap_err();
    assert!(matches!(err, StorageError::MalformedResponse(_)));
}

// ── GET /data/pinList ────────────────────────────────────────────────

#[tokio::test]
async fn resolve_names_returns_partial_mapping() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/pinList"))
        .and(query_param("status", "pinned"))
        .and(query_param("pageOffset", "0"))
        .and(header_exists("pinata_api_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": 1,
            "rows": [pin_row("QmA", Some("a.pdf"))]
        })))
        .mount(&server)
        .await;

    let client = key_pair_client(&server);
    let ids = vec![ContentIdentifier::new("QmA"), ContentIdentifier::new("QmMissing")];
    let names = client.resolve_names(&ids).await.unwrap();
    assert_eq!(names.len(), 1);
    assert_eq!(names.get(&ids[0]).map(String::as_str), Some("a.pdf"));
    assert!(!names.contains_key(&ids[1]));
}

#[tokio::test]
async fn resolve_names_pages_until_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/pinList"))
        .and(query_param("pageOffset", "0"))
        .and(query_param("pageLimit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": 4,
            "rows": [pin_row("QmOther", Some("other.pdf")), pin_row("QmA", Some("a.pdf"))]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/data/pinList"))
        .and(query_param("pageOffset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": 4,
            "rows": [pin_row("QmNoName", None), pin_row("QmB", Some("b.pdf"))]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = key_pair_client(&server);
    let ids = vec![ContentIdentifier::new("QmA"), ContentIdentifier::new("QmB")];
    let names = client.resolve_names(&ids).await.unwrap();
    assert_eq!(names.len(), 2);
    assert_eq!(names.get(&ids[1]).map(String::as_str), Some("b.pdf"));
}

#[tokio::test]
async fn resolve_names_stops_at_page_cap() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/pinList"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": 100,
            "rows": [pin_row("QmX", Some("x.pdf")), pin_row("QmY", Some("y.pdf"))]
        })))
        .expect(3)
        .mount(&server)
        .await;

    let client = key_pair_client(&server);
    let names = client
        .resolve_names(&[ContentIdentifier::new("QmNeverListed")])
        .await
        .unwrap();
    assert!(names.is_empty());
}

#[tokio::test]
async fn resolve_names_surfaces_provider_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/pinList"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = key_pair_client(&server);
    let err = client
        .resolve_names(&[ContentIdentifier::new("QmA")])
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Rejected { status: 500, .. }));
}

#[tokio::test]
async fn resolve_names_empty_input_makes_no_request() {
    let server = MockServer::start().await;
    let client = key_pair_client(&server);
    assert!(client.resolve_names(&[]).await.unwrap().is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}
