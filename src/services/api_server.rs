// src/services/api_server.rs
//! API Server for the Credential Registry
//!
//! This module exposes the [`RegistryEngine`] operations over HTTP:
//! - student registration
//! - student details with credential names and download links
//! - credential issuance from a raw document upload
//! - credential verification from a raw document upload
//! - transaction status lookup
//!
//! Every failure is answered with a status code chosen by error kind and a
//! JSON body `{"error": "<message>"}`.

use crate::error::RegistryError;
use crate::models::credential::{Document, TransactionStatus};
use crate::models::student::RegistrationRequest;
use crate::services::registry_engine::RegistryEngine;
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, DefaultBodyLimit, Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

/// Default IPFS gateway used for download links.
pub const DEFAULT_GATEWAY_URL: &str = "https://gateway.pinata.cloud/ipfs";

/// Default cap on uploaded document size (10 MiB).
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

// API request and response structures

/// Roll number as sent by clients: either a JSON number or a string.
#[derive(Deserialize)]
#[serde(untagged)]
enum RollNumber {
    Number(i64),
    Text(String),
}

impl RollNumber {
    fn into_text(self) -> String {
        match self {
            RollNumber::Number(n) => n.to_string(),
            RollNumber::Text(s) => s,
        }
    }
}

/// Request payload for registering a student
#[derive(Deserialize)]
struct RegisterStudentRequest {
    address: String,
    name: String,
    roll_number: RollNumber,
    #[serde(default)]
    branch: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    degree: String,
}

impl From<RegisterStudentRequest> for RegistrationRequest {
    fn from(body: RegisterStudentRequest) -> Self {
        RegistrationRequest {
            address: body.address,
            name: body.name,
            roll_number: body.roll_number.into_text(),
            branch: body.branch,
            email: body.email,
            degree: body.degree,
        }
    }
}

/// Response for write operations
#[derive(Serialize, Deserialize)]
struct TransactionResponse {
    tx_hash: String,
}

/// Credential entry in a student details response
#[derive(Serialize, Deserialize)]
struct CredentialEntry {
    content_id: String,
    name: String,
    download_url: String,
}

/// Response for student details
#[derive(Serialize, Deserialize)]
struct StudentDetailsResponse {
    address: String,
    name: String,
    roll_number: u64,
    branch: String,
    email: String,
    degree: String,
    credentials: Vec<CredentialEntry>,
}

/// Query parameters for credential issuance
#[derive(Deserialize)]
struct IssueCredentialQuery {
    filename: Option<String>,
}

/// Response for credential issuance
#[derive(Serialize, Deserialize)]
struct IssueCredentialResponse {
    content_id: String,
    tx_hash: String,
}

/// Response for credential verification
#[derive(Serialize, Deserialize)]
struct VerifyCredentialResponse {
    address: String,
    content_id: String,
    matched: bool,
    registered: bool,
}

/// Response for transaction status lookup
#[derive(Serialize)]
struct TransactionStatusResponse {
    tx_hash: String,
    #[serde(flatten)]
    status: TransactionStatus,
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let status = match &self {
            RegistryError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RegistryError::AlreadyRegistered(_) => StatusCode::CONFLICT,
            RegistryError::UnknownIdentity(_) => StatusCode::NOT_FOUND,
            RegistryError::StorageUploadFailed(_) => StatusCode::BAD_GATEWAY,
            RegistryError::LedgerUnavailable(_) | RegistryError::NameResolutionUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        } else {
            log::debug!("Request rejected: {}", self);
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

/// API server state
#[derive(Clone)]
pub struct ApiServer {
    /// Registry operations
    engine: Arc<RegistryEngine>,

    /// IPFS gateway prefix for download links
    gateway_url: String,

    /// Largest accepted request body
    max_document_bytes: usize,
}

impl ApiServer {
    /// Creates a new instance of the API server
    ///
    /// # Arguments
    /// * `engine` - Registry engine serving every route
    /// * `gateway_url` - Gateway prefix, e.g. `https://gateway.pinata.cloud/ipfs`
    /// * `max_document_bytes` - Upper bound on uploaded documents
    pub fn new(engine: RegistryEngine, gateway_url: &str, max_document_bytes: usize) -> Self {
        ApiServer {
            engine: Arc::new(engine),
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
            max_document_bytes,
        }
    }

    /// Builds the router with all API routes
    pub fn router(&self) -> Router {
        Router::new()
            .route("/register-student", post(Self::register_student_handler))
            .route("/student-details/:address", get(Self::student_details_handler))
            .route("/issue-credential/:address", post(Self::issue_credential_handler))
            .route("/verify-credential/:address", post(Self::verify_credential_handler))
            .route("/transaction-status/:tx_hash", get(Self::transaction_status_handler))
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(self.max_document_bytes))
            .with_state(Arc::new(self.clone()))
    }

    /// Starts the API server and serves requests until the listener fails
    ///
    /// # Errors
    /// Returns an error if the address cannot be bound or serving fails.
    pub async fn run(&self, addr: SocketAddr) -> anyhow::Result<()> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        log::info!("API server listening on http://{}", listener.local_addr()?);
        axum::serve(listener, app).await?;
        Ok(())
    }

    fn download_url(&self, content_id: &str) -> String {
        format!("{}/{}", self.gateway_url, content_id)
    }

    /// Registers a student on the ledger
    ///
    /// # Endpoint
    /// POST /register-student
    ///
    /// # Responses
    /// - 200 OK: Returns transaction hash
    /// - 400 Bad Request: Malformed body, address or roll number
    /// - 409 Conflict: Address already registered
    /// - 503 Service Unavailable: Ledger failure
    async fn register_student_handler(
        State(state): State<Arc<ApiServer>>,
        payload: Result<Json<RegisterStudentRequest>, JsonRejection>,
    ) -> Result<Json<TransactionResponse>, RegistryError> {
        let Json(payload) = payload.map_err(|e| RegistryError::InvalidInput(e.body_text()))?;
        let request = RegistrationRequest::from(payload);
        let tx = state.engine.register_student(&request).await?;
        Ok(Json(TransactionResponse {
            tx_hash: tx.to_string(),
        }))
    }

    /// Fetches a student's record and credentials
    ///
    /// # Endpoint
    /// GET /student-details/:address
    ///
    /// # Responses
    /// - 200 OK: Record plus credentials in issuance order
    /// - 404 Not Found: Address not registered
    async fn student_details_handler(
        Path(address): Path<String>,
        State(state): State<Arc<ApiServer>>,
    ) -> Result<Json<StudentDetailsResponse>, RegistryError> {
        let summary = state.engine.describe_student(&address).await?;
        let credentials = summary
            .credentials
            .into_iter()
            .map(|c| CredentialEntry {
                download_url: state.download_url(c.content_id.as_str()),
                content_id: c.content_id.to_string(),
                name: c.name,
            })
            .collect();

        let record = summary.record;
        Ok(Json(StudentDetailsResponse {
            address: record.identity.to_string(),
            name: record.name,
            roll_number: record.roll_number,
            branch: record.branch,
            email: record.email,
            degree: record.degree,
            credentials,
        }))
    }

    /// Uploads a document and binds it to a student
    ///
    /// # Endpoint
    /// POST /issue-credential/:address?filename=<name>
    ///
    /// # Request Body
    /// Raw document bytes
    ///
    /// # Responses
    /// - 200 OK: Content identifier and transaction hash
    /// - 400 Bad Request: Malformed address or empty document
    /// - 404 Not Found: Address not registered
    /// - 502 Bad Gateway: Storage upload failed
    async fn issue_credential_handler(
        Path(address): Path<String>,
        Query(query): Query<IssueCredentialQuery>,
        State(state): State<Arc<ApiServer>>,
        body: Bytes,
    ) -> Result<Json<IssueCredentialResponse>, RegistryError> {
        let mut document = Document::new(body);
        if let Some(filename) = query.filename {
            document = document.with_filename(filename);
        }

        let issued = state.engine.issue_credential(&address, document).await?;
        Ok(Json(IssueCredentialResponse {
            content_id: issued.content_id.to_string(),
            tx_hash: issued.transaction.to_string(),
        }))
    }

    /// Checks a document against a student's issued credentials
    ///
    /// # Endpoint
    /// POST /verify-credential/:address
    ///
    /// # Request Body
    /// Raw document bytes
    ///
    /// # Responses
    /// - 200 OK: Verification result (unregistered addresses never match)
    /// - 400 Bad Request: Malformed address
    async fn verify_credential_handler(
        Path(address): Path<String>,
        State(state): State<Arc<ApiServer>>,
        body: Bytes,
    ) -> Result<Json<VerifyCredentialResponse>, RegistryError> {
        let result = state.engine.verify_credential(&address, &body).await?;
        Ok(Json(VerifyCredentialResponse {
            address: result.identity.to_string(),
            content_id: result.content_id.to_string(),
            matched: result.matched,
            registered: result.registered,
        }))
    }

    /// Looks up the confirmation state of a transaction
    ///
    /// # Endpoint
    /// GET /transaction-status/:tx_hash
    async fn transaction_status_handler(
        Path(tx_hash): Path<String>,
        State(state): State<Arc<ApiServer>>,
    ) -> Result<Json<TransactionStatusResponse>, RegistryError> {
        let status = state.engine.transaction_status(&tx_hash).await?;
        Ok(Json(TransactionStatusResponse {
            tx_hash: tx_hash.trim().to_string(),
            status,
        }))
    }
}

impl std::fmt::Debug for ApiServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiServer")
            .field("gateway_url", &self.gateway_url)
            .field("max_document_bytes", &self.max_document_bytes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        let id = crate::models::student::Identity::parse("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed")
            .unwrap();
        let cases = [
            (RegistryError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (RegistryError::AlreadyRegistered(id), StatusCode::CONFLICT),
            (RegistryError::UnknownIdentity(id), StatusCode::NOT_FOUND),
            (RegistryError::StorageUploadFailed("x".into()), StatusCode::BAD_GATEWAY),
            (RegistryError::LedgerUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_roll_number_accepts_numbers_and_text() {
        let body: RegisterStudentRequest = serde_json::from_str(
            r#"{"address":"0x1","name":"A","roll_number":101}"#,
        )
        .unwrap();
        assert_eq!(RegistrationRequest::from(body).roll_number, "101");

        let body: RegisterStudentRequest = serde_json::from_str(
            r#"{"address":"0x1","name":"A","roll_number":"102","branch":"EE"}"#,
        )
        .unwrap();
        let request = RegistrationRequest::from(body);
        assert_eq!(request.roll_number, "102");
        assert_eq!(request.branch, "EE");
    }
}
