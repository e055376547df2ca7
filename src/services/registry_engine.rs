// src/services/registry_engine.rs
//! Registry Engine
//!
//! Orchestrates the ledger and the content-addressed store to provide the
//! four registry operations:
//! - one-time student registration
//! - credential issuance (upload, then bind on the ledger)
//! - student detail lookup
//! - credential verification against the ledger's issuance set
//!
//! The engine keeps no state between calls. The ledger is the authority for
//! records and issuances; same-identity write ordering is left to the
//! [`LedgerGateway`].

use crate::blockchain::ledger_gateway::{LedgerError, LedgerGateway};
use crate::error::{RegistryError, RegistryResult};
use crate::models::credential::{
    ContentIdentifier, Document, IssuedCredential, StudentDetails, StudentSummary,
    TransactionRef, TransactionStatus, VerificationResult,
};
use crate::models::student::{Identity, RegistrationRequest};
use crate::services::filename_resolver::FilenameResolver;
use crate::storage::blob_store::BlobStore;
use crate::utils::crypto::ContentAddresser;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Tunables for [`RegistryEngine`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Addressing scheme shared with the storage provider
    pub addresser: ContentAddresser,
    /// Upper bound on a single document upload
    pub upload_timeout: Duration,
    /// Upper bound on a filename metadata lookup
    pub name_lookup_timeout: Duration,
    /// Reject uploads whose provider identifier differs from the local digest
    pub strict_addressing: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            addresser: ContentAddresser::default(),
            upload_timeout: Duration::from_secs(60),
            name_lookup_timeout: Duration::from_secs(10),
            strict_addressing: true,
        }
    }
}

/// Credential registry service.
///
/// Cheap to clone; clones share the same collaborators.
#[derive(Clone)]
pub struct RegistryEngine {
    ledger: Arc<dyn LedgerGateway>,
    store: Arc<dyn BlobStore>,
    resolver: FilenameResolver,
    addresser: ContentAddresser,
    upload_timeout: Duration,
    strict_addressing: bool,
}

impl RegistryEngine {
    /// Creates a new engine over a ledger and a blob store.
    ///
    /// # Arguments
    /// * `ledger` - Authoritative registry of records and issuances
    /// * `store` - Content-addressed document storage
    /// * `options` - Addressing scheme and timeouts
    pub fn new(
        ledger: Arc<dyn LedgerGateway>,
        store: Arc<dyn BlobStore>,
        options: EngineOptions,
    ) -> Self {
        let resolver = FilenameResolver::new(store.clone(), options.name_lookup_timeout);
        RegistryEngine {
            ledger,
            store,
            resolver,
            addresser: options.addresser,
            upload_timeout: options.upload_timeout,
            strict_addressing: options.strict_addressing,
        }
    }

    /// Account all ledger writes are signed by.
    pub fn admin(&self) -> Identity {
        self.ledger.signer()
    }

    /// Registers a student.
    ///
    /// # Returns
    /// Reference of the confirmed registration transaction
    ///
    /// # Errors
    /// - `InvalidInput` for a malformed address or roll number
    /// - `AlreadyRegistered` if the ledger already holds a record
    /// - `LedgerUnavailable` on transport or confirmation failure
    pub async fn register_student(
        &self,
        request: &RegistrationRequest,
    ) -> RegistryResult<TransactionRef> {
        let record = request.validate()?;
        let tx = self
            .ledger
            .register(&record)
            .await
            .map_err(|e| ledger_failure(record.identity, e))?;

        log::info!(
            "Registered student {} (roll {}) in {}",
            record.identity,
            record.roll_number,
            tx
        );
        Ok(tx)
    }

    /// Issues a document to a registered student.
    ///
    /// # Process Flow
    /// 1. Validates the identity and rejects empty documents
    /// 2. Uploads the document under the upload timeout
    /// 3. Checks the provider's identifier against the local digest
    /// 4. Appends the binding on the ledger
    ///
    /// Any failure before step 4 leaves the ledger untouched.
    ///
    /// # Errors
    /// - `InvalidInput` for a malformed address or empty document
    /// - `StorageUploadFailed` if the upload fails, times out or is misaddressed
    /// - `UnknownIdentity` if the student was never registered
    /// - `LedgerUnavailable` on transport or confirmation failure
    pub async fn issue_credential(
        &self,
        address: &str,
        document: Document,
    ) -> RegistryResult<IssuedCredential> {
        let identity = Identity::parse(address)?;
        if document.is_empty() {
            return Err(RegistryError::InvalidInput("document is empty".to_string()));
        }

        let content_id = self.upload(&document).await?;
        let transaction = self
            .ledger
            .append_issuance(&identity, &content_id)
            .await
            .map_err(|e| ledger_failure(identity, e))?;

        log::info!(
            "Issued {} ({} bytes) to {} in {}",
            content_id,
            document.len(),
            identity,
            transaction
        );
        Ok(IssuedCredential {
            content_id,
            transaction,
        })
    }

    /// Reads a student's record and issuances in ledger order.
    ///
    /// # Errors
    /// - `InvalidInput` for a malformed address
    /// - `UnknownIdentity` if no record exists
    /// - `LedgerUnavailable` if the ledger cannot be read
    pub async fn get_student_details(&self, address: &str) -> RegistryResult<StudentDetails> {
        let identity = Identity::parse(address)?;
        self.read_details(&identity)
            .await?
            .ok_or(RegistryError::UnknownIdentity(identity))
    }

    /// Student details with a display name per issuance.
    ///
    /// Names that cannot be resolved fall back to placeholder labels; this
    /// never fails because of the name lookup.
    pub async fn describe_student(&self, address: &str) -> RegistryResult<StudentSummary> {
        let details = self.get_student_details(address).await?;
        let credentials = self.resolver.resolve(&details.credentials).await;
        Ok(StudentSummary {
            record: details.record,
            credentials,
        })
    }

    /// Checks whether `bytes` were issued to the student at `address`.
    ///
    /// The identifier is recomputed locally; nothing is uploaded. An
    /// unregistered identity is answered with `matched = false`.
    ///
    /// # Errors
    /// - `InvalidInput` for a malformed address
    /// - `LedgerUnavailable` if the ledger cannot be read
    pub async fn verify_credential(
        &self,
        address: &str,
        bytes: &[u8],
    ) -> RegistryResult<VerificationResult> {
        let identity = Identity::parse(address)?;
        let content_id = self.addresser.digest(bytes);

        let details = self.read_details(&identity).await?;
        let registered = details.is_some();
        let matched = details
            .as_ref()
            .map(|d| d.holds(&content_id))
            .unwrap_or(false);

        log::info!(
            "Verified {} against {}: {}",
            content_id,
            identity,
            if matched { "match" } else { "no match" }
        );
        Ok(VerificationResult {
            identity,
            content_id,
            matched,
            registered,
        })
    }

    /// Confirmation state of a transaction returned by a write.
    ///
    /// # Errors
    /// - `InvalidInput` for a malformed transaction hash
    /// - `LedgerUnavailable` if the ledger cannot be queried
    pub async fn transaction_status(&self, tx_hash: &str) -> RegistryResult<TransactionStatus> {
        let tx: TransactionRef = tx_hash.parse()?;
        self.ledger
            .transaction_status(&tx)
            .await
            .map_err(|e| RegistryError::LedgerUnavailable(e.to_string()))
    }

    async fn read_details(&self, identity: &Identity) -> RegistryResult<Option<StudentDetails>> {
        self.ledger
            .read_record(identity)
            .await
            .map_err(|e| ledger_failure(*identity, e))
    }

    async fn upload(&self, document: &Document) -> RegistryResult<ContentIdentifier> {
        let provider_id = match timeout(self.upload_timeout, self.store.upload(document)).await {
            Ok(Ok(id)) => id,
            Ok(Err(e)) => return Err(RegistryError::StorageUploadFailed(e.to_string())),
            Err(_) => {
                return Err(RegistryError::StorageUploadFailed(format!(
                    "upload exceeded {:?}",
                    self.upload_timeout
                )))
            }
        };

        let local_id = self.addresser.digest(&document.bytes);
        if provider_id == local_id {
            return Ok(local_id);
        }
        if self.strict_addressing {
            return Err(RegistryError::StorageUploadFailed(format!(
                "provider addressed document as {}, expected {}",
                provider_id, local_id
            )));
        }
        log::warn!(
            "Provider addressed document as {}, local digest is {}; keeping provider identifier",
            provider_id,
            local_id
        );
        Ok(provider_id)
    }
}

/// Maps gateway failures onto the engine's error kinds.
fn ledger_failure(identity: Identity, err: LedgerError) -> RegistryError {
    match err {
        LedgerError::AlreadyRegistered => RegistryError::AlreadyRegistered(identity),
        LedgerError::NotRegistered => RegistryError::UnknownIdentity(identity),
        other => RegistryError::LedgerUnavailable(other.to_string()),
    }
}

impl std::fmt::Debug for RegistryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEngine")
            .field("admin", &self.ledger.signer())
            .field("upload_timeout", &self.upload_timeout)
            .field("strict_addressing", &self.strict_addressing)
            .finish_non_exhaustive()
    }
}
