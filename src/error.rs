// src/error.rs
//! Error kinds returned by the registry engine.
//!
//! Every engine operation returns one of a closed set of kinds so callers can
//! branch on the kind instead of parsing messages. Adapter layers keep their
//! own error types ([`LedgerError`](crate::blockchain::ledger_gateway::LedgerError),
//! [`StorageError`](crate::storage::blob_store::StorageError)) and are mapped
//! into this set at the engine boundary.

use crate::models::student::Identity;
use thiserror::Error;

/// Failure of a registry operation.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Malformed identity, non-positive roll number, empty document, bad
    /// transaction reference.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The ledger already holds a record for this identity.
    #[error("student {0} is already registered")]
    AlreadyRegistered(Identity),

    /// The ledger holds no record for this identity.
    #[error("no student registered for {0}")]
    UnknownIdentity(Identity),

    /// The storage provider rejected the document or did not answer in time.
    /// No ledger write has been attempted.
    #[error("storage upload failed: {0}")]
    StorageUploadFailed(String),

    /// Transport failure, confirmation timeout or an unclassified ledger
    /// rejection.
    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// Filename metadata could not be fetched. Only ever logged; display
    /// falls back to placeholder names.
    #[error("name resolution unavailable: {0}")]
    NameResolutionUnavailable(String),
}

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
