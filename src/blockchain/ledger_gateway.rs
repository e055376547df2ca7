// src/blockchain/ledger_gateway.rs
//! Ledger gateway interface.
//!
//! The ledger is the single source of truth for student records and
//! issuance bindings. All writes go out under one admin signer; the gateway
//! owns transaction sequencing for that signer so concurrent callers never
//! race on write order.

use crate::models::credential::{ContentIdentifier, StudentDetails, TransactionRef, TransactionStatus};
use crate::models::student::{Identity, StudentRecord};
use async_trait::async_trait;
use thiserror::Error;

/// Errors from ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The registry already holds a record for the identity.
    #[error("identity already registered")]
    AlreadyRegistered,

    /// The registry holds no record for the identity.
    #[error("identity not registered")]
    NotRegistered,

    /// The ledger refused the call before submission (revert during
    /// simulation) for a reason not covered by the variants above.
    #[error("ledger rejected call: {0}")]
    Rejected(String),

    /// The transaction was mined but reverted.
    #[error("transaction {tx} reverted{}", reason_suffix(.reason))]
    Reverted {
        tx: TransactionRef,
        reason: Option<String>,
    },

    /// The transaction was broadcast but not confirmed in time. It may
    /// still be mined; its status can be queried with the reference.
    #[error("transaction {0} not confirmed in time")]
    ConfirmationTimeout(TransactionRef),

    /// Connection or RPC failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Contract binding or ABI encoding failure.
    #[error("contract error: {0}")]
    Contract(String),

    /// The gateway could not be built from its configuration.
    #[error("invalid ledger configuration: {0}")]
    InvalidConfig(String),
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason.as_ref().map(|r| format!(": {}", r)).unwrap_or_default()
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Append-only student registry on a ledger.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Account every write is signed by.
    fn signer(&self) -> Identity;

    /// Creates the record for `record.identity`.
    ///
    /// Fails with `AlreadyRegistered` if a record exists; never overwrites.
    async fn register(&self, record: &StudentRecord) -> LedgerResult<TransactionRef>;

    /// Appends `content_id` to the identity's issuance list.
    ///
    /// Fails with `NotRegistered` if the identity has no record.
    async fn append_issuance(
        &self,
        identity: &Identity,
        content_id: &ContentIdentifier,
    ) -> LedgerResult<TransactionRef>;

    /// Reads the record and its issuances in ledger order; `None` if absent.
    async fn read_record(&self, identity: &Identity) -> LedgerResult<Option<StudentDetails>>;

    /// Confirmation state of a transaction previously returned by a write.
    async fn transaction_status(&self, tx: &TransactionRef) -> LedgerResult<TransactionStatus>;
}
