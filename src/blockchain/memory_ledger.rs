// src/blockchain/memory_ledger.rs
//! In-process ledger with the registry contract's semantics.
//!
//! Every accepted write is "mined" immediately into its own block, so
//! transaction references are confirmed as soon as they are returned. Used by
//! tests and by `ledger.backend = "memory"` local runs.

use crate::blockchain::ledger_gateway::{LedgerError, LedgerGateway, LedgerResult};
use crate::models::credential::{ContentIdentifier, StudentDetails, TransactionRef, TransactionStatus};
use crate::models::student::{Identity, StudentRecord};
use async_trait::async_trait;
use ethers_core::types::H256;
use ethers_core::utils::keccak256;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct LedgerState {
    students: HashMap<Identity, StudentDetails>,
    /// Accepted transactions; index + 1 is the block number
    transactions: Vec<TransactionRef>,
}

impl LedgerState {
    fn commit(&mut self, kind: &[u8], identity: &Identity) -> TransactionRef {
        let mut preimage = Vec::with_capacity(kind.len() + 28);
        preimage.extend_from_slice(kind);
        preimage.extend_from_slice(&(self.transactions.len() as u64).to_be_bytes());
        preimage.extend_from_slice(identity.address().as_bytes());
        let tx = TransactionRef::from(H256::from(keccak256(&preimage)));
        self.transactions.push(tx);
        tx
    }
}

/// [`LedgerGateway`] held entirely in memory.
pub struct InMemoryLedger {
    admin: Identity,
    state: RwLock<LedgerState>,
}

impl InMemoryLedger {
    /// Creates an empty ledger whose writes are attributed to `admin`.
    pub fn new(admin: Identity) -> Self {
        InMemoryLedger {
            admin,
            state: RwLock::new(LedgerState::default()),
        }
    }

    /// Number of accepted write transactions.
    pub async fn transaction_count(&self) -> usize {
        self.state.read().await.transactions.len()
    }

    /// Number of registered students.
    pub async fn student_count(&self) -> usize {
        self.state.read().await.students.len()
    }
}

#[async_trait]
impl LedgerGateway for InMemoryLedger {
    fn signer(&self) -> Identity {
        self.admin
    }

    async fn register(&self, record: &StudentRecord) -> LedgerResult<TransactionRef> {
        let mut state = self.state.write().await;
        if state.students.contains_key(&record.identity) {
            return Err(LedgerError::AlreadyRegistered);
        }
        let tx = state.commit(b"registerStudent", &record.identity);
        state.students.insert(
            record.identity,
            StudentDetails {
                record: record.clone(),
                credentials: Vec::new(),
            },
        );
        Ok(tx)
    }

    async fn append_issuance(
        &self,
        identity: &Identity,
        content_id: &ContentIdentifier,
    ) -> LedgerResult<TransactionRef> {
        let mut state = self.state.write().await;
        if !state.students.contains_key(identity) {
            return Err(LedgerError::NotRegistered);
        }
        let tx = state.commit(b"issueMarksheet", identity);
        if let Some(details) = state.students.get_mut(identity) {
            details.credentials.push(content_id.clone());
        }
        Ok(tx)
    }

    async fn read_record(&self, identity: &Identity) -> LedgerResult<Option<StudentDetails>> {
        Ok(self.state.read().await.students.get(identity).cloned())
    }

    async fn transaction_status(&self, tx: &TransactionRef) -> LedgerResult<TransactionStatus> {
        let state = self.state.read().await;
        Ok(match state.transactions.iter().position(|known| known == tx) {
            Some(index) => TransactionStatus::Confirmed {
                block_number: index as u64 + 1,
            },
            None => TransactionStatus::NotFound,
        })
    }
}

impl std::fmt::Debug for InMemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLedger")
            .field("admin", &self.admin)
            .finish_non_exhaustive()
    }
}
