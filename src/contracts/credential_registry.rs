// src/contracts/credential_registry.rs
//! Academic credential registry smart contract interface.
//!
//! Binds the deployed `AcademicCredentialVerification` contract and exposes
//! it as a [`LedgerGateway`]:
//!
//! | Gateway operation | Contract function |
//! |---|---|
//! | `register` | `registerStudent(address,string,uint256,string,string,string)` |
//! | `append_issuance` | `issueMarksheet(address,string)` |
//! | `read_record` | `getStudentDetails(address)` |
//!
//! The contract signals duplicate registration and unknown students only
//! through revert messages, which are classified here.

use crate::blockchain::evm_client::{AdminMiddleware, EvmClient};
use crate::blockchain::ledger_gateway::{LedgerError, LedgerGateway, LedgerResult};
use crate::models::credential::{ContentIdentifier, StudentDetails, TransactionRef, TransactionStatus};
use crate::models::student::{Identity, StudentRecord};
use async_trait::async_trait;
use ethers_contract::Contract;
use ethers_core::types::{Address, U256};
use std::str::FromStr;
use std::sync::Arc;

/// Contract ABI, compile-time included.
const REGISTRY_ABI: &[u8] = include_bytes!("abi/AcademicCredentialVerification.json");

/// Revert message fragments meaning "a record already exists".
const ALREADY_REGISTERED_MARKERS: &[&str] = &["already registered", "already exists"];

/// Revert message fragments meaning "no record for this address".
const NOT_REGISTERED_MARKERS: &[&str] = &[
    "not registered",
    "does not exist",
    "not found",
    "no such student",
];

/// `getStudentDetails` return tuple: name, roll, branch, email, degree, hashes.
type DetailsTuple = (String, U256, String, String, String, Vec<String>);

/// Registry contract wrapper.
pub struct CredentialRegistry {
    client: Arc<EvmClient>,
    contract: Contract<AdminMiddleware>,
}

impl CredentialRegistry {
    /// Binds the registry deployed at `contract_address`.
    ///
    /// # Errors
    /// `InvalidConfig` if the address is malformed.
    pub fn new(client: Arc<EvmClient>, contract_address: &str) -> LedgerResult<Self> {
        let address = Address::from_str(contract_address.trim()).map_err(|e| {
            LedgerError::InvalidConfig(format!("contract address {:?}: {}", contract_address, e))
        })?;
        let contract = client.contract(address, REGISTRY_ABI)?;
        Ok(CredentialRegistry { client, contract })
    }
}

#[async_trait]
impl LedgerGateway for CredentialRegistry {
    fn signer(&self) -> Identity {
        Identity::from(self.client.admin_address())
    }

    async fn register(&self, record: &StudentRecord) -> LedgerResult<TransactionRef> {
        let params = (
            record.identity.address(),
            record.name.clone(),
            U256::from(record.roll_number),
            record.branch.clone(),
            record.email.clone(),
            record.degree.clone(),
        );
        self.client
            .send_transaction(&self.contract, "registerStudent", params)
            .await
            .map_err(classify)
    }

    async fn append_issuance(
        &self,
        identity: &Identity,
        content_id: &ContentIdentifier,
    ) -> LedgerResult<TransactionRef> {
        let params = (identity.address(), content_id.as_str().to_string());
        self.client
            .send_transaction(&self.contract, "issueMarksheet", params)
            .await
            .map_err(classify)
    }

    async fn read_record(&self, identity: &Identity) -> LedgerResult<Option<StudentDetails>> {
        let result: LedgerResult<DetailsTuple> = self
            .client
            .query_contract(&self.contract, "getStudentDetails", identity.address())
            .await;

        match result.map_err(classify) {
            Ok(details) => record_from_details(*identity, details),
            Err(LedgerError::NotRegistered) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn transaction_status(&self, tx: &TransactionRef) -> LedgerResult<TransactionStatus> {
        self.client.transaction_status(tx).await
    }
}

/// Maps revert reasons onto the registry's domain errors.
pub(crate) fn classify(err: LedgerError) -> LedgerError {
    let reason = match &err {
        LedgerError::Rejected(reason) => Some(reason.to_ascii_lowercase()),
        LedgerError::Reverted {
            reason: Some(reason),
            ..
        } => Some(reason.to_ascii_lowercase()),
        _ => None,
    };
    let Some(reason) = reason else {
        return err;
    };

    if ALREADY_REGISTERED_MARKERS.iter().any(|m| reason.contains(m)) {
        LedgerError::AlreadyRegistered
    } else if NOT_REGISTERED_MARKERS.iter().any(|m| reason.contains(m)) {
        LedgerError::NotRegistered
    } else {
        err
    }
}

/// Converts the contract's return tuple into a record.
///
/// Solidity mappings return an all-default struct for unknown keys; a zero
/// roll number (never accepted at registration) marks such an empty slot.
pub(crate) fn record_from_details(
    identity: Identity,
    (name, roll, branch, email, degree, hashes): DetailsTuple,
) -> LedgerResult<Option<StudentDetails>> {
    if roll.is_zero() {
        return Ok(None);
    }
    if roll > U256::from(u64::MAX) {
        return Err(LedgerError::Contract(format!(
            "roll number {} for {} exceeds 64 bits",
            roll, identity
        )));
    }

    Ok(Some(StudentDetails {
        record: StudentRecord {
            identity,
            name,
            roll_number: roll.as_u64(),
            branch,
            email,
            degree,
        },
        credentials: hashes.into_iter().map(ContentIdentifier::new).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity::parse("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap()
    }

    #[test]
    fn test_abi_declares_registry_functions() {
        let abi = ethers_core::abi::Abi::load(REGISTRY_ABI).unwrap();
        for name in ["registerStudent", "issueMarksheet", "getStudentDetails"] {
            assert!(abi.function(name).is_ok(), "missing {}", name);
        }
        assert_eq!(abi.function("getStudentDetails").unwrap().outputs.len(), 6);
    }

    #[test]
    fn test_classify_revert_reasons() {
        assert!(matches!(
            classify(LedgerError::Rejected("Student already registered".into())),
            LedgerError::AlreadyRegistered
        ));
        assert!(matches!(
            classify(LedgerError::Rejected("execution reverted: Student not registered".into())),
            LedgerError::NotRegistered
        ));
        assert!(matches!(
            classify(LedgerError::Reverted {
                tx: TransactionRef::from(ethers_core::types::H256::zero()),
                reason: Some("Student Already Registered".into()),
            }),
            LedgerError::AlreadyRegistered
        ));
        assert!(matches!(
            classify(LedgerError::Rejected("Only admin can perform this action".into())),
            LedgerError::Rejected(_)
        ));
        assert!(matches!(
            classify(LedgerError::Transport("connection refused".into())),
            LedgerError::Transport(_)
        ));
    }

    #[test]
    fn test_record_from_details() {
        let tuple: DetailsTuple = (
            "Asha Rao".into(),
            U256::from(101u64),
            "CSE".into(),
            "asha@example.edu".into(),
            "B.Tech".into(),
            vec!["QmA".into(), "QmB".into()],
        );
        let details = record_from_details(identity(), tuple).unwrap().unwrap();
        assert_eq!(details.record.roll_number, 101);
        assert_eq!(details.record.identity, identity());
        assert_eq!(
            details.credentials,
            vec![ContentIdentifier::new("QmA"), ContentIdentifier::new("QmB")]
        );
    }

    #[test]
    fn test_default_struct_is_not_found() {
        let empty: DetailsTuple = (
            String::new(),
            U256::zero(),
            String::new(),
            String::new(),
            String::new(),
            Vec::new(),
        );
        assert!(record_from_details(identity(), empty).unwrap().is_none());
    }

    #[test]
    fn test_oversized_roll_is_contract_error() {
        let tuple: DetailsTuple = (
            "X".into(),
            U256::MAX,
            String::new(),
            String::new(),
            String::new(),
            Vec::new(),
        );
        assert!(matches!(
            record_from_details(identity(), tuple),
            Err(LedgerError::Contract(_))
        ));
    }
}
