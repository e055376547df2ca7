// src/models/credential.rs
//! Credential documents, content identifiers and issuance bindings.
//!
//! A credential is an arbitrary document (typically a marksheet PDF). It is
//! never stored on the ledger itself: the ledger keeps only the document's
//! [`ContentIdentifier`], bound to the student's identity.

use crate::error::{RegistryError, RegistryResult};
use crate::models::student::{Identity, StudentRecord};
use bytes::Bytes;
use ethers_core::types::H256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of leading characters kept in placeholder labels.
const PLACEHOLDER_PREFIX_LEN: usize = 8;

/// Content identifier of a document, as issued by the storage provider or
/// recomputed locally.
///
/// Treated as opaque: identifiers read back from the ledger are kept as-is,
/// whatever their encoding.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentIdentifier(String);

impl ContentIdentifier {
    pub fn new(value: impl Into<String>) -> Self {
        ContentIdentifier(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Display label used when no filename is known for this identifier.
    ///
    /// # Example
    /// `QmbFMke1... (Unknown File)`
    pub fn placeholder_label(&self) -> String {
        let prefix: String = self.0.chars().take(PLACEHOLDER_PREFIX_LEN).collect();
        format!("{}... (Unknown File)", prefix)
    }
}

impl fmt::Display for ContentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document presented for issuance or verification.
#[derive(Debug, Clone)]
pub struct Document {
    /// Original filename, kept by the storage provider as pin metadata
    pub filename: Option<String>,

    /// Raw document bytes
    pub bytes: Bytes,
}

impl Document {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Document {
            filename: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        self.filename = if filename.trim().is_empty() {
            None
        } else {
            Some(filename)
        };
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// One issuance entry: a document identifier bound to a student.
///
/// `sequence` is the zero-based position in the student's issuance list,
/// i.e. the order in which the ledger accepted the bindings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CredentialIssuance {
    pub identity: Identity,
    pub content_id: ContentIdentifier,
    pub sequence: usize,
}

/// A student's record together with every credential bound to it, in
/// issuance order. Duplicates are kept.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StudentDetails {
    pub record: StudentRecord,
    pub credentials: Vec<ContentIdentifier>,
}

impl StudentDetails {
    /// Issuance entries in ledger order.
    pub fn issuances(&self) -> Vec<CredentialIssuance> {
        self.credentials
            .iter()
            .enumerate()
            .map(|(sequence, content_id)| CredentialIssuance {
                identity: self.record.identity,
                content_id: content_id.clone(),
                sequence,
            })
            .collect()
    }

    /// Credentials with repeated identifiers removed, first occurrence wins.
    pub fn distinct_credentials(&self) -> Vec<ContentIdentifier> {
        let mut seen = std::collections::HashSet::new();
        self.credentials
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect()
    }

    /// Exact, order-independent membership test.
    pub fn holds(&self, content_id: &ContentIdentifier) -> bool {
        self.credentials.iter().any(|id| id == content_id)
    }
}

/// A credential identifier decorated with a human-readable name.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NamedCredential {
    pub content_id: ContentIdentifier,

    /// Original filename, or a placeholder label when unknown
    pub name: String,

    /// `false` when `name` is a placeholder
    pub resolved: bool,
}

/// Student details ready for display.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StudentSummary {
    pub record: StudentRecord,
    pub credentials: Vec<NamedCredential>,
}

/// Outcome of checking a presented document against a student's issuances.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub identity: Identity,
    pub content_id: ContentIdentifier,
    pub matched: bool,

    /// Whether the ledger holds a record for `identity` at all
    pub registered: bool,
}

/// Outcome of a successful issuance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IssuedCredential {
    pub content_id: ContentIdentifier,
    pub transaction: TransactionRef,
}

/// Hash of a ledger transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionRef(H256);

impl TransactionRef {
    pub fn hash(&self) -> H256 {
        self.0
    }
}

impl From<H256> for TransactionRef {
    fn from(hash: H256) -> Self {
        TransactionRef(hash)
    }
}

impl FromStr for TransactionRef {
    type Err = RegistryError;

    fn from_str(s: &str) -> RegistryResult<Self> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        if digits.len() != 64 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(RegistryError::InvalidInput(format!(
                "malformed transaction hash {:?}",
                trimmed
            )));
        }
        let bytes = ethers_core::utils::hex::decode(digits)
            .map_err(|e| RegistryError::InvalidInput(e.to_string()))?;
        Ok(TransactionRef(H256::from_slice(&bytes)))
    }
}

impl TryFrom<String> for TransactionRef {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TransactionRef> for String {
    fn from(tx: TransactionRef) -> Self {
        tx.to_string()
    }
}

impl fmt::Display for TransactionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl fmt::Debug for TransactionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionRef({})", self)
    }
}

/// Confirmation state of a ledger transaction.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Known to the network but not yet mined
    Pending,
    /// Mined and successful
    Confirmed { block_number: u64 },
    /// Mined but reverted
    Failed { block_number: u64 },
    /// Unknown to the network
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> StudentRecord {
        StudentRecord {
            identity: Identity::parse("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap(),
            name: "Asha Rao".into(),
            roll_number: 101,
            branch: "CSE".into(),
            email: "asha@example.edu".into(),
            degree: "B.Tech".into(),
        }
    }

    #[test]
    fn test_placeholder_label_truncates() {
        let id = ContentIdentifier::new("QmbFMke1KXqnYyBBWxB74N4c5SBnJMVAiMNRcGu6x1AwQH");
        assert_eq!(id.placeholder_label(), "QmbFMke1... (Unknown File)");
        assert_eq!(ContentIdentifier::new("Qm").placeholder_label(), "Qm... (Unknown File)");
    }

    #[test]
    fn test_issuances_keep_order_and_duplicates() {
        let a = ContentIdentifier::new("QmA");
        let b = ContentIdentifier::new("QmB");
        let details = StudentDetails {
            record: record(),
            credentials: vec![a.clone(), b.clone(), a.clone()],
        };

        let issuances = details.issuances();
        assert_eq!(issuances.len(), 3);
        assert_eq!(issuances[2].content_id, a);
        assert_eq!(issuances[2].sequence, 2);
        assert_eq!(details.distinct_credentials(), vec![a.clone(), b]);
        assert!(details.holds(&a));
        assert!(!details.holds(&ContentIdentifier::new("QmC")));
    }

    #[test]
    fn test_transaction_ref_parse_and_display() {
        let text = format!("0x{}", "ab".repeat(32));
        let tx: TransactionRef = text.parse().unwrap();
        assert_eq!(tx.to_string(), text);
        assert_eq!(serde_json::to_string(&tx).unwrap(), format!("\"{}\"", text));
        assert!("0x1234".parse::<TransactionRef>().is_err());
        assert!(format!("0x{}", "zz".repeat(32)).parse::<TransactionRef>().is_err());
    }

    #[test]
    fn test_document_filename_blank_is_none() {
        let doc = Document::new(b"data".to_vec()).with_filename("  ");
        assert!(doc.filename.is_none());
        let doc = Document::new(b"data".to_vec()).with_filename("marks.pdf");
        assert_eq!(doc.filename.as_deref(), Some("marks.pdf"));
        assert_eq!(doc.len(), 4);
    }
}
