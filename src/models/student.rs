// src/models/student.rs
//! Student identity and registration data model.
//!
//! A student is identified by an EVM account address. The address is the key
//! of the on-chain registry: one address maps to at most one [`StudentRecord`].

use crate::error::{RegistryError, RegistryResult};
use ethers_core::types::Address;
use ethers_core::utils::{hex, to_checksum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ledger account reference of a student.
///
/// # Accepted forms
/// `0x` followed by 40 hex digits, either in a single case or in correct
/// EIP-55 mixed-case checksum form. The zero address is rejected since the
/// registry contract treats it as "no account".
///
/// # Display
/// Always rendered in EIP-55 checksum form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(Address);

impl Identity {
    /// Parses and validates a textual account reference.
    pub fn parse(input: &str) -> RegistryResult<Self> {
        let trimmed = input.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| invalid(trimmed, "missing 0x prefix"))?;

        if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid(trimmed, "expected 40 hex digits"));
        }

        let bytes = hex::decode(digits).map_err(|e| invalid(trimmed, &e.to_string()))?;
        let address = Address::from_slice(&bytes);

        let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper && to_checksum(&address, None)[2..] != *digits {
            return Err(invalid(trimmed, "EIP-55 checksum mismatch"));
        }

        if address.is_zero() {
            return Err(invalid(trimmed, "zero address"));
        }

        Ok(Identity(address))
    }

    /// Raw 20-byte address.
    pub fn address(&self) -> Address {
        self.0
    }
}

fn invalid(input: &str, reason: &str) -> RegistryError {
    RegistryError::InvalidInput(format!("malformed account address {:?}: {}", input, reason))
}

impl From<Address> for Identity {
    fn from(address: Address) -> Self {
        Identity(address)
    }
}

impl FromStr for Identity {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Identity::parse(s)
    }
}

impl TryFrom<String> for Identity {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Identity::parse(&value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.to_string()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_checksum(&self.0, None))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self)
    }
}

/// A registered student as held by the ledger.
///
/// Created once by the admin registration call and never modified afterwards.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StudentRecord {
    /// Account the record is keyed by
    pub identity: Identity,

    /// Full name as registered
    pub name: String,

    /// Institution roll number, always positive
    pub roll_number: u64,

    /// Branch of study, e.g. "Computer Science"
    pub branch: String,

    /// Contact email
    pub email: String,

    /// Degree programme, e.g. "B.Tech"
    pub degree: String,
}

/// Registration input as supplied by an operator: every field is plain text.
///
/// [`RegistrationRequest::validate`] turns it into a [`StudentRecord`].
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RegistrationRequest {
    pub address: String,
    pub name: String,
    pub roll_number: String,
    pub branch: String,
    pub email: String,
    pub degree: String,
}

impl RegistrationRequest {
    /// Checks the address and roll number and builds the record to register.
    ///
    /// # Errors
    /// `InvalidInput` for a malformed address or a roll number that is not a
    /// positive integer.
    pub fn validate(&self) -> RegistryResult<StudentRecord> {
        let identity = Identity::parse(&self.address)?;
        let roll_number = parse_roll_number(&self.roll_number)?;

        Ok(StudentRecord {
            identity,
            name: self.name.trim().to_string(),
            roll_number,
            branch: self.branch.trim().to_string(),
            email: self.email.trim().to_string(),
            degree: self.degree.trim().to_string(),
        })
    }
}

/// Parses a roll number, which must be a positive integer.
pub fn parse_roll_number(input: &str) -> RegistryResult<u64> {
    let trimmed = input.trim();
    match trimmed.parse::<u64>() {
        Ok(0) => Err(RegistryError::InvalidInput(
            "roll number must be positive".to_string(),
        )),
        Ok(roll) => Ok(roll),
        Err(_) => Err(RegistryError::InvalidInput(format!(
            "roll number {:?} is not a positive integer",
            trimmed
        ))),
    }
}
