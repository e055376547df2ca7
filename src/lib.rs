// src/lib.rs

//! # Credential Registry
//!
//! Registers students on a ledger-backed registry, issues credential
//! documents by pinning them to IPFS and binding their content identifiers
//! to the student on the ledger, and verifies presented documents against
//! those bindings.
//!
//! ## Architecture Overview
//! 1. **Blockchain Layer**: [`LedgerGateway`] with an EVM implementation and an in-memory one
//! 2. **Contracts Layer**: binding for the `AcademicCredentialVerification` registry contract
//! 3. **Storage Layer**: [`BlobStore`] over Pinata, a local IPFS node, or memory
//! 4. **Services Layer**: [`RegistryEngine`] and the HTTP API
//! 5. **Utils**: UnixFS/CIDv0 content addressing

pub mod blockchain;  // Ledger gateway and EVM client
pub mod config;      // Layered settings
pub mod contracts;   // Registry contract binding
pub mod error;       // Engine error kinds
pub mod models;      // Data structures
pub mod services;    // Business logic and API
pub mod storage;     // Content-addressed storage
pub mod utils;       // Content addressing

pub use blockchain::ledger_gateway::LedgerGateway;
pub use error::{RegistryError, RegistryResult};
pub use services::registry_engine::{EngineOptions, RegistryEngine};
pub use storage::blob_store::BlobStore;
