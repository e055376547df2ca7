// src/blockchain/mod.rs
//! Ledger access: the gateway trait and its backends.

pub mod evm_client;
pub mod ledger_gateway;
pub mod memory_ledger;
