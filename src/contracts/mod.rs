// src/contracts/mod.rs
//! Smart contract bindings.

pub mod credential_registry;
