// src/storage/mod.rs
//! Content-addressed storage backends.

pub mod blob_store;
pub mod ipfs_client;
pub mod memory;
pub mod pinata_client;
