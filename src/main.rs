// src/main.rs

//! # Credential Registry - Main Entry Point
//!
//! Loads configuration, connects the ledger and storage backends, and starts
//! the API server.
//!
//! ## Configuration
//! See [`credential_registry::config`]. The usual deployment variables are:
//! - `WEB3_PROVIDER`: JSON-RPC endpoint of the chain
//! - `PRIVATE_KEY`: Admin wallet private key
//! - `ADMIN_ADDRESS`: (Optional) expected admin address, checked against the key
//! - `CONTRACT_ADDRESS`: Deployed registry contract address
//! - `PINATA_API_KEY` / `PINATA_SECRET`: Pinata credentials

use anyhow::Context;
use credential_registry::blockchain::evm_client::EvmClient;
use credential_registry::blockchain::ledger_gateway::LedgerGateway;
use credential_registry::blockchain::memory_ledger::InMemoryLedger;
use credential_registry::config::{LedgerBackend, Settings, StorageBackend};
use credential_registry::contracts::credential_registry::CredentialRegistry;
use credential_registry::models::student::Identity;
use credential_registry::services::api_server::ApiServer;
use credential_registry::services::registry_engine::RegistryEngine;
use credential_registry::storage::blob_store::BlobStore;
use credential_registry::storage::ipfs_client::IpfsStorage;
use credential_registry::storage::memory::InMemoryBlobStore;
use credential_registry::storage::pinata_client::PinataClient;
use dotenv::dotenv;
use std::sync::Arc;

/// Main application entry point
///
/// # Initialization Sequence
/// 1. Load `.env` and layered settings
/// 2. Connect the ledger backend
/// 3. Build the storage backend
/// 4. Start API server
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::load().context("invalid configuration")?;
    log::debug!("Loaded settings: {:?}", settings);

    let ledger = connect_ledger(&settings).await?;
    let store = connect_store(&settings)?;
    let engine = RegistryEngine::new(ledger, store, settings.engine_options());
    log::info!(
        "Ledger backend {:?} (admin {}), storage backend {:?}",
        settings.ledger.backend,
        engine.admin(),
        settings.storage.backend
    );

    let api_server = ApiServer::new(
        engine,
        &settings.storage.gateway_url,
        settings.server.max_document_bytes,
    );

    api_server.run(settings.bind_address()?).await
}

async fn connect_ledger(settings: &Settings) -> anyhow::Result<Arc<dyn LedgerGateway>> {
    let ledger = &settings.ledger;
    match ledger.backend {
        LedgerBackend::Evm => {
            let rpc_url = ledger.rpc_url.as_deref().context("ledger.rpc_url is not set")?;
            let key = ledger
                .admin_private_key
                .as_deref()
                .context("ledger.admin_private_key is not set")?;
            let contract = ledger
                .contract_address
                .as_deref()
                .context("ledger.contract_address is not set")?;

            let client = EvmClient::connect(rpc_url, key, settings.evm_options())
                .await
                .context("failed to connect to the chain")?;
            let registry = CredentialRegistry::new(Arc::new(client), contract)
                .context("failed to bind the registry contract")?;
            log::info!("Registry contract at {}", contract);
            Ok(Arc::new(registry))
        }
        LedgerBackend::Memory => {
            let admin = match ledger.signer_address()? {
                Some(address) => Identity::from(address),
                None => Identity::parse("0x000000000000000000000000000000000000ad31")?,
            };
            log::warn!("Using the in-memory ledger; records are lost on exit");
            Ok(Arc::new(InMemoryLedger::new(admin)))
        }
    }
}

fn connect_store(settings: &Settings) -> anyhow::Result<Arc<dyn BlobStore>> {
    Ok(match settings.storage.backend {
        StorageBackend::Pinata => Arc::new(
            PinataClient::new(settings.pinata_config()).context("failed to build Pinata client")?,
        ),
        StorageBackend::Ipfs => Arc::new(
            IpfsStorage::new(&settings.storage.ipfs_api_url)
                .context("failed to build IPFS client")?,
        ),
        StorageBackend::Memory => {
            log::warn!("Using the in-memory blob store; documents are lost on exit");
            Arc::new(InMemoryBlobStore::new(settings.addresser()))
        }
    })
}
