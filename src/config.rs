// src/config.rs
//! Service configuration.
//!
//! Settings are layered, later sources winning:
//! 1. built-in defaults
//! 2. an optional TOML file (`config/registry.toml`, or the path in `REGISTRY_CONFIG`)
//! 3. `REGISTRY__<SECTION>__<KEY>` environment variables
//! 4. the deployment variables `WEB3_PROVIDER`, `PRIVATE_KEY`, `ADMIN_ADDRESS`,
//!    `CONTRACT_ADDRESS`, `PINATA_API_KEY` and `PINATA_SECRET`

use crate::blockchain::evm_client::EvmClientOptions;
use crate::services::api_server::{DEFAULT_GATEWAY_URL, DEFAULT_MAX_DOCUMENT_BYTES};
use crate::services::registry_engine::EngineOptions;
use crate::storage::ipfs_client::DEFAULT_IPFS_API_URL;
use crate::storage::pinata_client::{PinataConfig, DEFAULT_API_URL};
use crate::utils::crypto::{ContentAddresser, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_LINKS};
use config::{Config, ConfigError, Environment, File};
use ethers_core::types::Address;
use ethers_core::utils::{hex, secret_key_to_address};
use k256::ecdsa::SigningKey;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Config file used when `REGISTRY_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config/registry.toml";

/// Legacy deployment variables and the keys they override.
const LEGACY_OVERRIDES: &[(&str, &str)] = &[
    ("WEB3_PROVIDER", "ledger.rpc_url"),
    ("PRIVATE_KEY", "ledger.admin_private_key"),
    ("ADMIN_ADDRESS", "ledger.admin_address"),
    ("CONTRACT_ADDRESS", "ledger.contract_address"),
    ("PINATA_API_KEY", "storage.pinata_api_key"),
    ("PINATA_SECRET", "storage.pinata_secret"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    /// Registry contract on an EVM chain
    Evm,
    /// In-process ledger
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Pinata pinning service
    Pinata,
    /// Local IPFS node API
    Ipfs,
    /// In-process store
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub bind_address: String,
    pub max_document_bytes: usize,
}

#[derive(Clone, Deserialize)]
pub struct LedgerSettings {
    pub backend: LedgerBackend,
    pub rpc_url: Option<String>,
    pub contract_address: Option<String>,
    pub admin_private_key: Option<String>,
    /// Expected admin account; must match the key when set
    pub admin_address: Option<String>,
    pub confirmations: usize,
    pub confirmation_timeout_secs: u64,
    pub gas_limit: Option<u64>,
}

#[derive(Clone, Deserialize)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub pinata_api_url: String,
    pub pinata_api_key: Option<String>,
    pub pinata_secret: Option<String>,
    pub pinata_jwt: Option<String>,
    pub ipfs_api_url: String,
    pub gateway_url: String,
    pub upload_timeout_secs: u64,
    pub name_lookup_timeout_secs: u64,
    pub chunk_size: usize,
    pub max_links: usize,
    pub strict_addressing: bool,
    pub page_limit: usize,
    pub max_pages: usize,
}

/// Complete service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub ledger: LedgerSettings,
    pub storage: StorageSettings,
}

impl Settings {
    /// Loads settings from the process environment and the config file.
    ///
    /// # Errors
    /// `ConfigError` if a source is malformed or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        let env: HashMap<String, String> = std::env::vars().collect();
        let path = env
            .get("REGISTRY_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::from_sources(Some(&path), &env)
    }

    /// Builds settings from an optional file and an explicit environment map.
    pub fn from_sources(
        file: Option<&Path>,
        env: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.bind_address", "127.0.0.1:3000")?
            .set_default("server.max_document_bytes", DEFAULT_MAX_DOCUMENT_BYTES as i64)?
            .set_default("ledger.backend", "evm")?
            .set_default("ledger.confirmations", 1i64)?
            .set_default("ledger.confirmation_timeout_secs", 120i64)?
            .set_default("storage.backend", "pinata")?
            .set_default("storage.pinata_api_url", DEFAULT_API_URL)?
            .set_default("storage.ipfs_api_url", DEFAULT_IPFS_API_URL)?
            .set_default("storage.gateway_url", DEFAULT_GATEWAY_URL)?
            .set_default("storage.upload_timeout_secs", 60i64)?
            .set_default("storage.name_lookup_timeout_secs", 10i64)?
            .set_default("storage.chunk_size", DEFAULT_CHUNK_SIZE as i64)?
            .set_default("storage.max_links", DEFAULT_MAX_LINKS as i64)?
            .set_default("storage.strict_addressing", true)?
            .set_default("storage.page_limit", 1000i64)?
            .set_default("storage.max_pages", 10i64)?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix("REGISTRY")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(Some(env.clone())),
        );

        for (var, key) in LEGACY_OVERRIDES {
            let value = env.get(*var).filter(|v| !v.trim().is_empty()).cloned();
            builder = builder.set_override_option(*key, value)?;
        }

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks that the selected backends have what they need.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_address()?;

        if self.ledger.backend == LedgerBackend::Evm {
            for (name, value) in [
                ("ledger.rpc_url (WEB3_PROVIDER)", &self.ledger.rpc_url),
                ("ledger.contract_address (CONTRACT_ADDRESS)", &self.ledger.contract_address),
                ("ledger.admin_private_key (PRIVATE_KEY)", &self.ledger.admin_private_key),
            ] {
                if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
                    return Err(missing(name));
                }
            }

            let signer = self.ledger.signer_address()?;
            if let (Some(expected), Some(signer)) = (&self.ledger.admin_address, signer) {
                let expected = Address::from_str(expected.trim()).map_err(|e| {
                    ConfigError::Message(format!("ledger.admin_address {:?}: {}", expected, e))
                })?;
                if expected != signer {
                    return Err(ConfigError::Message(format!(
                        "admin key controls {:?}, not the configured admin address {:?}",
                        signer, expected
                    )));
                }
            }
        }

        if self.storage.backend == StorageBackend::Pinata {
            let has_jwt = self.storage.pinata_jwt.as_deref().map_or(false, |v| !v.trim().is_empty());
            let has_keys = self.storage.pinata_api_key.is_some() && self.storage.pinata_secret.is_some();
            if !has_jwt && !has_keys {
                return Err(missing(
                    "storage.pinata_jwt or storage.pinata_api_key + storage.pinata_secret (PINATA_API_KEY, PINATA_SECRET)",
                ));
            }
        }

        if self.storage.page_limit == 0 || self.storage.max_pages == 0 {
            return Err(ConfigError::Message(
                "storage.page_limit and storage.max_pages must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        self.server.bind_address.trim().parse().map_err(|e| {
            ConfigError::Message(format!("server.bind_address {:?}: {}", self.server.bind_address, e))
        })
    }

    pub fn evm_options(&self) -> EvmClientOptions {
        EvmClientOptions {
            confirmations: self.ledger.confirmations,
            confirmation_timeout: Duration::from_secs(self.ledger.confirmation_timeout_secs),
            gas_limit: self.ledger.gas_limit,
        }
    }

    pub fn pinata_config(&self) -> PinataConfig {
        PinataConfig {
            api_url: self.storage.pinata_api_url.clone(),
            api_key: self.storage.pinata_api_key.clone(),
            api_secret: self.storage.pinata_secret.clone(),
            jwt: self.storage.pinata_jwt.clone(),
            timeout: Duration::from_secs(self.storage.upload_timeout_secs),
            page_limit: self.storage.page_limit,
            max_pages: self.storage.max_pages,
        }
    }

    pub fn addresser(&self) -> ContentAddresser {
        ContentAddresser::new(self.storage.chunk_size, self.storage.max_links)
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            addresser: self.addresser(),
            upload_timeout: Duration::from_secs(self.storage.upload_timeout_secs),
            name_lookup_timeout: Duration::from_secs(self.storage.name_lookup_timeout_secs),
            strict_addressing: self.storage.strict_addressing,
        }
    }
}

impl LedgerSettings {
    /// Address controlled by the configured admin key, if one is set.
    pub fn signer_address(&self) -> Result<Option<Address>, ConfigError> {
        let Some(key) = self.admin_private_key.as_deref().map(str::trim) else {
            return Ok(None);
        };
        let bytes = hex::decode(key.strip_prefix("0x").unwrap_or(key))
            .map_err(|_| ConfigError::Message("ledger.admin_private_key is not hex".to_string()))?;
        let signing_key = SigningKey::from_slice(&bytes).map_err(|_| {
            ConfigError::Message("ledger.admin_private_key is not a valid secp256k1 key".to_string())
        })?;
        Ok(Some(secret_key_to_address(&signing_key)))
    }
}

fn missing(name: &str) -> ConfigError {
    ConfigError::Message(format!("missing required setting {}", name))
}

fn redact(value: &Option<String>) -> &'static str {
    if value.is_some() {
        "<set>"
    } else {
        "<unset>"
    }
}

impl std::fmt::Debug for LedgerSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerSettings")
            .field("backend", &self.backend)
            .field("rpc_url", &self.rpc_url)
            .field("contract_address", &self.contract_address)
            .field("admin_private_key", &redact(&self.admin_private_key))
            .field("admin_address", &self.admin_address)
            .field("confirmations", &self.confirmations)
            .field("confirmation_timeout_secs", &self.confirmation_timeout_secs)
            .field("gas_limit", &self.gas_limit)
            .finish()
    }
}

impl std::fmt::Debug for StorageSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageSettings")
            .field("backend", &self.backend)
            .field("pinata_api_url", &self.pinata_api_url)
            .field("pinata_api_key", &redact(&self.pinata_api_key))
            .field("pinata_secret", &redact(&self.pinata_secret))
            .field("pinata_jwt", &redact(&self.pinata_jwt))
            .field("ipfs_api_url", &self.ipfs_api_url)
            .field("gateway_url", &self.gateway_url)
            .field("upload_timeout_secs", &self.upload_timeout_secs)
            .field("strict_addressing", &self.strict_addressing)
            .finish_non_exhaustive()
    }
}
