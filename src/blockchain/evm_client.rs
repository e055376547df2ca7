// src/blockchain/evm_client.rs
//! EVM blockchain client.
//!
//! Provides a high-level interface for an EVM-compatible chain: contract
//! binding, sequenced transaction submission under the admin wallet,
//! confirmation tracking and read-only contract queries.

use crate::blockchain::ledger_gateway::{LedgerError, LedgerResult};
use crate::models::credential::{TransactionRef, TransactionStatus};
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers_contract::{BaseContract, Contract, ContractError};
use ethers_core::{
    abi::{self, Abi, Detokenize, ParamType, Tokenize},
    types::{Address, BlockId, BlockNumber, U256, U64},
    utils::hex,
};
use k256::ecdsa::SigningKey;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;

/// Middleware stack used for every write. Nonces are assigned by
/// [`EvmClient::send_transaction`], not by the middleware.
pub type AdminMiddleware = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Selector of Solidity's `Error(string)`.
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Submission and confirmation settings.
#[derive(Debug, Clone)]
pub struct EvmClientOptions {
    /// Blocks to wait for after inclusion
    pub confirmations: usize,
    /// Upper bound on the wait for confirmations
    pub confirmation_timeout: Duration,
    /// Fixed gas limit; the node's estimate is used when unset
    pub gas_limit: Option<u64>,
}

impl Default for EvmClientOptions {
    fn default() -> Self {
        EvmClientOptions {
            confirmations: 1,
            confirmation_timeout: Duration::from_secs(120),
            gas_limit: None,
        }
    }
}

/// EVM client holding the admin wallet.
///
/// All writes are funnelled through [`EvmClient::send_transaction`], which
/// holds the nonce lock from simulation until broadcast: the admin account
/// behaves as a single logical writer.
pub struct EvmClient {
    /// Provider with signer
    client: Arc<AdminMiddleware>,
    /// Next admin nonce; `None` until loaded or after a failed broadcast.
    /// Held from simulation until broadcast.
    next_nonce: Mutex<Option<U256>>,
    confirmations: usize,
    confirmation_timeout: Duration,
    gas_limit: Option<U256>,
}

impl EvmClient {
    /// Connects to `rpc_url` and loads the admin wallet.
    ///
    /// # Arguments
    /// * `rpc_url` - JSON-RPC endpoint
    /// * `private_key` - Hex-encoded secp256k1 key (with or without 0x prefix)
    ///
    /// # Errors
    /// - `InvalidConfig` if the URL or key is malformed
    /// - `Transport` if the chain ID cannot be fetched
    pub async fn connect(
        rpc_url: &str,
        private_key: &str,
        options: EvmClientOptions,
    ) -> LedgerResult<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| LedgerError::InvalidConfig(format!("RPC url {:?}: {}", rpc_url, e)))?;

        let key = private_key.trim();
        let key_bytes = hex::decode(key.strip_prefix("0x").unwrap_or(key))
            .map_err(|_| LedgerError::InvalidConfig("admin private key is not hex".to_string()))?;
        let signing_key = SigningKey::from_slice(&key_bytes)
            .map_err(|_| LedgerError::InvalidConfig("admin private key is not a valid secp256k1 scalar".to_string()))?;

        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?
            .as_u64();
        let wallet = LocalWallet::from(signing_key).with_chain_id(chain_id);
        let admin = wallet.address();

        let client = SignerMiddleware::new(provider, wallet);
        log::info!("Connected to chain {} as admin {:?}", chain_id, admin);

        Ok(EvmClient {
            client: Arc::new(client),
            next_nonce: Mutex::new(None),
            confirmations: options.confirmations.max(1),
            confirmation_timeout: options.confirmation_timeout,
            gas_limit: options.gas_limit.map(U256::from),
        })
    }

    /// Gets the admin wallet's address.
    pub fn admin_address(&self) -> Address {
        self.client.address()
    }

    /// Binds a deployed contract through the admin middleware.
    ///
    /// # Errors
    /// `Contract` if `abi` is not a valid JSON ABI.
    pub fn contract(&self, address: Address, abi: &[u8]) -> LedgerResult<Contract<AdminMiddleware>> {
        let abi = Abi::load(abi).map_err(|e| LedgerError::Contract(e.to_string()))?;
        Ok(Contract::new(address, BaseContract::from(abi), self.client.clone()))
    }

    /// Submits a state-changing contract call and waits for confirmation.
    ///
    /// # Process Flow
    /// 1. Simulates the call through gas estimation; a revert here is
    ///    returned as `Rejected` and nothing is broadcast
    /// 2. Broadcasts with the next local nonce; after a failed broadcast the
    ///    nonce is reloaded from the chain's pending count on the next write
    /// 3. Waits for the configured confirmations with a timeout
    /// 4. For a mined-but-reverted transaction, replays the call at the
    ///    inclusion block to recover the revert reason
    ///
    /// Steps 1 and 2 run under the nonce lock.
    pub async fn send_transaction<T>(
        &self,
        contract: &Contract<AdminMiddleware>,
        method: &str,
        params: T,
    ) -> LedgerResult<TransactionRef>
    where
        T: Tokenize + Clone + Send,
    {
        let call = contract
            .method::<_, ()>(method, params.clone())
            .map_err(|e| LedgerError::Contract(e.to_string()))?;

        let mut next_nonce = self.next_nonce.lock().await;
        let estimate = call.estimate_gas().await.map_err(call_error)?;
        let nonce = self.reserve_nonce(&mut next_nonce).await?;
        let call = call.gas(self.gas_limit.unwrap_or(estimate)).nonce(nonce);
        let pending = match call.send().await {
            Ok(pending) => pending,
            Err(err) => {
                // Reload from the chain before the next write.
                *next_nonce = None;
                return Err(call_error(err));
            }
        };
        *next_nonce = Some(nonce + U256::one());
        drop(next_nonce);

        let tx = TransactionRef::from(pending.tx_hash());
        log::debug!("{} submitted as {}", method, tx);

        let receipt = match timeout(self.confirmation_timeout, pending.confirmations(self.confirmations)).await {
            Err(_) => return Err(LedgerError::ConfirmationTimeout(tx)),
            Ok(Err(e)) => return Err(LedgerError::Transport(e.to_string())),
            Ok(Ok(None)) => {
                return Err(LedgerError::Transport(format!("transaction {} was dropped", tx)))
            }
            Ok(Ok(Some(receipt))) => receipt,
        };

        if receipt.status == Some(U64::from(1u64)) {
            log::debug!("{} confirmed in block {:?}", tx, receipt.block_number);
            return Ok(tx);
        }

        let reason = match receipt.block_number {
            Some(block) => self.replay_revert(contract, method, params, block).await,
            None => None,
        };
        Err(LedgerError::Reverted { tx, reason })
    }

    /// Queries a contract (read-only operation).
    ///
    /// # Errors
    /// `Rejected` if the call reverts, `Transport` on RPC failure.
    pub async fn query_contract<T, R>(
        &self,
        contract: &Contract<AdminMiddleware>,
        method: &str,
        params: T,
    ) -> LedgerResult<R>
    where
        T: Tokenize,
        R: Detokenize,
    {
        contract
            .method::<_, R>(method, params)
            .map_err(|e| LedgerError::Contract(e.to_string()))?
            .call()
            .await
            .map_err(call_error)
    }

    /// Looks up the confirmation state of a transaction.
    pub async fn transaction_status(&self, tx: &TransactionRef) -> LedgerResult<TransactionStatus> {
        let receipt = self
            .client
            .get_transaction_receipt(tx.hash())
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        if let Some(receipt) = receipt {
            let block_number = receipt.block_number.map(|b| b.as_u64()).unwrap_or_default();
            return Ok(if receipt.status == Some(U64::from(1u64)) {
                TransactionStatus::Confirmed { block_number }
            } else {
                TransactionStatus::Failed { block_number }
            });
        }

        let known = self
            .client
            .get_transaction(tx.hash())
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        Ok(if known.is_some() {
            TransactionStatus::Pending
        } else {
            TransactionStatus::NotFound
        })
    }

    /// Nonce for the next broadcast. When none is cached it is loaded from
    /// the chain's pending count, so transactions still in the mempool are
    /// not reused.
    async fn reserve_nonce(&self, cached: &mut Option<U256>) -> LedgerResult<U256> {
        if let Some(nonce) = *cached {
            return Ok(nonce);
        }
        let nonce = self
            .client
            .get_transaction_count(self.admin_address(), Some(BlockId::Number(BlockNumber::Pending)))
            .await
            .map_err(|e| LedgerError::Transport(format!("failed to load admin nonce: {}", e)))?;
        log::debug!("Admin nonce loaded from chain: {}", nonce);
        *cached = Some(nonce);
        Ok(nonce)
    }

    async fn replay_revert<T: Tokenize>(
        &self,
        contract: &Contract<AdminMiddleware>,
        method: &str,
        params: T,
        block: U64,
    ) -> Option<String> {
        let call = contract
            .method::<_, ()>(method, params)
            .ok()?
            .block(BlockId::Number(BlockNumber::Number(block)));
        match call.call().await {
            Ok(()) => None,
            Err(err) => match call_error(err) {
                LedgerError::Rejected(reason) => Some(reason),
                _ => None,
            },
        }
    }
}

/// Splits contract call failures into reverts and transport problems.
fn call_error<M: Middleware>(err: ContractError<M>) -> LedgerError {
    if let Some(reason) = err.as_revert().and_then(|data| decode_revert_string(data)) {
        return LedgerError::Rejected(reason);
    }
    let message = err.to_string();
    if err.is_revert() || message.to_ascii_lowercase().contains("execution reverted") {
        return LedgerError::Rejected(message);
    }
    LedgerError::Transport(message)
}

/// Decodes `Error(string)` revert data into its message.
pub(crate) fn decode_revert_string(data: &[u8]) -> Option<String> {
    if data.len() < 4 || data[..4] != ERROR_STRING_SELECTOR {
        return None;
    }
    abi::decode(&[ParamType::String], &data[4..])
        .ok()?
        .into_iter()
        .next()?
        .into_string()
}

impl std::fmt::Debug for EvmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvmClient")
            .field("admin", &self.admin_address())
            .field("confirmations", &self.confirmations)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers_core::abi::Token;
    use serde_json::{json, Value};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    /// Minimal JSON-RPC node: fixed chain id, five transactions sent.
    struct StubNode;

    impl Respond for StubNode {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let call: Value = serde_json::from_slice(&request.body).unwrap();
            let result = match call["method"].as_str() {
                Some("eth_chainId") => "0x7a69",
                Some("eth_getTransactionCount") => "0x5",
                _ => "0x0",
            };
            ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": call["id"],
                "result": result
            }))
        }
    }

    #[test]
    fn test_decode_revert_string() {
        let mut data = ERROR_STRING_SELECTOR.to_vec();
        data.extend(abi::encode(&[Token::String("Student already registered".into())]));
        assert_eq!(
            decode_revert_string(&data).as_deref(),
            Some("Student already registered")
        );
    }

    #[test]
    fn test_decode_revert_string_rejects_other_data() {
        assert_eq!(decode_revert_string(&[]), None);
        assert_eq!(decode_revert_string(&[0x4e, 0x48, 0x7b, 0x71, 0x00]), None);
        assert_eq!(decode_revert_string(&ERROR_STRING_SELECTOR), None);
    }

    #[tokio::test]
    async fn test_connect_rejects_malformed_key() {
        let err = EvmClient::connect("http://127.0.0.1:1", "not-hex", EvmClientOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidConfig(_)));

        let err = EvmClient::connect("http://127.0.0.1:1", "0x1234", EvmClientOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_nonce_loads_from_pending_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(StubNode).mount(&server).await;

        let client = EvmClient::connect(&server.uri(), DEV_KEY, EvmClientOptions::default())
            .await
            .unwrap();
        let mut cached = None;
        assert_eq!(client.reserve_nonce(&mut cached).await.unwrap(), U256::from(5));
        assert_eq!(cached, Some(U256::from(5)));

        let requests = server.received_requests().await.unwrap();
        let lookups: Vec<Value> = requests
            .iter()
            .map(|r| serde_json::from_slice::<Value>(&r.body).unwrap())
            .filter(|call| call["method"] == "eth_getTransactionCount")
            .collect();
        assert_eq!(lookups.len(), 1);
        assert_eq!(
            lookups[0]["params"][0].as_str().unwrap().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
        assert_eq!(lookups[0]["params"][1], "pending");
    }

    #[tokio::test]
    async fn test_cached_nonce_skips_chain_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(StubNode).mount(&server).await;

        let client = EvmClient::connect(&server.uri(), DEV_KEY, EvmClientOptions::default())
            .await
            .unwrap();
        let mut cached = Some(U256::from(9));
        assert_eq!(client.reserve_nonce(&mut cached).await.unwrap(), U256::from(9));

        let requests = server.received_requests().await.unwrap();
        assert!(requests
            .iter()
            .all(|r| !String::from_utf8_lossy(&r.body).contains("eth_getTransactionCount")));
    }
}
