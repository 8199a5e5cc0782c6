//! EVM ledger backend
//!
//! Talks raw JSON-RPC to an Ethereum-compatible node. Transactions are legacy
//! (EIP-155) transactions signed locally with a secp256k1 key; the contract
//! ABI is declared with `sol!` so calldata and event decoding stay in sync
//! with the deployed contract.

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{Address, Bytes, TxKind, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use alloy::sol;
use alloy::sol_types::{SolCall, SolEvent};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::digest::{decode_hex, Digest32};
use crate::error::AnchorError;
use crate::ledger::{ContractCall, LedgerClient, LogEntry};
use crate::mode::{AnchorEvent, AnchorFunction};

sol! {
    /// Anchoring contract. `record`/`Recorded` is the lite convention,
    /// `store`/`Stored` the full one.
    interface NotaryAnchor {
        function record(bytes32 hash, string reference) external;
        function store(bytes32 hash, string reference) external;
        /// Only deployed on full-mode contracts. Verification scans logs instead.
        function getTask(bytes32 hash)
            external
            view
            returns (string reference, address submitter, uint256 timestamp);

        event Recorded(
            bytes32 indexed hash,
            string reference,
            address indexed submitter,
            uint256 timestamp
        );
        event Stored(
            bytes32 indexed hash,
            string reference,
            address indexed submitter,
            uint256 timestamp
        );
    }
}

#[derive(Serialize)]
struct JsonRpcRequest<'a, T: Serialize> {
    jsonrpc: &'a str,
    method: &'a str,
    params: T,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    status: Option<String>,
    block_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    topics: Vec<String>,
    data: String,
    block_number: Option<String>,
    transaction_hash: Option<String>,
    #[serde(default)]
    removed: bool,
}

/// Configuration for the EVM ledger
#[derive(Clone)]
pub struct EvmConfig {
    /// JSON-RPC endpoint
    pub rpc_url: String,
    /// Deployed anchoring contract
    pub contract_address: String,
    /// Hex signing key; `None` opens the ledger read-only
    pub private_key: Option<String>,
    /// Chain id; queried with `eth_chainId` when unset
    pub chain_id: Option<u64>,
    /// Receipt polling interval while waiting for inclusion
    pub poll_interval: Duration,
}

/// EVM ledger backend
pub struct EvmLedger {
    rpc_url: String,
    contract: Address,
    signer: Option<PrivateKeySigner>,
    chain_id: OnceCell<u64>,
    poll_interval: Duration,
    next_id: AtomicU64,
    client: reqwest::Client,
}

impl EvmLedger {
    /// Create a new EVM ledger backend
    pub fn new(config: EvmConfig) -> Result<Self, AnchorError> {
        let contract = Address::from_str(config.contract_address.trim()).map_err(|e| {
            AnchorError::Configuration(format!(
                "invalid contract address '{}': {e}",
                config.contract_address
            ))
        })?;

        let signer = match config.private_key {
            Some(key) => Some(
                key.trim()
                    .trim_start_matches("0x")
                    .parse::<PrivateKeySigner>()
                    .map_err(|e| AnchorError::Configuration(format!("invalid signing key: {e}")))?,
            ),
            None => None,
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("notary-anchor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AnchorError::Configuration(format!("failed to build HTTP client: {e}")))?;

        if let Some(signer) = &signer {
            tracing::info!(
                account = %signer.address(),
                contract = %contract,
                "EVM ledger configured"
            );
        }

        Ok(Self {
            rpc_url: config.rpc_url,
            contract,
            signer,
            chain_id: OnceCell::new_with(config.chain_id),
            poll_interval: config.poll_interval,
            next_id: AtomicU64::new(1),
            client,
        })
    }

    async fn rpc_call_optional<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<T>, AnchorError> {
        let req = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let resp_bytes = self
            .client
            .post(&self.rpc_url)
            .json(&req)
            .send()
            .await
            .map_err(|e| AnchorError::Network(format!("{method}: {e}")))?
            .error_for_status()
            .map_err(|e| AnchorError::Network(format!("{method}: {e}")))?
            .bytes()
            .await
            .map_err(|e| AnchorError::Network(format!("{method}: {e}")))?;

        let resp: JsonRpcResponse<T> = serde_json::from_slice(&resp_bytes)
            .map_err(|e| AnchorError::Network(format!("{method}: malformed response: {e}")))?;

        if let Some(err) = resp.error {
            return Err(AnchorError::Network(format!(
                "{method}: RPC error {}: {}",
                err.code, err.message
            )));
        }

        Ok(resp.result)
    }

    async fn rpc_call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, AnchorError> {
        self.rpc_call_optional(method, params)
            .await?
            .ok_or_else(|| AnchorError::Network(format!("{method}: empty RPC response")))
    }

    async fn chain_id(&self) -> Result<u64, AnchorError> {
        self.chain_id
            .get_or_try_init(|| async {
                let hex: String = self.rpc_call("eth_chainId", serde_json::json!([])).await?;
                parse_quantity(&hex)
            })
            .await
            .copied()
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<(), AnchorError> {
        loop {
            let receipt: Option<RpcReceipt> = self
                .rpc_call_optional("eth_getTransactionReceipt", serde_json::json!([tx_hash]))
                .await?;

            match receipt {
                Some(receipt) if receipt.block_number.is_some() => {
                    return match receipt.status.as_deref() {
                        Some("0x0") => Err(AnchorError::Submission(format!(
                            "transaction {tx_hash} reverted"
                        ))),
                        _ => Ok(()),
                    };
                }
                _ => {
                    tracing::trace!(tx = tx_hash, "Waiting for inclusion");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}

/// ABI-encode the contract call for `call`
pub(crate) fn encode_call(call: &ContractCall) -> Vec<u8> {
    let hash = B256::from(call.hash.0);
    let reference = call.reference.clone();
    match call.function {
        AnchorFunction::Record => NotaryAnchor::recordCall { hash, reference }.abi_encode(),
        AnchorFunction::Store => NotaryAnchor::storeCall { hash, reference }.abi_encode(),
    }
}

/// Topic0 of the event
pub(crate) fn event_signature(event: AnchorEvent) -> B256 {
    match event {
        AnchorEvent::Recorded => NotaryAnchor::Recorded::SIGNATURE_HASH,
        AnchorEvent::Stored => NotaryAnchor::Stored::SIGNATURE_HASH,
    }
}

/// Parse a JSON-RPC hex quantity
pub(crate) fn parse_quantity(hex: &str) -> Result<u64, AnchorError> {
    u64::from_str_radix(hex.trim().trim_start_matches("0x"), 16)
        .map_err(|e| AnchorError::Network(format!("invalid quantity '{hex}': {e}")))
}

fn parse_quantity_u128(hex: &str) -> Result<u128, AnchorError> {
    u128::from_str_radix(hex.trim().trim_start_matches("0x"), 16)
        .map_err(|e| AnchorError::Network(format!("invalid quantity '{hex}': {e}")))
}

fn parse_word(s: &str) -> Result<B256, AnchorError> {
    let bytes = decode_hex(s)?;
    if bytes.len() != 32 {
        return Err(AnchorError::Network(format!("log topic is {} bytes", bytes.len())));
    }
    Ok(B256::from_slice(&bytes))
}

fn decode_log(event: AnchorEvent, log: &RpcLog) -> Result<LogEntry, AnchorError> {
    let topics = log
        .topics
        .iter()
        .map(|t| parse_word(t))
        .collect::<Result<Vec<_>, _>>()?;
    let data = if log.data.trim_start_matches("0x").is_empty() {
        Vec::new()
    } else {
        decode_hex(&log.data)?
    };

    let (hash, reference, submitter, timestamp) = match event {
        AnchorEvent::Recorded => {
            let ev = NotaryAnchor::Recorded::decode_raw_log(topics, &data)
                .map_err(|e| AnchorError::Network(format!("undecodable Recorded log: {e}")))?;
            (ev.hash, ev.reference, ev.submitter, ev.timestamp)
        }
        AnchorEvent::Stored => {
            let ev = NotaryAnchor::Stored::decode_raw_log(topics, &data)
                .map_err(|e| AnchorError::Network(format!("undecodable Stored log: {e}")))?;
            (ev.hash, ev.reference, ev.submitter, ev.timestamp)
        }
    };

    Ok(LogEntry {
        tx_id: log
            .transaction_hash
            .clone()
            .ok_or_else(|| AnchorError::Network("log without transaction hash".to_string()))?,
        block_number: log.block_number.as_deref().map(parse_quantity).transpose()?.unwrap_or(0),
        hash: Digest32(hash.0),
        reference,
        submitter: submitter.to_string(),
        block_timestamp: u64::try_from(timestamp).unwrap_or(u64::MAX),
    })
}

#[async_trait]
impl LedgerClient for EvmLedger {
    fn name(&self) -> &str {
        "evm"
    }

    fn can_sign(&self) -> bool {
        self.signer.is_some()
    }

    async fn broadcast(&self, call: &ContractCall) -> Result<String, AnchorError> {
        let signer = self.signer.as_ref().ok_or_else(|| {
            AnchorError::Configuration("no signing key configured".to_string())
        })?;
        let from = signer.address();
        let input = encode_call(call);
        let input_hex = format!("0x{}", hex::encode(&input));

        let chain_id = self.chain_id().await?;

        let nonce_hex: String = self
            .rpc_call(
                "eth_getTransactionCount",
                serde_json::json!([from.to_string(), "pending"]),
            )
            .await?;
        let nonce = parse_quantity(&nonce_hex)?;

        let gas_price_hex: String = self.rpc_call("eth_gasPrice", serde_json::json!([])).await?;
        let gas_price = parse_quantity_u128(&gas_price_hex)?;

        let estimate_hex: String = self
            .rpc_call(
                "eth_estimateGas",
                serde_json::json!([{
                    "from": from.to_string(),
                    "to": self.contract.to_string(),
                    "data": input_hex,
                }]),
            )
            .await?;
        let estimate = parse_quantity(&estimate_hex)?;

        let tx = TxLegacy {
            chain_id: Some(chain_id),
            nonce,
            gas_price,
            // 20% headroom over the node's estimate
            gas_limit: estimate.saturating_add(estimate / 5),
            to: TxKind::Call(self.contract),
            value: U256::ZERO,
            input: Bytes::from(input),
        };

        let sig_hash = tx.signature_hash();
        let sig = signer
            .sign_hash(&sig_hash)
            .await
            .map_err(|e| AnchorError::Submission(format!("signing failed: {e}")))?;
        let signed = TxEnvelope::Legacy(tx.into_signed(sig));

        let mut raw_tx = Vec::new();
        signed.encode_2718(&mut raw_tx);
        let raw_hex = format!("0x{}", hex::encode(&raw_tx));

        let tx_hash: String = self
            .rpc_call("eth_sendRawTransaction", serde_json::json!([raw_hex]))
            .await?;

        tracing::info!(
            tx = %tx_hash,
            hash = %call.hash,
            nonce,
            gas_price,
            "Transaction broadcast"
        );
        Ok(tx_hash)
    }

    async fn confirm(&self, tx_id: &str) -> Result<(), AnchorError> {
        self.wait_for_receipt(tx_id).await
    }

    async fn filter_logs(
        &self,
        event: AnchorEvent,
        hash: &Digest32,
    ) -> Result<Vec<LogEntry>, AnchorError> {
        let params = serde_json::json!([{
            "address": self.contract.to_string(),
            "fromBlock": "0x0",
            "toBlock": "latest",
            "topics": [
                format!("0x{}", hex::encode(event_signature(event))),
                hash.to_hex(),
            ],
        }]);

        let logs: Vec<RpcLog> = self.rpc_call("eth_getLogs", params).await?;
        logs.iter()
            .filter(|log| !log.removed)
            .map(|log| decode_log(event, log))
            .collect()
    }

    async fn is_healthy(&self) -> bool {
        self.rpc_call::<String>("eth_blockNumber", serde_json::json!([]))
            .await
            .is_ok()
    }
}
