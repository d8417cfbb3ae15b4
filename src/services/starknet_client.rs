use crate::{
    config::Config,
    error::{AppError, Result},
    models::{CallDescriptor, ReceiptStatus},
    services::{
        chain::ChainReader,
        classifier::{classify_message, extract_revert_reason},
        onchain::parse_felt,
    },
};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use starknet_core::types::Felt;
use url::Url;

// Starknet JSON-RPC error codes
const RPC_CONTRACT_NOT_FOUND: i64 = 20;
const RPC_ENTRYPOINT_NOT_FOUND: i64 = 21;
const RPC_BLOCK_NOT_FOUND: i64 = 24;
const RPC_TXN_HASH_NOT_FOUND: i64 = 29;
const RPC_CONTRACT_ERROR: i64 = 40;
const RPC_TRANSACTION_EXECUTION_ERROR: i64 = 41;
const RPC_INVALID_TRANSACTION_NONCE: i64 = 52;
const RPC_INSUFFICIENT_RESOURCES: i64 = 53;
const RPC_INSUFFICIENT_ACCOUNT_BALANCE: i64 = 54;
const RPC_VALIDATION_FAILURE: i64 = 55;
const JSONRPC_PARSE_ERROR: i64 = -32700;
const JSONRPC_INVALID_REQUEST: i64 = -32600;
const JSONRPC_INVALID_PARAMS: i64 = -32602;

fn rpc_request(method: &str, params: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1
    })
}

fn call_contract_params(contract_address: Felt, entry_point_selector: Felt, calldata: &[Felt]) -> serde_json::Value {
    serde_json::json!({
        "contract_address": format!("{contract_address:#x}"),
        "entry_point_selector": format!("{entry_point_selector:#x}"),
        "calldata": calldata.iter().map(|felt| format!("{felt:#x}")).collect::<Vec<_>>()
    })
}

// Internal helper that pulls a revert reason out of JSON-RPC error data.
fn revert_reason_from_data(data: Option<&serde_json::Value>) -> Option<String> {
    let data = data?;
    let text = match data {
        serde_json::Value::String(text) => text.clone(),
        serde_json::Value::Object(map) => match map.get("revert_error") {
            Some(serde_json::Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None => data.to_string(),
        },
        other => other.to_string(),
    };
    extract_revert_reason(&text).or_else(|| {
        let trimmed = text.trim();
        (!trimmed.is_empty() && trimmed.len() <= 256).then(|| trimmed.to_string())
    })
}

// Internal helper that maps a JSON-RPC error object to a tagged error.
fn rpc_error_to_app(method: &str, error: RpcError) -> AppError {
    let message = format!("{} failed: {}", method, error.message);
    match error.code {
        RPC_CONTRACT_NOT_FOUND | RPC_ENTRYPOINT_NOT_FOUND => AppError::Validation(message),
        JSONRPC_PARSE_ERROR | JSONRPC_INVALID_REQUEST | JSONRPC_INVALID_PARAMS => {
            AppError::Validation(message)
        }
        RPC_BLOCK_NOT_FOUND => AppError::Network(message),
        RPC_CONTRACT_ERROR | RPC_TRANSACTION_EXECUTION_ERROR => {
            AppError::revert(revert_reason_from_data(error.data.as_ref()), message)
        }
        RPC_INVALID_TRANSACTION_NONCE => AppError::NonceConflict(message),
        RPC_INSUFFICIENT_RESOURCES => AppError::GasLimitExceeded(message),
        RPC_INSUFFICIENT_ACCOUNT_BALANCE => AppError::InsufficientBalance(message),
        RPC_VALIDATION_FAILURE => AppError::Validation(message),
        _ => {
            let data = error.data.map(|d| d.to_string()).unwrap_or_default();
            classify_message(&format!("{} {}", message, data))
        }
    }
}

// Internal helper that maps transport failures (reqwest) to a tagged error.
fn transport_error(method: &str, err: reqwest::Error) -> AppError {
    let message = format!("{} failed: {}", method, err);
    if err.is_timeout() {
        return AppError::Timeout(message);
    }
    match err.status().map(|status| status.as_u16()) {
        Some(401) | Some(403) => AppError::PermissionDenied(message),
        Some(400) => AppError::Validation(message),
        _ => AppError::Network(message),
    }
}

/// Starknet JSON-RPC client used for reads and receipt polling.
pub struct StarknetClient {
    rpc_url: String,
    client: reqwest::Client,
}

impl StarknetClient {
    pub fn new(rpc_url: String) -> Self {
        Self {
            rpc_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Url::parse(&config.starknet_rpc_url)
            .map_err(|e| AppError::Validation(format!("Invalid RPC URL: {}", e)))?;
        Ok(Self::new(config.starknet_rpc_url.clone()))
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<T>> {
        let request = rpc_request(method, params);

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| transport_error(method, e))?;

        let body: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| transport_error(method, e))?;

        if let Some(error) = body.error {
            if error.code == RPC_TXN_HASH_NOT_FOUND {
                return Ok(None);
            }
            return Err(rpc_error_to_app(method, error));
        }
        match body.result {
            Some(result) => Ok(Some(result)),
            None => Err(AppError::Network(format!(
                "{} returned neither result nor error",
                method
            ))),
        }
    }

    /// Get current block number
    pub async fn get_block_number(&self) -> Result<u64> {
        self.request("starknet_blockNumber", serde_json::json!([]))
            .await?
            .ok_or_else(|| AppError::Network("starknet_blockNumber returned nothing".to_string()))
    }

    /// Call contract view function at the latest block
    pub async fn call_contract(
        &self,
        contract_address: Felt,
        entry_point_selector: Felt,
        calldata: &[Felt],
    ) -> Result<Vec<Felt>> {
        let raw: Vec<String> = self
            .request(
                "starknet_call",
                serde_json::json!([
                    call_contract_params(contract_address, entry_point_selector, calldata),
                    "latest"
                ]),
            )
            .await?
            .unwrap_or_default();

        raw.iter().map(|value| parse_felt(value)).collect()
    }

    /// Get transaction receipt; `None` while the node does not know the hash yet.
    pub async fn get_transaction_receipt(&self, tx_hash: Felt) -> Result<Option<TransactionReceipt>> {
        self.request(
            "starknet_getTransactionReceipt",
            serde_json::json!([format!("{tx_hash:#x}")]),
        )
        .await
    }
}

#[async_trait]
impl ChainReader for StarknetClient {
    async fn call(&self, call: &CallDescriptor) -> Result<Vec<Felt>> {
        let function_call = call.to_function_call()?;
        self.call_contract(
            function_call.contract_address,
            function_call.entry_point_selector,
            &function_call.calldata,
        )
        .await
    }

    async fn transaction_status(&self, tx_hash: Felt) -> Result<ReceiptStatus> {
        match self.get_transaction_receipt(tx_hash).await? {
            Some(receipt) => receipt.status(),
            None => Ok(ReceiptStatus::Pending),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    #[serde(default)]
    pub execution_status: Option<String>,
    #[serde(default)]
    pub finality_status: Option<String>,
    #[serde(default)]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub revert_reason: Option<String>,
    #[serde(default)]
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub from_address: String,
    pub keys: Vec<String>,
    pub data: Vec<String>,
}

impl TransactionReceipt {
    pub fn status(&self) -> Result<ReceiptStatus> {
        if self.execution_status.as_deref() == Some("REVERTED") {
            let raw = self
                .revert_reason
                .clone()
                .unwrap_or_else(|| "reverted without reason".to_string());
            let reason = extract_revert_reason(&raw).unwrap_or(raw);
            return Ok(ReceiptStatus::Reverted { reason });
        }

        match self.finality_status.as_deref() {
            Some("ACCEPTED_ON_L2") | Some("ACCEPTED_ON_L1") => {}
            _ => return Ok(ReceiptStatus::Pending),
        }

        let mut returned_data = Vec::new();
        for event in &self.events {
            for value in &event.data {
                returned_data.extend_from_slice(&parse_felt(value)?.to_bytes_be());
            }
        }
        Ok(ReceiptStatus::Accepted {
            block_number: self.block_number,
            returned_data,
        })
    }
}
