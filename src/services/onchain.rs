use crate::{
    config::Config,
    error::{AppError, Result},
    models::CallDescriptor,
    services::{chain::SignerContext, classifier::classify_message_with_hint},
};
use async_trait::async_trait;
use starknet_accounts::{Account, ExecutionEncoding, SingleOwnerAccount};
use starknet_core::types::{BlockId, BlockTag, Call, Felt};
use starknet_core::utils::get_selector_from_name;
use starknet_providers::jsonrpc::{HttpTransport, JsonRpcClient};
use starknet_signers::{LocalWallet, SigningKey};
use url::Url;

/// Signs, dry-runs and submits invoke transactions for one backend account.
pub struct StarknetSigner {
    account: SingleOwnerAccount<JsonRpcClient<HttpTransport>, LocalWallet>,
    value_token: Felt,
}

// Internal helper that classifies an error rendered by the account/provider crates.
fn account_error<E>(stage: &str, err: E) -> AppError
where
    E: std::fmt::Display + std::fmt::Debug,
{
    classify_message_with_hint(&format!("{} failed: {}", stage, err), &format!("{:?}", err))
}

impl StarknetSigner {
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        let (Some(account_address), Some(private_key)) = (
            config.backend_account_address.as_deref(),
            config.backend_private_key.as_deref(),
        ) else {
            return Ok(None);
        };

        let rpc_url = Url::parse(&config.starknet_rpc_url)
            .map_err(|e| AppError::Validation(format!("Invalid RPC URL: {}", e)))?;
        let provider = JsonRpcClient::new(HttpTransport::new(rpc_url));

        let private_key = parse_felt(private_key)?;
        let signer = LocalWallet::from_signing_key(SigningKey::from_secret_scalar(private_key));

        let account_address = parse_felt(account_address)?;
        let chain_id = parse_chain_id(&config.starknet_chain_id)?;

        let mut account = SingleOwnerAccount::new(
            provider,
            signer,
            account_address,
            chain_id,
            ExecutionEncoding::New,
        );
        // Some public RPC providers don't support "pre_confirmed" yet.
        // Force latest block tag for nonce/fee simulation compatibility.
        account.set_block_id(BlockId::Tag(BlockTag::Latest));

        Ok(Some(Self {
            account,
            value_token: parse_felt(&config.value_token_address)?,
        }))
    }

    /// Call batch for a descriptor: an `approve` for the attached value, then the call itself.
    pub fn calls_for(&self, call: &CallDescriptor) -> Result<Vec<Call>> {
        build_calls(call, self.value_token)
    }
}

// Internal helper that builds the multicall for a descriptor.
fn build_calls(call: &CallDescriptor, value_token: Felt) -> Result<Vec<Call>> {
    let mut calls = Vec::with_capacity(2);
    if call.value > 0 {
        let (low, high) = u256_to_felts(call.value);
        calls.push(Call {
            to: value_token,
            selector: resolve_selector("approve")?,
            calldata: vec![call.target_address, low, high],
        });
    }
    calls.push(call.to_call()?);
    Ok(calls)
}

#[async_trait]
impl SignerContext for StarknetSigner {
    fn address(&self) -> Felt {
        self.account.address()
    }

    async fn simulate(&self, call: &CallDescriptor) -> Result<()> {
        let calls = self.calls_for(call)?;
        let estimate = self
            .account
            .execute_v3(calls)
            .estimate_fee()
            .await
            .map_err(|e| account_error("Simulation", e))?;
        tracing::debug!(
            "simulated {} fee_estimate={:?}",
            call.label(),
            estimate.overall_fee
        );
        Ok(())
    }

    async fn submit(&self, call: &CallDescriptor) -> Result<Felt> {
        let calls = self.calls_for(call)?;
        let result = self
            .account
            .execute_v3(calls)
            .send()
            .await
            .map_err(|e| account_error("Submission", e))?;
        Ok(result.transaction_hash)
    }
}

/// Resolves an entrypoint name or a raw `0x` selector.
pub fn resolve_selector(method: &str) -> Result<Felt> {
    let trimmed = method.trim();
    if trimmed.starts_with("0x") {
        return parse_felt(trimmed);
    }
    get_selector_from_name(trimmed)
        .map_err(|e| AppError::Validation(format!("Selector error for {}: {}", trimmed, e)))
}

pub fn parse_chain_id(chain_id: &str) -> Result<Felt> {
    if chain_id.starts_with("0x") {
        return parse_felt(chain_id);
    }
    let hex = hex::encode(chain_id.as_bytes());
    parse_felt(&format!("0x{hex}"))
}

pub fn parse_felt(value: &str) -> Result<Felt> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("Empty field element".to_string()));
    }
    if trimmed.starts_with("0x") {
        return Felt::from_hex(trimmed)
            .map_err(|e| AppError::Validation(format!("Invalid felt hex: {}", e)));
    }
    Felt::from_dec_str(trimmed).map_err(|e| AppError::Validation(format!("Invalid felt dec: {}", e)))
}

pub fn u256_to_felts(value: u128) -> (Felt, Felt) {
    (Felt::from(value), Felt::from(0_u128))
}
