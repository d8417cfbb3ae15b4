use crate::error::{AppError, Result};
use crate::services::onchain::{parse_felt, resolve_selector};
use starknet_core::types::{Call, Felt, FunctionCall};

/// A logical contract call: the unit consumed by the view caller and the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallDescriptor {
    pub target_address: Felt,
    /// Entrypoint name (`place_bet`) or a raw `0x` selector.
    pub method: String,
    pub args: Vec<Felt>,
    /// Amount of the value token the call may pull from the signer.
    pub value: u128,
}

impl CallDescriptor {
    pub fn new(target_address: Felt, method: impl Into<String>, args: Vec<Felt>) -> Self {
        Self {
            target_address,
            method: method.into(),
            args,
            value: 0,
        }
    }

    pub fn with_value(mut self, value: u128) -> Self {
        self.value = value;
        self
    }

    pub fn parse(target_address: &str, method: &str, args: &[&str]) -> Result<Self> {
        let target_address = parse_felt(target_address)?;
        let args = args
            .iter()
            .map(|arg| parse_felt(arg))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(target_address, method, args))
    }

    pub fn validate(&self) -> Result<()> {
        if self.method.trim().is_empty() {
            return Err(AppError::Validation("Call method cannot be empty".to_string()));
        }
        if self.target_address == Felt::ZERO {
            return Err(AppError::Validation(
                "Call target address cannot be zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_function_call(&self) -> Result<FunctionCall> {
        Ok(FunctionCall {
            contract_address: self.target_address,
            entry_point_selector: resolve_selector(&self.method)?,
            calldata: self.args.clone(),
        })
    }

    pub fn to_call(&self) -> Result<Call> {
        Ok(Call {
            to: self.target_address,
            selector: resolve_selector(&self.method)?,
            calldata: self.args.clone(),
        })
    }

    /// Short label for logs: `0x1234…::method`.
    pub fn label(&self) -> String {
        format!("{:#x}::{}", self.target_address, self.method)
    }
}

// Internal helper that normalizes one part of a cache key.
fn normalize_cache_part(value: &str) -> String {
    let trimmed = value.trim().to_ascii_lowercase();
    if trimmed.is_empty() {
        "-".to_string()
    } else {
        trimmed
    }
}

/// Builds a per-resource cache key such as `userBets-0xabc`.
pub fn cache_key(prefix: &str, parts: &[&str]) -> String {
    let mut key = prefix.to_string();
    for part in parts {
        key.push('-');
        key.push_str(&normalize_cache_part(part));
    }
    key
}
