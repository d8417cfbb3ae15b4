use crate::{
    error::Result,
    models::{CallDescriptor, ReceiptStatus},
};
use async_trait::async_trait;
use starknet_core::types::Felt;

/// Read side of the chain: view calls and receipt lookups.
///
/// Implementations return tagged `AppError`s; text from the transport is
/// classified where it enters the crate.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn call(&self, call: &CallDescriptor) -> Result<Vec<Felt>>;

    async fn transaction_status(&self, tx_hash: Felt) -> Result<ReceiptStatus>;
}

/// The identity that signs and pays for state-changing calls.
#[async_trait]
pub trait SignerContext: Send + Sync {
    fn address(&self) -> Felt;

    /// Dry-runs `call` against current state under this signer, committing nothing.
    async fn simulate(&self, call: &CallDescriptor) -> Result<()>;

    /// Signs and broadcasts `call`, returning the transaction hash.
    async fn submit(&self, call: &CallDescriptor) -> Result<Felt>;
}
