// Remote-call layer services
pub mod cache_store;
pub mod chain;
pub mod classifier;
pub mod fetch_coordinator;
pub mod onchain;
pub mod retry;
pub mod starknet_client;
pub mod transaction_executor;
pub mod view_caller;

#[cfg(test)]
pub mod test_support;

// Re-export for convenience
pub use cache_store::{CacheEntry, CacheStore};
pub use chain::{ChainReader, SignerContext};
pub use classifier::{classify, classify_message, extract_revert_reason, is_retryable};
pub use fetch_coordinator::{FetchCoordinator, FetchOptions};
pub use onchain::StarknetSigner;
pub use retry::{run_with_retry, RetryPolicy};
pub use starknet_client::StarknetClient;
pub use transaction_executor::{ExecutorConfig, TransactionExecutor};
pub use view_caller::ViewCaller;
