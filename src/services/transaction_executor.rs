use crate::{
    config::Config,
    constants::{
        CONFIRMATION_POLL_INTERVAL_MS, CONFIRMATION_TIMEOUT_SECS, SIMULATION_TIMEOUT_SECS,
        SUBMIT_TIMEOUT_SECS,
    },
    error::{AppError, ErrorCategory, Result},
    models::{CallDescriptor, ReceiptStatus, TransactionResult},
    services::chain::{ChainReader, SignerContext},
};
use starknet_core::types::Felt;
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};

/// Bounded waits for the write pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    pub simulation_timeout: Duration,
    pub submit_timeout: Duration,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            simulation_timeout: Duration::from_secs(SIMULATION_TIMEOUT_SECS),
            submit_timeout: Duration::from_secs(SUBMIT_TIMEOUT_SECS),
            confirmation_timeout: Duration::from_secs(CONFIRMATION_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(CONFIRMATION_POLL_INTERVAL_MS),
        }
    }
}

impl ExecutorConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            simulation_timeout: Duration::from_secs(config.simulation_timeout_secs),
            submit_timeout: Duration::from_secs(config.submit_timeout_secs),
            confirmation_timeout: Duration::from_secs(config.confirmation_timeout_secs),
            poll_interval: Duration::from_millis(config.confirmation_poll_interval_ms),
        }
    }
}

// Internal helper that tells transport hiccups apart from definite failures.
fn keeps_polling(err: &AppError) -> bool {
    matches!(
        err.category(),
        ErrorCategory::Network | ErrorCategory::Timeout | ErrorCategory::Unknown
    )
}

struct Confirmed {
    block_number: Option<u64>,
    returned_data: Vec<u8>,
}

/// Simulate, submit and confirm one state-changing call.
///
/// Nothing here retries: a failed or ambiguous submission is reported to the
/// caller, who decides whether to issue a new call.
pub struct TransactionExecutor {
    reader: Arc<dyn ChainReader>,
    config: ExecutorConfig,
}

impl TransactionExecutor {
    pub fn new(reader: Arc<dyn ChainReader>, config: ExecutorConfig) -> Self {
        Self { reader, config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub async fn execute(&self, call: &CallDescriptor, signer: &dyn SignerContext) -> TransactionResult {
        let label = call.label();
        let signer_address = format!("{:#x}", signer.address());

        if let Err(err) = call.validate() {
            tracing::warn!("tx {} rejected before simulation: {}", label, err);
            return TransactionResult::failed(None, &err);
        }

        // Simulate: nothing is broadcast if this fails.
        let simulated = timeout(self.config.simulation_timeout, signer.simulate(call))
            .await
            .unwrap_or_else(|_| {
                Err(AppError::Timeout(format!(
                    "Simulation of {} exceeded {}ms",
                    label,
                    self.config.simulation_timeout.as_millis()
                )))
            });
        if let Err(err) = simulated {
            tracing::warn!(
                "tx {} from {} failed simulation ({}): {}",
                label,
                signer_address,
                err.code(),
                err
            );
            return TransactionResult::failed(None, &err);
        }

        // Submit exactly once.
        let tx_hash = match timeout(self.config.submit_timeout, signer.submit(call)).await {
            Ok(Ok(tx_hash)) => tx_hash,
            Ok(Err(err)) => {
                tracing::warn!("tx {} submission failed ({}): {}", label, err.code(), err);
                return TransactionResult::failed(None, &err);
            }
            Err(_) => {
                let err = AppError::Timeout(format!(
                    "Submission of {} exceeded {}ms; it may still be broadcast",
                    label,
                    self.config.submit_timeout.as_millis()
                ));
                tracing::warn!("{}", err);
                return TransactionResult::timed_out(None, &err);
            }
        };
        let tx_id = format!("{tx_hash:#x}");
        tracing::info!("tx {} submitted by {} tx_hash={}", label, signer_address, tx_id);

        // Confirm: the poll future is dropped when the timeout wins.
        match timeout(self.config.confirmation_timeout, self.wait_for_receipt(tx_hash)).await {
            Ok(Ok(confirmed)) => {
                tracing::info!(
                    "tx {} confirmed tx_hash={} block={:?}",
                    label,
                    tx_id,
                    confirmed.block_number
                );
                TransactionResult::success(tx_id, confirmed.block_number, confirmed.returned_data)
            }
            Ok(Err(err)) => {
                tracing::warn!("tx {} failed tx_hash={} ({}): {}", label, tx_id, err.code(), err);
                TransactionResult::failed(Some(tx_id), &err)
            }
            Err(_) => {
                let err = AppError::Timeout(format!(
                    "Transaction {} not confirmed within {}s; it may still land",
                    tx_id,
                    self.config.confirmation_timeout.as_secs()
                ));
                tracing::warn!("{}", err);
                TransactionResult::timed_out(Some(tx_id), &err)
            }
        }
    }

    async fn wait_for_receipt(&self, tx_hash: Felt) -> Result<Confirmed> {
        let mut polls: u64 = 0;
        loop {
            polls += 1;
            match self.reader.transaction_status(tx_hash).await {
                Ok(ReceiptStatus::Pending) => {}
                Ok(ReceiptStatus::Accepted {
                    block_number,
                    returned_data,
                }) => {
                    return Ok(Confirmed {
                        block_number,
                        returned_data,
                    });
                }
                Ok(ReceiptStatus::Reverted { reason }) => {
                    return Err(AppError::revert(
                        Some(reason.clone()),
                        format!("Transaction {:#x} reverted: {}", tx_hash, reason),
                    ));
                }
                Err(err) if keeps_polling(&err) => {
                    tracing::debug!(
                        "receipt poll {} for {:#x} failed, still waiting: {}",
                        polls,
                        tx_hash,
                        err
                    );
                }
                Err(err) => return Err(err),
            }
            sleep(self.config.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionStatus;
    use crate::services::test_support::{MockChain, MockSigner};
    use std::sync::atomic::Ordering;
    use tokio::time::Instant;

    fn descriptor() -> CallDescriptor {
        CallDescriptor::new(Felt::from(0x99_u64), "place_bet", vec![Felt::ONE]).with_value(10)
    }

    fn executor(chain: Arc<MockChain>) -> TransactionExecutor {
        TransactionExecutor::new(chain, ExecutorConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn happy_path_confirms_after_pending_polls() {
        let chain = Arc::new(MockChain::default());
        chain.push_status(Ok(ReceiptStatus::Pending));
        chain.push_status(Ok(ReceiptStatus::Pending));
        chain.push_status(Ok(ReceiptStatus::Accepted {
            block_number: Some(12),
            returned_data: vec![1, 2],
        }));
        let signer = MockSigner::default();

        let result = executor(chain.clone()).execute(&descriptor(), &signer).await;

        assert!(result.succeeded());
        assert_eq!(result.status(), TransactionStatus::Success);
        assert_eq!(result.tx_id(), Some("0xbeef"));
        assert_eq!(result.block_number(), Some(12));
        assert_eq!(result.returned_data(), Some(&[1_u8, 2][..]));
        assert_eq!(chain.status_polls.load(Ordering::SeqCst), 3);
        assert_eq!(signer.submissions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_simulation_never_submits() {
        let chain = Arc::new(MockChain::default());
        let signer = MockSigner::default();
        signer.fail_simulation(AppError::InsufficientBalance(
            "insufficient funds for transfer".to_string(),
        ));

        let result = executor(chain.clone()).execute(&descriptor(), &signer).await;

        assert!(!result.succeeded());
        assert_eq!(result.status(), TransactionStatus::Failed);
        assert_eq!(result.error_category(), Some(ErrorCategory::ContractRevert));
        assert_eq!(result.error_code(), Some("INSUFFICIENT_BALANCE"));
        assert_eq!(result.tx_id(), None);
        assert_eq!(signer.submissions.load(Ordering::SeqCst), 0);
        assert_eq!(chain.status_polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn user_rejection_is_reported_without_retry() {
        let chain = Arc::new(MockChain::default());
        let signer = MockSigner::default();
        signer.set_submit_result(Err(AppError::UserRejected("declined".to_string())));

        let result = executor(chain).execute(&descriptor(), &signer).await;

        assert_eq!(result.status(), TransactionStatus::Failed);
        assert_eq!(result.error_category(), Some(ErrorCategory::UserRejected));
        assert_eq!(signer.submissions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn network_failure_on_submit_is_not_resubmitted() {
        let chain = Arc::new(MockChain::default());
        let signer = MockSigner::default();
        signer.set_submit_result(Err(AppError::Network("connection reset".to_string())));

        let result = executor(chain).execute(&descriptor(), &signer).await;

        assert_eq!(result.error_category(), Some(ErrorCategory::Network));
        assert_eq!(signer.submissions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn confirmation_that_never_lands_times_out() {
        let chain = Arc::new(MockChain::default());
        let signer = MockSigner::default();
        let start = Instant::now();

        let result = executor(chain.clone()).execute(&descriptor(), &signer).await;

        assert_eq!(result.status(), TransactionStatus::TimedOut);
        assert!(!result.succeeded());
        assert_eq!(result.tx_id(), Some("0xbeef"));
        assert_eq!(result.error_category(), Some(ErrorCategory::Timeout));
        assert_eq!(start.elapsed(), Duration::from_secs(CONFIRMATION_TIMEOUT_SECS));

        // the poll loop was cancelled with the timeout
        let polls = chain.status_polls.load(Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(chain.status_polls.load(Ordering::SeqCst), polls);
    }

    #[tokio::test(start_paused = true)]
    async fn reverted_receipt_fails_with_reason_and_tx_id() {
        let chain = Arc::new(MockChain::default());
        chain.push_status(Ok(ReceiptStatus::Reverted {
            reason: "Round closed".to_string(),
        }));
        let signer = MockSigner::default();

        let result = executor(chain).execute(&descriptor(), &signer).await;

        assert_eq!(result.status(), TransactionStatus::Failed);
        assert_eq!(result.tx_id(), Some("0xbeef"));
        assert_eq!(result.error_code(), Some("CONTRACT_REVERT"));
        assert_eq!(result.error_message(), Some("Execution reverted: Round closed"));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_poll_errors_keep_polling() {
        let chain = Arc::new(MockChain::default());
        chain.push_status(Err(AppError::Network("429 Too Many Requests".to_string())));
        chain.push_status(Ok(ReceiptStatus::Accepted {
            block_number: None,
            returned_data: Vec::new(),
        }));
        let signer = MockSigner::default();

        let result = executor(chain).execute(&descriptor(), &signer).await;

        assert!(result.succeeded());
        assert_eq!(result.returned_data(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_poll_error_fails_the_call() {
        let chain = Arc::new(MockChain::default());
        chain.push_status(Err(AppError::PermissionDenied("status code: 403".to_string())));
        let signer = MockSigner::default();

        let result = executor(chain).execute(&descriptor(), &signer).await;

        assert_eq!(result.status(), TransactionStatus::Failed);
        assert_eq!(result.error_category(), Some(ErrorCategory::Permission));
    }

    #[tokio::test(start_paused = true)]
    async fn revert_family_poll_error_fails_without_waiting_for_deadline() {
        let chain = Arc::new(MockChain::default());
        chain.push_status(Err(AppError::NonceConflict("Invalid transaction nonce".to_string())));
        let signer = MockSigner::default();
        let start = Instant::now();

        let result = executor(chain.clone()).execute(&descriptor(), &signer).await;

        assert_eq!(result.status(), TransactionStatus::Failed);
        assert_eq!(result.error_code(), Some("NONCE_CONFLICT"));
        assert_eq!(result.tx_id(), Some("0xbeef"));
        assert_eq!(chain.status_polls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_simulation_fails_as_timeout_without_submitting() {
        let chain = Arc::new(MockChain::default());
        let signer = MockSigner::default();
        signer.set_simulate_delay(Duration::from_secs(SIMULATION_TIMEOUT_SECS * 2));
        let start = Instant::now();

        let result = executor(chain.clone()).execute(&descriptor(), &signer).await;

        assert_eq!(result.status(), TransactionStatus::Failed);
        assert_eq!(result.error_category(), Some(ErrorCategory::Timeout));
        assert_eq!(result.tx_id(), None);
        assert_eq!(signer.submissions.load(Ordering::SeqCst), 0);
        assert_eq!(chain.status_polls.load(Ordering::SeqCst), 0);
        assert_eq!(start.elapsed(), Duration::from_secs(SIMULATION_TIMEOUT_SECS));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_submit_is_timed_out_without_tx_id() {
        let chain = Arc::new(MockChain::default());
        let signer = MockSigner::default();
        signer.set_submit_delay(Duration::from_secs(SUBMIT_TIMEOUT_SECS * 2));

        let result = executor(chain).execute(&descriptor(), &signer).await;

        assert_eq!(result.status(), TransactionStatus::TimedOut);
        assert_eq!(result.tx_id(), None);
    }

    #[tokio::test]
    async fn invalid_descriptor_fails_before_simulation() {
        let chain = Arc::new(MockChain::default());
        let signer = MockSigner::default();
        let call = CallDescriptor::new(Felt::from(1_u64), "", vec![]);

        let result = executor(chain).execute(&call, &signer).await;

        assert_eq!(result.error_category(), Some(ErrorCategory::Validation));
        assert_eq!(signer.simulations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn executor_config_reads_timeouts_from_config() {
        let config = Config::from_lookup(|name| match name {
            "STARKNET_RPC_URL" => Some("https://rpc.example".to_string()),
            "CONFIRMATION_TIMEOUT_SECS" => Some("90".to_string()),
            _ => None,
        })
        .expect("config");
        let executor_config = ExecutorConfig::from_config(&config);
        assert_eq!(executor_config.confirmation_timeout, Duration::from_secs(90));
        assert_eq!(
            executor_config.poll_interval,
            Duration::from_millis(CONFIRMATION_POLL_INTERVAL_MS)
        );
    }
}
