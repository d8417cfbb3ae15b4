//! In-memory chain doubles shared by the service tests.

use crate::{
    error::{AppError, Result},
    models::{CallDescriptor, ReceiptStatus},
    services::chain::{ChainReader, SignerContext},
};
use async_trait::async_trait;
use parking_lot::Mutex;
use starknet_core::types::Felt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::{sleep, Duration};

#[derive(Default)]
pub struct MockChain {
    call_results: Mutex<VecDeque<Result<Vec<Felt>>>>,
    call_delay: Mutex<Option<Duration>>,
    statuses: Mutex<VecDeque<Result<ReceiptStatus>>>,
    pub calls: AtomicUsize,
    pub status_polls: AtomicUsize,
}

impl MockChain {
    pub fn push_call(&self, result: Result<Vec<Felt>>) {
        self.call_results.lock().push_back(result);
    }

    pub fn set_call_delay(&self, delay: Duration) {
        *self.call_delay.lock() = Some(delay);
    }

    /// Queued receipt answers; once drained every poll sees `Pending`.
    pub fn push_status(&self, status: Result<ReceiptStatus>) {
        self.statuses.lock().push_back(status);
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn call(&self, _call: &CallDescriptor) -> Result<Vec<Felt>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.call_delay.lock();
        if let Some(delay) = delay {
            sleep(delay).await;
        }
        let next = self.call_results.lock().pop_front();
        next.unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn transaction_status(&self, _tx_hash: Felt) -> Result<ReceiptStatus> {
        self.status_polls.fetch_add(1, Ordering::SeqCst);
        let next = self.statuses.lock().pop_front();
        next.unwrap_or(Ok(ReceiptStatus::Pending))
    }
}

pub struct MockSigner {
    simulate_error: Mutex<Option<AppError>>,
    simulate_delay: Mutex<Option<Duration>>,
    submit_result: Mutex<Result<Felt>>,
    submit_delay: Mutex<Option<Duration>>,
    pub simulations: AtomicUsize,
    pub submissions: AtomicUsize,
}

impl Default for MockSigner {
    fn default() -> Self {
        Self {
            simulate_error: Mutex::new(None),
            simulate_delay: Mutex::new(None),
            submit_result: Mutex::new(Ok(Felt::from(0xbeef_u64))),
            submit_delay: Mutex::new(None),
            simulations: AtomicUsize::new(0),
            submissions: AtomicUsize::new(0),
        }
    }
}

impl MockSigner {
    pub fn fail_simulation(&self, error: AppError) {
        *self.simulate_error.lock() = Some(error);
    }

    pub fn set_simulate_delay(&self, delay: Duration) {
        *self.simulate_delay.lock() = Some(delay);
    }

    pub fn set_submit_result(&self, result: Result<Felt>) {
        *self.submit_result.lock() = result;
    }

    pub fn set_submit_delay(&self, delay: Duration) {
        *self.submit_delay.lock() = Some(delay);
    }
}

#[async_trait]
impl SignerContext for MockSigner {
    fn address(&self) -> Felt {
        Felt::from(0xa11ce_u64)
    }

    async fn simulate(&self, _call: &CallDescriptor) -> Result<()> {
        self.simulations.fetch_add(1, Ordering::SeqCst);
        let delay = *self.simulate_delay.lock();
        if let Some(delay) = delay {
            sleep(delay).await;
        }
        match self.simulate_error.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn submit(&self, _call: &CallDescriptor) -> Result<Felt> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        let delay = *self.submit_delay.lock();
        if let Some(delay) = delay {
            sleep(delay).await;
        }
        let result = self.submit_result.lock().clone();
        result
    }
}
