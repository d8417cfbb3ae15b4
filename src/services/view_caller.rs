use crate::{
    config::Config,
    constants::VIEW_TIMEOUT_SECS,
    error::{AppError, Result},
    models::CallDescriptor,
    services::{chain::ChainReader, classifier::extract_revert_reason},
};
use starknet_core::types::Felt;
use std::sync::Arc;
use tokio::time::{timeout, Duration};

/// Read-only contract calls with a bounded wait.
pub struct ViewCaller {
    reader: Arc<dyn ChainReader>,
    timeout: Duration,
}

impl ViewCaller {
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        Self::with_timeout(reader, Duration::from_secs(VIEW_TIMEOUT_SECS))
    }

    pub fn with_timeout(reader: Arc<dyn ChainReader>, timeout: Duration) -> Self {
        Self { reader, timeout }
    }

    pub fn from_config(reader: Arc<dyn ChainReader>, config: &Config) -> Self {
        Self::with_timeout(reader, config.view_timeout())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Calls a view entrypoint. The read is dropped if the timeout fires first.
    pub async fn call(&self, call: &CallDescriptor) -> Result<Vec<Felt>> {
        call.validate()?;
        if call.value > 0 {
            return Err(AppError::Validation(format!(
                "View call {} cannot transfer value",
                call.label()
            )));
        }

        let outcome = timeout(self.timeout, self.reader.call(call))
            .await
            .map_err(|_| {
                AppError::Timeout(format!(
                    "View call {} exceeded {}ms",
                    call.label(),
                    self.timeout.as_millis()
                ))
            })?;

        outcome.map_err(|err| match err {
            AppError::ContractRevert {
                reason: None,
                message,
            } => AppError::revert(extract_revert_reason(&message), message),
            other => other,
        })
    }
}
