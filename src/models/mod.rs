// src/models/mod.rs
pub mod call;
pub mod transaction;

pub use call::{cache_key, CallDescriptor};
pub use transaction::{ReceiptStatus, TransactionResult, TransactionStatus};
