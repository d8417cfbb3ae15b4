//! Resilient remote-call layer for Starknet contracts: error classification,
//! bounded retries, a TTL cache with stale-while-revalidate reads, view calls
//! and simulate-then-submit transactions.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod services;
