/// Application constants

// Bounded waits
pub const VIEW_TIMEOUT_SECS: u64 = 10;
pub const SIMULATION_TIMEOUT_SECS: u64 = 10;
pub const SUBMIT_TIMEOUT_SECS: u64 = 30;
pub const CONFIRMATION_TIMEOUT_SECS: u64 = 60;
pub const CONFIRMATION_POLL_INTERVAL_MS: u64 = 1_500;

// Read retries (retries after the initial attempt)
pub const RETRY_MAX_RETRIES: u32 = 3;
pub const RETRY_BASE_DELAY_MS: u64 = 1_000;
pub const RETRY_MAX_DELAY_MS: u64 = 30_000;

// Cache
pub const DEFAULT_CACHE_CAPACITY: usize = 1_024;
pub const CACHE_DEFAULT_TTL_SECS: u64 = 30;
// ~100 years
pub const CACHE_MAX_TTL_SECS: u64 = 100 * 365 * 86_400;
pub const CACHE_MAX_TOMBSTONES: usize = 4_096;

// STRK token on Starknet mainnet and sepolia
pub const TOKEN_STRK: &str = "0x04718f5a0fc34cc1af16a1cdee98ffb20c31f5cd61d6ab07201858f4287c938d";

pub const DEFAULT_CHAIN_ID: &str = "SN_MAIN";
