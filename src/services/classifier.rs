//! Maps failures to [`ErrorCategory`].
//!
//! Errors raised inside this crate are already tagged `AppError` variants, so
//! [`classify`] is a plain mapping. Text coming back from third-party crates
//! (RPC providers, account errors) is converted once by [`classify_message`]
//! at the boundary where it enters the crate.

use crate::error::{AppError, ErrorCategory};

const USER_REJECTED_MARKERS: &[&str] = &[
    "user rejected",
    "user denied",
    "rejected by user",
    "user declined",
    "declined by user",
    "user abort",
    "user cancel",
    "request rejected",
];

const PERMISSION_MARKERS: &[&str] = &[
    "unauthorized",
    "forbidden",
    "permission denied",
    "not permitted",
    "access denied",
    "caller is not the owner",
    "not owner",
    "only owner",
    "status code: 401",
    "status code: 403",
];

const VALIDATION_MARKERS: &[&str] = &[
    "invalid argument",
    "invalid params",
    "invalid address",
    "invalid input",
    "invalid calldata",
    "malformed",
    "bad request",
    "validation failed",
    "cannot be empty",
    "invalid felt",
];

const INSUFFICIENT_BALANCE_MARKERS: &[&str] = &[
    "insufficient funds",
    "insufficient balance",
    "insufficient account balance",
    "balance is smaller than",
    "insufficientaccountbalance",
    "exceeds balance",
    "u256_sub overflow",
];

const NONCE_MARKERS: &[&str] = &[
    "invalid transaction nonce",
    "invalidtransactionnonce",
    "nonce too low",
    "nonce too high",
    "nonce conflict",
    "duplicate tx",
    "already known",
];

const GAS_MARKERS: &[&str] = &[
    "out of gas",
    "gas limit",
    "insufficient max fee",
    "insufficientmaxfee",
    "insufficient resources",
    "resources bounds",
    "exceeds block gas",
    "max fee",
];

const REVERT_MARKERS: &[&str] = &[
    "revert",
    "execution error",
    "transaction execution error",
    "contract error",
    "entrypoint not found",
    "entry_point_not_found",
    "failure reason",
    "panicked",
];

const TIMEOUT_MARKERS: &[&str] = &["timeout", "timed out", "deadline exceeded"];

const NETWORK_MARKERS: &[&str] = &[
    "network",
    "connection",
    "connect error",
    "dns",
    "too many requests",
    "429",
    "gateway",
    "temporarily unavailable",
    "service unavailable",
    "connection reset",
    "error decoding response body",
    "eof while parsing",
    "error sending request",
    "jsonrpcresponse",
];

// Internal helper that checks whether `text` contains any of `markers`.
fn contains_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|marker| text.contains(marker))
}

/// Category of an already-tagged error.
pub fn classify(error: &AppError) -> ErrorCategory {
    error.category()
}

/// Default retryability used by retry policies.
pub fn is_retryable(error: &AppError) -> bool {
    classify(error).is_retryable()
}

/// Converts opaque failure text into a tagged error.
///
/// Priority: user rejection, permission, validation, contract revert
/// (funds, nonce, gas, plain revert), timeout, network, unknown.
pub fn classify_message(raw: &str) -> AppError {
    classify_message_with_hint(raw, "")
}

/// Like [`classify_message`], but also matches against `hint` (typically the
/// `Debug` rendering of a third-party error) while keeping `raw` as the message.
pub fn classify_message_with_hint(raw: &str, hint: &str) -> AppError {
    let message = raw.trim().to_string();
    let lower = format!("{} {}", message, hint).to_ascii_lowercase();

    if contains_any(&lower, USER_REJECTED_MARKERS) {
        return AppError::UserRejected(message);
    }
    if contains_any(&lower, PERMISSION_MARKERS) {
        return AppError::PermissionDenied(message);
    }
    if contains_any(&lower, VALIDATION_MARKERS) {
        return AppError::Validation(message);
    }
    if contains_any(&lower, INSUFFICIENT_BALANCE_MARKERS) {
        return AppError::InsufficientBalance(message);
    }
    if contains_any(&lower, NONCE_MARKERS) {
        return AppError::NonceConflict(message);
    }
    if contains_any(&lower, GAS_MARKERS) {
        return AppError::GasLimitExceeded(message);
    }
    if contains_any(&lower, REVERT_MARKERS) {
        return AppError::revert(extract_revert_reason(&message), message);
    }
    if contains_any(&lower, TIMEOUT_MARKERS) {
        return AppError::Timeout(message);
    }
    if contains_any(&lower, NETWORK_MARKERS) {
        return AppError::Network(message);
    }
    AppError::Unknown(message)
}

// Internal helper that trims quotes and punctuation around an extracted reason.
fn clean_reason(raw: &str) -> Option<String> {
    let cleaned = raw
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '.' || c == ',' || c == ')')
        .trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

// Internal helper that decodes a Cairo short string (`0x4e6f...`).
fn decode_short_string(hex_text: &str) -> Option<String> {
    let digits = hex_text.trim().strip_prefix("0x")?;
    if digits.is_empty() || digits.len() > 62 {
        return None;
    }
    let padded = if digits.len() % 2 == 1 {
        format!("0{digits}")
    } else {
        digits.to_string()
    };
    let bytes = hex::decode(padded).ok()?;
    let bytes: Vec<u8> = bytes.into_iter().skip_while(|b| *b == 0).collect();
    if bytes.is_empty() || !bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        return None;
    }
    String::from_utf8(bytes).ok()
}

/// Best-effort extraction of a human-readable revert reason.
pub fn extract_revert_reason(raw: &str) -> Option<String> {
    // Starknet renders short-string panics as `0x...  ('reason')`.
    if let Some(start) = raw.find("('") {
        if let Some(len) = raw[start + 2..].find("')") {
            if let Some(reason) = clean_reason(&raw[start + 2..start + 2 + len]) {
                return Some(reason);
            }
        }
    }

    let lower = raw.to_ascii_lowercase();
    for marker in [
        "execution reverted:",
        "revert reason:",
        "reverted with reason:",
        "failure reason:",
        "reverted:",
    ] {
        if let Some(pos) = lower.find(marker) {
            let tail = raw[pos + marker.len()..].trim();
            let first = tail.split_whitespace().next().unwrap_or_default();
            if let Some(decoded) = decode_short_string(first) {
                return Some(decoded);
            }
            if let Some(reason) = clean_reason(tail) {
                return Some(reason);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_text(raw: &str) -> ErrorCategory {
        classify_message(raw).category()
    }

    #[test]
    fn user_rejection_wins_over_everything() {
        let err = classify_message("User rejected the request: execution reverted, timeout");
        assert!(matches!(err, AppError::UserRejected(_)));
        assert_eq!(classify(&err), ErrorCategory::UserRejected);
    }

    #[test]
    fn permission_beats_validation_and_revert() {
        assert_eq!(
            classify_text("403 Forbidden: invalid argument, execution reverted"),
            ErrorCategory::Permission
        );
    }

    #[test]
    fn validation_beats_revert() {
        assert_eq!(
            classify_text("Invalid params: execution reverted"),
            ErrorCategory::Validation
        );
    }

    #[test]
    fn account_validation_failure_outranks_funds_text() {
        assert!(matches!(
            classify_message("Account validation failed: insufficient funds for transfer"),
            AppError::Validation(_)
        ));
    }

    #[test]
    fn funds_nonce_and_gas_are_distinguished() {
        assert!(matches!(
            classify_message("insufficient funds for transfer"),
            AppError::InsufficientBalance(_)
        ));
        assert!(matches!(
            classify_message("StarknetError: InsufficientAccountBalance"),
            AppError::InsufficientBalance(_)
        ));
        assert!(matches!(
            classify_message("Invalid transaction nonce"),
            AppError::NonceConflict(_)
        ));
        assert!(matches!(
            classify_message("Transaction ran out of gas"),
            AppError::GasLimitExceeded(_)
        ));
        assert!(matches!(
            classify_message("Insufficient max fee"),
            AppError::GasLimitExceeded(_)
        ));
    }

    #[test]
    fn revert_carries_extracted_reason() {
        let err = classify_message("execution reverted: round already settled");
        assert_eq!(err.revert_reason(), Some("round already settled"));
        assert_eq!(err.category(), ErrorCategory::ContractRevert);
    }

    #[test]
    fn timeout_is_not_network() {
        assert_eq!(classify_text("request timed out after 10s"), ErrorCategory::Timeout);
        assert_eq!(
            classify_text("error sending request for url: connection refused"),
            ErrorCategory::Network
        );
        assert_eq!(classify_text("429 Too Many Requests"), ErrorCategory::Network);
    }

    #[test]
    fn unmatched_text_is_unknown() {
        assert_eq!(classify_text("something odd happened"), ErrorCategory::Unknown);
        assert!(is_retryable(&classify_message("something odd happened")));
        assert!(!is_retryable(&classify_message("user denied transaction signature")));
    }

    #[test]
    fn extracts_cairo_short_string_reason() {
        let text = "Transaction execution error: Failure reason: 0x526f756e6420636c6f736564 ('Round closed').";
        assert_eq!(extract_revert_reason(text).as_deref(), Some("Round closed"));
    }

    #[test]
    fn decodes_bare_hex_failure_reason() {
        let text = "Failure reason: 0x526f756e6420636c6f736564";
        assert_eq!(extract_revert_reason(text).as_deref(), Some("Round closed"));
    }

    #[test]
    fn hint_drives_classification_but_message_is_kept() {
        let err = classify_message_with_hint(
            "Provider error",
            "Provider(StarknetError(InvalidTransactionNonce))",
        );
        assert_eq!(err, AppError::NonceConflict("Provider error".to_string()));
    }

    #[test]
    fn no_reason_when_text_has_no_marker() {
        assert_eq!(extract_revert_reason("connection reset by peer"), None);
    }
}
