//! Centralized default constants for affinity.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own.

// =============================================================================
// TAG STORE
// =============================================================================

/// Default base URL of the user-results service.
pub const API_URL: &str = "http://127.0.0.1:8000/api/user_results";

/// Timeout for tag store requests in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// User agent sent with every store request.
pub const USER_AGENT: &str = concat!("affinity/", env!("CARGO_PKG_VERSION"));

// =============================================================================
// DISPATCH
// =============================================================================

/// How long a cached tag set is trusted before the store is asked again.
pub const CACHE_TTL_SECS: u64 = 300;

/// Default event bus broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 64;

/// Whether an unmatch drops the target from the celebrated set.
///
/// Off by default: a celebrated match is never celebrated again.
pub const FORGET_ON_UNMATCH: bool = false;

// =============================================================================
// LEDGER
// =============================================================================

/// Default directory for file-backed celebrated-match sets.
pub const LEDGER_DIR: &str = ".affinity";

// =============================================================================
// ENVIRONMENT VARIABLES
// =============================================================================

pub const ENV_API_URL: &str = "AFFINITY_API_URL";
pub const ENV_API_TOKEN: &str = "AFFINITY_API_TOKEN";
pub const ENV_TIMEOUT_SECS: &str = "AFFINITY_TIMEOUT_SECS";
pub const ENV_CACHE_TTL_SECS: &str = "AFFINITY_CACHE_TTL_SECS";
pub const ENV_LEDGER_DIR: &str = "AFFINITY_LEDGER_DIR";
pub const ENV_FORGET_ON_UNMATCH: &str = "AFFINITY_FORGET_ON_UNMATCH";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_has_no_trailing_slash() {
        assert!(!API_URL.ends_with('/'));
    }

    #[test]
    fn test_user_agent_carries_version() {
        assert!(USER_AGENT.starts_with("affinity/"));
        assert!(USER_AGENT.len() > "affinity/".len());
    }
}
