//! Application-wide constants.

/// API version prefix shared by every route.
pub const API_PREFIX: &str = "/api/v0";

/// Header carrying the anthropic API version for Messages requests.
pub const ANTHROPIC_API_VERSION: &str = "2023-06-01";

/// Upper bound for a single scheduler invocation's batch size.
pub const MAX_BATCH_LIMIT: i64 = 500;

/// Maximum characters of an upstream error kept in `error_detail`.
pub const MAX_ERROR_DETAIL_CHARS: usize = 2000;
