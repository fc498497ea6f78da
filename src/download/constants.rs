//! Constants for the download module (timeouts, worker pool bounds).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large attachments).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Minimum allowed worker count.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed worker count.
pub const MAX_CONCURRENCY: usize = 100;

/// Default worker count if not specified.
pub const DEFAULT_CONCURRENCY: usize = 10;
