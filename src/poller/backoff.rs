//! Delay before the next poll.

/// Seconds to wait after the n-th consecutive failure (1-based), capped at
/// one hour.
pub const BACKOFF_TABLE_SECS: [u64; 7] = [60, 120, 240, 480, 960, 1920, 3600];

/// Server-advertised interval assumed until a response says otherwise.
pub const DEFAULT_SERVER_INTERVAL_SECS: u64 = 60;

/// Compute the delay in seconds before the next list fetch.
///
/// `retry_count` is 0 after a success and counts consecutive failures
/// otherwise. The result never drops below `server_interval`.
pub fn next_delay(retry_count: u32, server_interval: u64, user_interval: u64) -> u64 {
    if retry_count == 0 {
        return user_interval.max(server_interval);
    }

    let index = (retry_count as usize - 1).min(BACKOFF_TABLE_SECS.len() - 1);
    BACKOFF_TABLE_SECS[index].max(server_interval)
}
