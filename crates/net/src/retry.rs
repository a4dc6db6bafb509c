//! Retry backoff for the file downloader (§4.B, §8 property 5).
//!
//! Unlike the teacher's jittered exponential backoff, the spec fixes the
//! wait exactly at `2^retryCount` seconds — no jitter, no cap beyond the
//! retry ceiling itself.

use std::time::Duration;

#[must_use]
pub fn backoff_delay(retry_count: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(retry_count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_exponentially() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(5), Duration::from_secs(32));
    }
}
