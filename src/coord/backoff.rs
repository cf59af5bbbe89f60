//! Exponential reconnect backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Delay before reconnect attempt `attempt` (1-based).
///
/// Attempt 0 returns zero so the first connection is immediate. Jitter of up
/// to 10% is added to avoid synchronized reconnect storms across instances.
pub fn reconnect_delay(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponent = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponent).min(max_ms);

    let jitter_range = delay_ms / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(delay_ms + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_exponentially() {
        let d1 = reconnect_delay(1, 100, 10_000);
        assert!(d1.as_millis() >= 100);

        let d3 = reconnect_delay(3, 100, 10_000);
        assert!(d3.as_millis() >= 400);
    }

    #[test]
    fn respects_cap() {
        let capped = reconnect_delay(20, 100, 2_000);
        assert!(capped.as_millis() >= 2_000);
        assert!(capped.as_millis() <= 2_200);
    }

    #[test]
    fn first_attempt_is_immediate() {
        assert_eq!(reconnect_delay(0, 100, 2_000), Duration::ZERO);
    }
}
