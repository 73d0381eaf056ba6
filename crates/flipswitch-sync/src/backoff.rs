// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reconnect delay policy for the streaming connection.

use std::time::Duration;

/// Default delay before the first reconnect attempt.
pub const DEFAULT_MIN_RETRY_DELAY: Duration = Duration::from_secs(1);
/// Default upper bound on the reconnect delay.
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Doubling reconnect delay with a ceiling.
///
/// The delay in effect is waited out *before* it grows, so repeated failures
/// produce `1, 2, 4, 8, 16, 30, 30, ...` seconds with the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
	min: Duration,
	max: Duration,
	current: Duration,
}

impl Backoff {
	pub fn new(min: Duration, max: Duration) -> Self {
		let max = max.max(min);
		Self {
			min,
			max,
			current: min,
		}
	}

	/// Delay to wait before the next attempt.
	pub fn current(&self) -> Duration {
		self.current
	}

	/// Doubles the delay for the next failure, capped at the maximum.
	pub fn advance(&mut self) {
		if self.current < self.max {
			self.current = self.current.saturating_mul(2).min(self.max);
		}
	}

	/// Back to the minimum, after a successful connection.
	pub fn reset(&mut self) {
		self.current = self.min;
	}

	pub fn min(&self) -> Duration {
		self.min
	}

	pub fn max(&self) -> Duration {
		self.max
	}
}

impl Default for Backoff {
	fn default() -> Self {
		Self::new(DEFAULT_MIN_RETRY_DELAY, DEFAULT_MAX_RETRY_DELAY)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn waits(backoff: &mut Backoff, n: usize) -> Vec<u64> {
		(0..n)
			.map(|_| {
				let wait = backoff.current().as_secs();
				backoff.advance();
				wait
			})
			.collect()
	}

	#[test]
	fn test_default_sequence_doubles_and_caps() {
		let mut backoff = Backoff::default();
		assert_eq!(waits(&mut backoff, 8), vec![1, 2, 4, 8, 16, 30, 30, 30]);
	}

	#[test]
	fn test_reset_returns_to_minimum() {
		let mut backoff = Backoff::default();
		waits(&mut backoff, 4);
		assert_eq!(backoff.current(), Duration::from_secs(16));

		backoff.reset();
		assert_eq!(waits(&mut backoff, 3), vec![1, 2, 4]);
	}

	#[test]
	fn test_max_below_min_is_clamped() {
		let backoff = Backoff::new(Duration::from_secs(5), Duration::from_secs(1));
		assert_eq!(backoff.max(), Duration::from_secs(5));
		assert_eq!(backoff.current(), backoff.min());
	}

	proptest! {
		#[test]
		fn test_delay_stays_within_bounds(
			min_ms in 1u64..5_000,
			factor in 1u64..64,
			steps in 0usize..100,
		) {
			let min = Duration::from_millis(min_ms);
			let max = Duration::from_millis(min_ms * factor);
			let mut backoff = Backoff::new(min, max);
			let mut previous = backoff.current();
			for _ in 0..steps {
				backoff.advance();
				let current = backoff.current();
				prop_assert!(current >= previous);
				prop_assert!(current >= min && current <= max);
				previous = current;
			}
		}
	}
}
