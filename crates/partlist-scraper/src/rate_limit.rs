// Copyright 2026 Cortex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Randomized pauses between network actions.

use rand::Rng;
use std::time::Duration;

/// A uniform `[min, max]` delay window.
///
/// Stateless: each call draws from the thread-local RNG, so any worker can
/// share a `Delay` by value or reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delay {
    min: Duration,
    max: Duration,
}

impl Delay {
    /// Build a delay window. Reversed bounds are swapped.
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn from_secs_f64(min: f64, max: f64) -> Self {
        let secs = |v: f64| Duration::try_from_secs_f64(v).unwrap_or(Duration::ZERO);
        Self::new(secs(min), secs(max))
    }

    /// A window that never sleeps.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Draw one duration from the window.
    pub fn sample(&self) -> Duration {
        let lo = self.min.as_millis() as u64;
        let hi = self.max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
    }

    /// Sleep for a freshly sampled duration.
    pub async fn pause(&self) {
        let wait = self.sample();
        if !wait.is_zero() {
            tracing::debug!(wait_ms = wait.as_millis() as u64, "rate limit pause");
            tokio::time::sleep(wait).await;
        }
    }
}
