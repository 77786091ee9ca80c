use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_retries: 8,
        }
    }
}

#[derive(Debug)]
pub struct ExponentialBackoff {
    policy: BackoffPolicy,
    current_attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            current_attempt: 0,
        }
    }

    /// Consumes one attempt and returns its delay (doubling, capped at
    /// `max_delay`), or `None` once the retry budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.current_attempt >= self.policy.max_retries {
            return None;
        }

        let factor = 2_u32.saturating_pow(self.current_attempt);
        let delay = std::cmp::min(
            self.policy.initial_delay.saturating_mul(factor),
            self.policy.max_delay,
        );
        self.current_attempt += 1;

        log::warn!(
            "⏳ Retry attempt {} of {} in {:?}",
            self.current_attempt,
            self.policy.max_retries,
            delay
        );

        Some(delay)
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.current_attempt
    }
}
