use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    None,
    /// `base * attempt` before the attempt-th retry.
    Linear(Duration),
}

/// How many extra attempts a component may make and how long it waits
/// between them. Passed into each component so tests can use zero delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn linear(max_retries: u32, base: Duration) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Linear(base),
        }
    }

    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::None,
        }
    }

    /// Total attempts including the first.
    pub fn attempts(&self) -> u32 {
        self.max_retries + 1
    }

    pub fn delay_for(&self, retry: u32) -> Duration {
        match self.backoff {
            Backoff::None => Duration::ZERO,
            Backoff::Linear(base) => base * retry,
        }
    }

    pub async fn wait(&self, retry: u32) {
        let delay = self.delay_for(retry);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::linear(2, Duration::from_millis(1000))
    }
}
