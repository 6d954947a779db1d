use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

pub(crate) const RATE_LIMIT_MAX_RETRIES: usize = 5;
pub(crate) const RATE_LIMIT_BASE_DELAY: Duration = Duration::from_secs(2);
pub(crate) const RATE_LIMIT_MAX_DELAY: Duration = Duration::from_secs(60);

pub(crate) fn is_rate_limited(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
        return true;
    }
    let lower = body.to_lowercase();
    lower.contains("rate limit")
        || lower.contains("too many requests")
        || lower.contains("quota")
}

pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get("retry-after")?.to_str().ok()?.trim();
    if value.is_empty() {
        return None;
    }
    value.parse::<u64>().ok().map(Duration::from_secs)
}

/// Backoff for requests the service rejected as rate limited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: RATE_LIMIT_MAX_RETRIES,
            base_delay: RATE_LIMIT_BASE_DELAY,
            max_delay: RATE_LIMIT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// True while `attempt` (1-based) may still be followed by another one.
    pub fn allows_retry(&self, attempt: usize) -> bool {
        attempt < self.max_retries
    }
}

pub(crate) async fn wait_with_backoff(
    service: &str,
    policy: &RetryPolicy,
    attempt: usize,
    delay: Duration,
    retry_after: Option<Duration>,
) -> Duration {
    let mut wait = delay;
    if let Some(retry_after) = retry_after
        && retry_after > wait
    {
        wait = retry_after;
    }
    warn!(
        "{} rate limited; retrying in {:.1}s (attempt {}/{})",
        service,
        wait.as_secs_f32(),
        attempt,
        policy.max_retries
    );
    sleep(wait).await;
    next_delay(delay, policy.base_delay, policy.max_delay)
}

pub(crate) fn next_delay(current: Duration, floor: Duration, cap: Duration) -> Duration {
    current.saturating_mul(2).max(floor).min(cap)
}

/// Bounds for polling an asynchronous backend operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub max_attempts: usize,
    pub deadline: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(8),
            max_attempts: 60,
            deadline: Duration::from_secs(120),
        }
    }
}

impl PollPolicy {
    pub fn start(&self) -> PollState {
        PollState {
            policy: *self,
            started: Instant::now(),
            attempts: 0,
            delay: self.initial_interval,
        }
    }
}

/// Progress of one polling loop against a [`PollPolicy`].
#[derive(Debug)]
pub struct PollState {
    policy: PollPolicy,
    started: Instant,
    attempts: usize,
    delay: Duration,
}

impl PollState {
    /// Counts a poll request. Returns false once the attempt budget or the
    /// deadline is used up.
    pub fn begin_attempt(&mut self) -> bool {
        if self.attempts >= self.policy.max_attempts || self.elapsed() >= self.policy.deadline {
            return false;
        }
        self.attempts += 1;
        true
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Waits before the next poll. The wait grows exponentially, is raised to
    /// `retry_after` when the server asks for more, and never sleeps past the
    /// deadline.
    pub async fn wait(&mut self, retry_after: Option<Duration>) {
        let mut wait = self.delay;
        if let Some(retry_after) = retry_after
            && retry_after > wait
        {
            wait = retry_after;
        }
        let remaining = self.policy.deadline.saturating_sub(self.elapsed());
        let wait = wait.min(remaining);
        debug!(
            "operation still running; polling again in {:.1}s (attempt {}/{})",
            wait.as_secs_f32(),
            self.attempts,
            self.policy.max_attempts
        );
        sleep(wait).await;
        self.delay = next_delay(
            self.delay,
            self.policy.initial_interval,
            self.policy.max_interval,
        );
    }
}
