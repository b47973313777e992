use core::time::Duration;

/// Bounded retry with a recovery step between attempts.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retryable: fn(&anyhow::Error) -> bool,
}

/// Timeouts of any layer: the per-scrape ceiling, browser waits, socket reads.
pub fn is_timeout(err: &anyhow::Error) -> bool {
    err.is::<tokio::time::error::Elapsed>()
        || err.is::<headless_chrome::util::Timeout>()
        || err
            .downcast_ref::<std::io::Error>()
            .is_some_and(|e| e.kind() == std::io::ErrorKind::TimedOut)
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retryable: is_timeout,
        }
    }
}

impl RetryPolicy {
    pub const fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            retryable: is_timeout,
        }
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or has failed
    /// `max_retries` times. `recover` runs before every re-attempt, never after the last one.
    pub async fn run<S, T>(
        &self,
        state: &mut S,
        mut op: impl AsyncFnMut(&mut S) -> anyhow::Result<T>,
        mut recover: impl AsyncFnMut(&mut S) -> anyhow::Result<()>,
    ) -> anyhow::Result<T> {
        let mut failures = 0;

        loop {
            let err = match op(state).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !(self.retryable)(&err) {
                return Err(err);
            }

            failures += 1;
            if failures >= self.max_retries.max(1) {
                return Err(err);
            }

            tracing::warn!(target: "retry", "\x1b[33mattempt {failures}/{} failed\x1b[0m: {err}", self.max_retries);
            recover(state).await?;
        }
    }

    /// [`RetryPolicy::run`] with each attempt capped at `limit`; hitting the cap counts as a timeout.
    pub async fn run_timed<S, T>(
        &self,
        state: &mut S,
        limit: Duration,
        mut op: impl AsyncFnMut(&mut S) -> anyhow::Result<T>,
        recover: impl AsyncFnMut(&mut S) -> anyhow::Result<()>,
    ) -> anyhow::Result<T> {
        self.run(
            state,
            async |state: &mut S| match tokio::time::timeout(limit, op(state)).await {
                Ok(result) => result,
                Err(elapsed) => Err(elapsed.into()),
            },
            recover,
        )
        .await
    }
}
