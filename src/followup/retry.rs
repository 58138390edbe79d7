//! Bounded retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::ChannelError;

/// Run `op` up to `attempts` times, sleeping `base * 2^n` plus jitter between
/// tries. Only transient failures are retried; permanent and unreachable
/// failures return immediately. The last error is returned when all attempts
/// are spent.
pub async fn with_backoff<F, Fut, T>(
    attempts: u32,
    base: Duration,
    mut op: F,
) -> Result<T, ChannelError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ChannelError>>,
{
    let attempts = attempts.max(1);
    let mut last_err = None;
    for attempt in 0..attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt + 1 < attempts => {
                let delay = backoff_delay(base, attempt);
                warn!(attempt = attempt + 1, delay_ms = delay.as_millis() as u64, %err, "Transient send failure, retrying");
                tokio::time::sleep(delay).await;
                last_err = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    // attempts >= 1 guarantees the loop ran and set or returned an error.
    Err(last_err.unwrap_or(ChannelError::Transient {
        channel: "unknown".into(),
        reason: "no attempts made".into(),
    }))
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exp = base.saturating_mul(1 << attempt.min(10));
    let jitter_ms = rand::thread_rng().gen_range(0..=exp.as_millis().max(1) as u64 / 2);
    exp + Duration::from_millis(jitter_ms)
}
