//! Exponential backoff for the HTTP collaborators (embeddings, generation).

use std::future::Future;
use std::time::{Duration, Instant};

use crate::error::{KgragError, Result};

const RETRYABLE_STATUS: [&str; 5] = ["429", "500", "502", "503", "504"];

/// Rate limits (429) and server errors (5xx) are worth another attempt;
/// everything else is returned immediately.
pub fn is_retryable(err: &KgragError) -> bool {
    match err {
        KgragError::Embedding(msg) | KgragError::Generation(msg) => {
            msg.starts_with("Network error")
                || RETRYABLE_STATUS
                    .iter()
                    .any(|code| msg.contains(&format!("API error {}", code)))
        }
        _ => false,
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or
/// `max_retries` retries are spent. The delay doubles after every retry.
pub async fn with_backoff<T, F, Fut>(
    label: &str,
    max_retries: usize,
    initial_delay: Duration,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start = Instant::now();
    let mut attempt = 0;
    let mut delay = initial_delay;

    loop {
        match op().await {
            Ok(value) => {
                log::debug!("{} took {:?} (attempt {})", label, start.elapsed(), attempt + 1);
                return Ok(value);
            }
            Err(e) if attempt < max_retries && is_retryable(&e) => {
                log::warn!("{}: retry {}/{} after error: {}", label, attempt + 1, max_retries, e);
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
