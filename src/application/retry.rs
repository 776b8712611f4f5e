use std::{fmt::Display, future::Future, time::Duration};

use crate::domain::{ErrorClass, ProviderError};

/// Exponential backoff for transient failures. `max_retries` counts the calls
/// made after the first one.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, backoff_multiplier: f32) -> Self {
        self.backoff_multiplier = backoff_multiplier;
        self
    }

    fn next_delay(&self, current: Duration) -> Duration {
        let factor = f64::from(self.backoff_multiplier.max(1.0));
        Duration::try_from_secs_f64(current.as_secs_f64() * factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Upstream messages that signal a passing condition rather than a bad request.
const TRANSIENT_MARKERS: &[&str] = &[
    "overloaded",
    "unavailable",
    "timed out",
    "timeout",
    "connection reset",
];

/// Splits provider failures into those worth trying again later and those
/// that will keep failing until someone changes the configuration.
pub fn classify_provider_error(error: &ProviderError) -> ErrorClass {
    let retryable = match error {
        ProviderError::Timeout(_) | ProviderError::RateLimited(_) | ProviderError::Transport(_) => true,
        ProviderError::Upstream {
            status: Some(status),
            ..
        } => matches!(status, 408 | 429 | 500..=599),
        ProviderError::Upstream {
            status: None,
            message,
        } => {
            let lower = message.to_ascii_lowercase();
            TRANSIENT_MARKERS.iter().any(|marker| lower.contains(marker))
        }
        ProviderError::Auth(_) | ProviderError::InvalidRequest(_) => false,
    };

    if retryable {
        ErrorClass::Retryable
    } else {
        ErrorClass::Fatal
    }
}

/// Runs `operation` until it succeeds, fails with an error `is_retryable`
/// rejects, or the retries run out.
pub async fn execute_with_retry<T, E, Op, Fut, Retryable>(
    config: &RetryConfig,
    is_retryable: Retryable,
    mut operation: Op,
) -> Result<T, E>
where
    E: Display,
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    Retryable: Fn(&E) -> bool,
{
    let mut delay = config.initial_delay;
    let mut retries = 0;

    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        if retries >= config.max_retries || !is_retryable(&error) {
            return Err(error);
        }

        retries += 1;
        tracing::warn!(
            retry = retries,
            max_retries = config.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Transient failure, retrying"
        );
        tokio::time::sleep(delay).await;
        delay = config.next_delay(delay);
    }
}
