//! One fetch cycle: current conditions and forecast, retried with a linear
//! backoff, falling back to the last snapshot.

use chrono::Utc;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    Config,
    error::WeatherError,
    model::{CachedSnapshot, Location, Unit, WeatherBundle},
    provider::WeatherProvider,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_secs(1) }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.retry.max_attempts.max(1),
            base_delay: config.base_retry_delay(),
        }
    }

    /// Wait after the failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// How a fetch cycle ended.
#[derive(Debug)]
pub enum FetchOutcome {
    Live(WeatherBundle),
    /// Live data failed; the last snapshot stands in.
    Cached {
        snapshot: CachedSnapshot,
        error: WeatherError,
    },
    Failed(WeatherError),
}

#[derive(Debug, Clone)]
pub struct WeatherFetcher {
    provider: Arc<dyn WeatherProvider>,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl WeatherFetcher {
    pub fn new(provider: Arc<dyn WeatherProvider>, policy: RetryPolicy) -> Self {
        Self { provider, policy, cancel: CancellationToken::new() }
    }

    /// Abort backoff waits when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Both requests run concurrently; either failing fails the cycle.
    pub async fn fetch_once(
        &self,
        location: &Location,
        unit: Unit,
    ) -> Result<WeatherBundle, WeatherError> {
        let (current, forecast) = tokio::try_join!(
            self.provider.current(location, unit),
            self.provider.forecast(location, unit),
        )?;

        Ok(WeatherBundle {
            location: location.clone(),
            unit,
            current,
            forecast,
            fetched_at: Utc::now(),
        })
    }

    #[instrument(skip(self, location, unit), fields(name = %location.name, unit = %unit))]
    pub async fn fetch_with_retry(
        &self,
        location: &Location,
        unit: Unit,
    ) -> Result<WeatherBundle, WeatherError> {
        let mut attempt = 1;

        loop {
            match self.fetch_once(location, unit).await {
                Ok(bundle) => {
                    if attempt > 1 {
                        info!("Fetch succeeded on attempt {}", attempt);
                    }
                    return Ok(bundle);
                }
                Err(err) if !err.is_transient() => {
                    debug!(error = %err, "Non-retryable fetch error");
                    return Err(err);
                }
                Err(err) if attempt >= self.policy.max_attempts => {
                    error!(error = %err, "All {} fetch attempts exhausted", attempt);
                    return Err(err);
                }
                Err(err) => {
                    let delay = self.policy.delay_after(attempt);
                    warn!(
                        error = %err,
                        "Fetch attempt {} of {} failed, retrying in {:?}",
                        attempt,
                        self.policy.max_attempts,
                        delay
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err(WeatherError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Retry, then fall back to `snapshot` if there is one.
    pub async fn fetch_with_fallback(
        &self,
        location: &Location,
        unit: Unit,
        snapshot: Option<CachedSnapshot>,
    ) -> FetchOutcome {
        match self.fetch_with_retry(location, unit).await {
            Ok(bundle) => FetchOutcome::Live(bundle),
            Err(error) => match snapshot {
                Some(snapshot) => {
                    warn!(captured_at = %snapshot.captured_at, "Serving cached snapshot");
                    FetchOutcome::Cached { snapshot, error }
                }
                None => FetchOutcome::Failed(error),
            },
        }
    }
}
