use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::warn;

use super::{DistanceProvider, ProviderError, TravelMatrix};
use crate::models::stop::Coordinate;

/// Retries transient failures with exponential backoff (`base`, `2 * base`, ...).
/// Definitive failures surface on the first attempt.
pub struct RetryingProvider<P> {
    inner: P,
    max_attempts: u32,
    base_delay: Duration,
}

impl<P> RetryingProvider<P> {
    pub fn new(inner: P, max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << (attempt - 1).min(16))
    }
}

#[async_trait]
impl<P: DistanceProvider> DistanceProvider for RetryingProvider<P> {
    async fn matrix(
        &self,
        origins: &[Coordinate],
        destinations: &[Coordinate],
    ) -> Result<TravelMatrix, ProviderError> {
        let mut attempt = 1;
        loop {
            match self.inner.matrix(origins, destinations).await {
                Ok(matrix) => return Ok(matrix),
                Err(ProviderError::Transient(message)) if attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        provider = self.inner.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "transient provider failure; retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::RetryingProvider;
    use crate::models::optimization::TravelCost;
    use crate::models::stop::Coordinate;
    use crate::provider::{DistanceProvider, ProviderError, TravelMatrix};

    struct Flaky {
        calls: AtomicU32,
        failures: u32,
        error: ProviderError,
    }

    #[async_trait]
    impl DistanceProvider for Flaky {
        async fn matrix(
            &self,
            origins: &[Coordinate],
            destinations: &[Coordinate],
        ) -> Result<TravelMatrix, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(self.error.clone());
            }
            Ok(vec![vec![TravelCost::default(); destinations.len()]; origins.len()])
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    fn flaky(failures: u32, error: ProviderError) -> Flaky {
        Flaky {
            calls: AtomicU32::new(0),
            failures,
            error,
        }
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let provider = RetryingProvider::new(
            flaky(2, ProviderError::Transient("timeout".to_string())),
            3,
            Duration::from_millis(1),
        );
        let points = [Coordinate::new(41.0, 29.0)];

        assert!(provider.matrix(&points, &points).await.is_ok());
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let provider = RetryingProvider::new(
            flaky(10, ProviderError::Transient("timeout".to_string())),
            3,
            Duration::from_millis(1),
        );
        let points = [Coordinate::new(41.0, 29.0)];

        assert!(provider.matrix(&points, &points).await.is_err());
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn definitive_failure_is_not_retried() {
        let provider = RetryingProvider::new(
            flaky(10, ProviderError::Definitive("bad request".to_string())),
            3,
            Duration::from_millis(1),
        );
        let points = [Coordinate::new(41.0, 29.0)];

        let err = provider.matrix(&points, &points).await.unwrap_err();
        assert!(matches!(err, ProviderError::Definitive(_)));
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let provider = RetryingProvider::new(
            flaky(0, ProviderError::Transient(String::new())),
            3,
            Duration::from_secs(2),
        );
        assert_eq!(provider.delay_for(1), Duration::from_secs(2));
        assert_eq!(provider.delay_for(2), Duration::from_secs(4));
    }
}
