// rust/packed-data/src/storage/retry.rs

//! Retry policy for byte fetchers.
//!
//! Transient storage failures are retried with exponential backoff and
//! jitter. Malformed data is never retried: a chunk that fails to parse will
//! fail again.

use std::time::Duration;

use bytes::Bytes;
use rand::Rng;

use super::traits::ByteFetcher;
use crate::config::RetrySettings;
use crate::error::Result;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier (e.g., 2.0 for exponential backoff).
    pub backoff_multiplier: f64,
    /// Whether to add random jitter to delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            backoff_multiplier: settings.backoff_multiplier,
            jitter: settings.jitter,
        }
    }
}

impl RetryConfig {
    /// Creates a retry configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Calculates the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt >= self.max_retries {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt as i32);

        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        let final_delay = if self.jitter {
            // Add up to 25% jitter
            let jitter_factor = 1.0 + rand::rng().random_range(0.0..0.25);
            delay_secs * jitter_factor
        } else {
            delay_secs
        };

        Duration::from_secs_f64(final_delay)
    }

    /// Returns true if more retries are allowed for the given attempt.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

/// Wraps a fetcher and retries transient failures.
pub struct RetryingFetcher<F> {
    inner: F,
    config: RetryConfig,
}

impl<F: ByteFetcher> RetryingFetcher<F> {
    pub fn new(inner: F, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }

    fn with_retries<T>(&self, what: &str, mut operation: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempt = 0;

        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(error) if error.is_transient() && self.config.should_retry(attempt) => {
                    let delay = self.config.delay_for_attempt(attempt);
                    tracing::warn!(
                        fetcher = self.inner.name(),
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "{what} failed, retrying: {error}"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

impl<F: ByteFetcher> ByteFetcher for RetryingFetcher<F> {
    fn fetch(&self, bucket: &str, path: &str) -> Result<Bytes> {
        self.with_retries("fetch", || self.inner.fetch(bucket, path))
    }

    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        self.with_retries("list", || self.inner.list(bucket, prefix))
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataError;
    use crate::storage::{LocalFetcher, MemoryFetcher};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with a storage error for the first `failures` calls.
    struct FlakyFetcher {
        failures: u32,
        calls: AtomicU32,
        corrupt: bool,
    }

    impl FlakyFetcher {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                corrupt: false,
            }
        }
    }

    impl ByteFetcher for FlakyFetcher {
        fn fetch(&self, _bucket: &str, path: &str) -> Result<Bytes> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.corrupt {
                return Err(DataError::format(path, "bad magic"));
            }
            if call < self.failures {
                Err(DataError::storage(path, "connection reset"))
            } else {
                Ok(Bytes::from_static(b"ok"))
            }
        }

        fn list(&self, _bucket: &str, _prefix: &str) -> Result<Vec<String>> {
            Ok(vec![])
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    /// Counts calls to the wrapped fetcher.
    struct Counting<F> {
        inner: F,
        calls: AtomicU32,
    }

    impl<F> Counting<F> {
        fn new(inner: F) -> Self {
            Self {
                inner,
                calls: AtomicU32::new(0),
            }
        }
    }

    impl<F: ByteFetcher> ByteFetcher for Counting<F> {
        fn fetch(&self, bucket: &str, path: &str) -> Result<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch(bucket, path)
        }

        fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
            self.inner.list(bucket, prefix)
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    #[test]
    fn test_no_retry() {
        let config = RetryConfig::no_retry();
        assert_eq!(config.max_retries, 0);
        assert!(!config.should_retry(0));
    }

    #[test]
    fn test_should_retry() {
        let config = RetryConfig::default();
        assert!(config.should_retry(0));
        assert!(config.should_retry(2));
        assert!(!config.should_retry(3));
    }

    #[test]
    fn test_delay_for_attempt() {
        let config = RetryConfig {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: false,
        };

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(5), Duration::ZERO);
    }

    #[test]
    fn test_delay_respects_max() {
        let config = RetryConfig {
            max_retries: 10,
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: false,
        };

        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(30));
        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(30));
    }

    #[test]
    fn test_delay_with_jitter() {
        let config = RetryConfig {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        };

        for _ in 0..20 {
            let delay = config.delay_for_attempt(0);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(125));
        }
    }

    #[test]
    fn test_from_settings() {
        let settings = RetrySettings {
            max_retries: 7,
            initial_delay_ms: 20,
            max_delay_ms: 900,
            backoff_multiplier: 3.0,
            jitter: false,
        };
        let config = RetryConfig::from(&settings);
        assert_eq!(config.max_retries, 7);
        assert_eq!(config.initial_delay, Duration::from_millis(20));
        assert_eq!(config.max_delay, Duration::from_millis(900));
        assert_eq!(config.backoff_multiplier, 3.0);
        assert!(!config.jitter);
    }

    #[test]
    fn test_retrying_fetcher_eventual_success() {
        let fetcher = RetryingFetcher::new(FlakyFetcher::new(2), fast_config(5));
        let bytes = fetcher.fetch("b", "x").unwrap();
        assert_eq!(&bytes[..], b"ok");
        assert_eq!(fetcher.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_retrying_fetcher_exhausted() {
        let fetcher = RetryingFetcher::new(FlakyFetcher::new(100), fast_config(2));
        let err = fetcher.fetch("b", "x").unwrap_err();
        assert!(err.is_transient());
        // Initial attempt + 2 retries = 3 total attempts
        assert_eq!(fetcher.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_retrying_fetcher_does_not_retry_missing_local_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let local = LocalFetcher::with_base_path(temp_dir.path());
        let fetcher = RetryingFetcher::new(Counting::new(local), RetryConfig::default());

        let started = std::time::Instant::now();
        let err = fetcher.fetch("corpus", "missing.bin").unwrap_err();

        assert!(matches!(err, DataError::Storage { .. }));
        assert!(!err.is_transient());
        assert_eq!(fetcher.inner().calls.load(Ordering::SeqCst), 1);
        // No backoff sleep happened
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_retrying_fetcher_does_not_retry_missing_object() {
        let fetcher = RetryingFetcher::new(MemoryFetcher::new(), fast_config(5));
        let err = fetcher.fetch("b", "missing.bin").unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(fetcher.inner().fetch_count(), 1);
    }

    #[test]
    fn test_retrying_fetcher_does_not_retry_format_errors() {
        let mut flaky = FlakyFetcher::new(0);
        flaky.corrupt = true;
        let fetcher = RetryingFetcher::new(flaky, fast_config(5));

        let err = fetcher.fetch("b", "x").unwrap_err();
        assert!(err.is_format());
        assert_eq!(fetcher.inner().calls.load(Ordering::SeqCst), 1);
    }
}
