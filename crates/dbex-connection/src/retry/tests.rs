//! Tests for the retry module

use super::*;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dbex_core::ExtractorError;
use dbex_test_support::LogCapture;
use rstest::rstest;

mod backoff_tests {
    use super::*;

    #[test]
    fn test_backoff_exponential_growth() {
        let backoff = BackoffStrategy::new(100, 30_000);

        assert_eq!(backoff.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(backoff.calculate_delay(1), Duration::from_millis(200));
        assert_eq!(backoff.calculate_delay(2), Duration::from_millis(400));
        assert_eq!(backoff.calculate_delay(3), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_max_limit() {
        let backoff = BackoffStrategy::new(100, 1000);
        assert_eq!(backoff.calculate_delay(10), Duration::from_millis(1000));
        assert_eq!(backoff.calculate_delay(u32::MAX), Duration::from_millis(1000));
    }

    #[test]
    fn test_backoff_default() {
        let backoff = BackoffStrategy::default();
        assert_eq!(backoff.initial_delay(), Duration::from_millis(1000));
        assert_eq!(backoff.multiplier(), 2.0);
    }

    #[test]
    fn test_backoff_zero_interval() {
        let backoff = BackoffStrategy::new(0, 0);
        assert_eq!(backoff.calculate_delay(3), Duration::ZERO);
    }

    #[test]
    fn test_backoff_multiplier_minimum() {
        let backoff = BackoffStrategy::new(100, 1000).with_multiplier(0.5);
        assert_eq!(backoff.multiplier(), 1.0);
    }

    #[test]
    fn test_backoff_max_at_least_initial() {
        let backoff = BackoffStrategy::new(1000, 100);
        assert_eq!(backoff.max_delay(), Duration::from_millis(1000));
    }
}

mod executor_tests {
    use super::*;

    /// Records the attempts the hook was called for
    #[derive(Default)]
    struct RecordingHook {
        attempts: Mutex<Vec<u32>>,
    }

    impl RecordingHook {
        fn attempts(&self) -> Vec<u32> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BeforeRetry for RecordingHook {
        async fn before_retry(&self, attempt: u32) {
            self.attempts.lock().unwrap().push(attempt);
        }
    }

    fn transient() -> ExtractorError {
        ExtractorError::Connection("Connection reset by peer".into())
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(3)]
    #[case(4)]
    #[case(5)]
    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_failures(#[case] succeed_on: u32) {
        let logs = LogCapture::new();
        let _guard = logs.install();

        let calls = AtomicU32::new(0);
        let executor = RetryExecutor::new(5);
        let result = executor
            .call(&NoReconnect, || {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if call < succeed_on {
                        Err(transient())
                    } else {
                        Ok(call)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, succeed_on);
        assert_eq!(calls.load(Ordering::SeqCst), succeed_on);
        assert_eq!(logs.count("Retrying..."), (succeed_on - 1) as usize);
        for k in 1..succeed_on {
            assert!(logs.contains(&format!(
                "Connection reset by peer. Retrying... [{}x]",
                k
            )));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_report_attempts() {
        let calls = AtomicU32::new(0);
        let executor = RetryExecutor::new(3);
        let err = executor
            .call(&NoReconnect, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ExtractorError::Driver("database is locked.".into())) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractorError::User(_)));
        assert_eq!(err.to_string(), "database is locked. Tried 3 times.");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_propagates_immediately() {
        let calls = AtomicU32::new(0);
        let hook = RecordingHook::default();
        let err = RetryExecutor::new(5)
            .call(&hook, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ExtractorError::Query("syntax error".into())) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractorError::Query(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(hook.attempts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_sleeps_and_hook_order() {
        let hook = RecordingHook::default();
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();

        RetryExecutor::new(4)
            .call(&hook, || {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { if call < 4 { Err(transient()) } else { Ok(()) } }
            })
            .await
            .unwrap();

        // 1s + 2s + 4s
        assert_eq!(start.elapsed(), Duration::from_millis(7000));
        assert_eq!(hook.attempts(), vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_clamped_to_one_attempt() {
        let executor = RetryExecutor::new(0);
        assert_eq!(executor.max_retries(), 1);

        let err = executor
            .call(&NoReconnect, || async { Err::<(), _>(transient()) })
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Connection reset by peer. Tried 1 times."
        );
    }
}
