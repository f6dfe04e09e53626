use super::*;
use std::sync::atomic::{AtomicU32, Ordering};

#[test]
fn delay_for_doubles_then_caps() {
    let policy = BackoffPolicy::DEFAULT;
    assert_eq!(policy.delay_for(0), Duration::from_secs(1));
    assert_eq!(policy.delay_for(1), Duration::from_secs(2));
    assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    assert_eq!(policy.delay_for(5), Duration::from_secs(30));
    assert_eq!(policy.delay_for(20), Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn with_backoff_retries_recoverable_errors_until_success() {
    let attempts = AtomicU32::new(0);
    let result = with_backoff(BackoffPolicy::DEFAULT, || {
        let n = attempts.fetch_add(1, Ordering::SeqCst);
        async move {
            if n < 2 {
                Err(ShellError::Transport("flaky".to_string()))
            } else {
                Ok(42)
            }
        }
    })
    .await;

    assert_eq!(result.unwrap(), 42);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn with_backoff_gives_up_after_max_retries() {
    let attempts = AtomicU32::new(0);
    let policy = BackoffPolicy {
        max_retries: 2,
        ..BackoffPolicy::DEFAULT
    };
    let result: Result<(), ShellError> = with_backoff(policy, || {
        attempts.fetch_add(1, Ordering::SeqCst);
        async { Err(ShellError::Timeout(500)) }
    })
    .await;

    assert!(result.is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn with_backoff_does_not_retry_fatal_errors() {
    let attempts = AtomicU32::new(0);
    let result: Result<(), ShellError> = with_backoff(BackoffPolicy::DEFAULT, || {
        attempts.fetch_add(1, Ordering::SeqCst);
        async { Err(ShellError::NotConnected) }
    })
    .await;

    assert!(matches!(result, Err(ShellError::NotConnected)));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}
