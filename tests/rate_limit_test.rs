//! Sliding-window rate limiter tests against live Redis.

mod common;

use std::time::Duration;

use boxoffice_server::rate_limit::RateLimiter;
use boxoffice_server::utils::error::AppError;

use common::*;

#[tokio::test]
#[ignore] // Requires Redis running
async fn allows_up_to_the_limit_then_blocks() {
    let limiter = RateLimiter::new(test_redis().await);
    let key = format!("user-{}", uuid::Uuid::new_v4().simple());

    for attempt in 1..=5 {
        limiter
            .check_and_record("test_scope", &key, 5, Duration::from_secs(60))
            .await
            .unwrap_or_else(|e| panic!("attempt {attempt} should pass: {e}"));
    }

    let err = limiter
        .check_and_record("test_scope", &key, 5, Duration::from_secs(60))
        .await
        .expect_err("sixth attempt should be limited");
    match err {
        AppError::RateLimited {
            retry_after_seconds,
        } => assert_eq!(retry_after_seconds, 60),
        other => panic!("unexpected error: {other}"),
    }

    limiter.reset("test_scope", &key).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Redis running
async fn window_slides_and_reopens() {
    let limiter = RateLimiter::new(test_redis().await);
    let key = format!("user-{}", uuid::Uuid::new_v4().simple());

    for _ in 0..3 {
        limiter
            .check_and_record("test_scope", &key, 3, Duration::from_secs(2))
            .await
            .unwrap();
    }
    assert!(limiter
        .check_and_record("test_scope", &key, 3, Duration::from_secs(2))
        .await
        .is_err());

    tokio::time::sleep(Duration::from_secs(3)).await;

    limiter
        .check_and_record("test_scope", &key, 3, Duration::from_secs(2))
        .await
        .expect("window has passed");

    limiter.reset("test_scope", &key).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Redis running
async fn scopes_do_not_interfere() {
    let limiter = RateLimiter::new(test_redis().await);
    let key = format!("user-{}", uuid::Uuid::new_v4().simple());

    for _ in 0..5 {
        limiter
            .check_and_record("scope_a", &key, 5, Duration::from_secs(60))
            .await
            .unwrap();
    }
    assert!(limiter
        .check_and_record("scope_a", &key, 5, Duration::from_secs(60))
        .await
        .is_err());

    // Same caller, different operation: unaffected.
    limiter
        .check_and_record("scope_b", &key, 5, Duration::from_secs(60))
        .await
        .expect("other scope stays open");

    limiter.reset("scope_a", &key).await.unwrap();
    limiter.reset("scope_b", &key).await.unwrap();
}
