use std::time::Duration;

use tollgate_lib::admission::{Decision, TokenBucket};
use tollgate_lib::TollgateError;

type TestResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[test]
fn burst_of_two_then_rejected() -> TestResult {
    let bucket = TokenBucket::new(2, Duration::from_secs(1))?;
    let t0 = bucket.last_refill();

    let results: Vec<bool> = (0..3).map(|_| bucket.allow_at(t0)).collect();
    assert_eq!(results, vec![true, true, false]);
    Ok(())
}

#[test]
fn one_token_refills_after_interval() -> TestResult {
    let bucket = TokenBucket::new(1, Duration::from_secs(1))?;
    let t0 = bucket.last_refill();

    assert!(bucket.allow_at(t0));
    assert!(!bucket.allow_at(t0 + Duration::from_millis(500)));
    assert!(bucket.allow_at(t0 + Duration::from_millis(1100)));
    Ok(())
}

#[test]
fn construction_rejects_zero_parameters() {
    assert!(matches!(
        TokenBucket::new(0, Duration::from_secs(1)),
        Err(TollgateError::InvalidCapacity)
    ));
    assert!(matches!(
        TokenBucket::new(1, Duration::ZERO),
        Err(TollgateError::InvalidRefillInterval(_))
    ));
}

#[test]
fn admitted_calls_never_exceed_token_bucket_bound() -> TestResult {
    let capacity = 5u32;
    let interval = Duration::from_millis(100);
    let bucket = TokenBucket::new(capacity, interval)?;
    let t0 = bucket.last_refill();

    // 20 calls per interval for 3 seconds, at uneven offsets.
    let window = Duration::from_secs(3);
    let mut admitted = 0u64;
    let mut offset = Duration::ZERO;
    while offset <= window {
        if bucket.allow_at(t0 + offset) {
            admitted += 1;
        }
        offset += Duration::from_millis(5) + Duration::from_micros(offset.as_micros() as u64 % 7);
    }

    let bound = u64::from(capacity) + (window.as_nanos() / interval.as_nanos()) as u64;
    assert!(admitted <= bound, "admitted {admitted} > bound {bound}");
    assert!(admitted > u64::from(capacity), "refill should admit beyond the initial burst");
    Ok(())
}

#[test]
fn low_rate_caller_is_not_starved_by_early_checks() -> TestResult {
    let bucket = TokenBucket::new(1, Duration::from_secs(1))?;
    let t0 = bucket.last_refill();

    assert!(bucket.allow_at(t0));
    // Checks every 300ms must not restart the clock.
    assert!(!bucket.allow_at(t0 + Duration::from_millis(300)));
    assert!(!bucket.allow_at(t0 + Duration::from_millis(600)));
    assert!(!bucket.allow_at(t0 + Duration::from_millis(900)));
    assert!(bucket.allow_at(t0 + Duration::from_millis(1200)));
    Ok(())
}

#[test]
fn try_acquire_reports_remaining_and_retry_after() -> TestResult {
    let bucket = TokenBucket::new(3, Duration::from_secs(12))?;
    let t0 = bucket.last_refill();

    assert_eq!(bucket.try_acquire_at(t0), Decision::Admitted { limit: 3, remaining: 2 });
    assert_eq!(bucket.try_acquire_at(t0), Decision::Admitted { limit: 3, remaining: 1 });
    assert_eq!(bucket.try_acquire_at(t0), Decision::Admitted { limit: 3, remaining: 0 });

    let decision = bucket.try_acquire_at(t0 + Duration::from_secs(2));
    assert_eq!(
        decision,
        Decision::Rejected { limit: 3, retry_after: Duration::from_secs(10) }
    );
    assert_eq!(decision.remaining(), 0);
    assert!(decision.is_rejected());
    Ok(())
}

#[test]
fn reset_refills_to_capacity() -> TestResult {
    let bucket = TokenBucket::new(2, Duration::from_secs(60))?;
    let t0 = bucket.last_refill();

    assert!(bucket.allow_at(t0));
    assert!(bucket.allow_at(t0));
    assert!(!bucket.allow_at(t0));

    let later = t0 + Duration::from_secs(5);
    bucket.reset_at(later);
    assert_eq!(bucket.tokens(), 2);
    assert_eq!(bucket.last_refill(), later);
    assert!(bucket.allow_at(later));
    Ok(())
}

#[test]
fn token_count_stays_within_capacity() -> TestResult {
    let bucket = TokenBucket::new(4, Duration::from_millis(10))?;
    let t0 = bucket.last_refill();

    bucket.allow_at(t0);
    // A long pause earns far more than capacity.
    bucket.allow_at(t0 + Duration::from_secs(3600));
    assert_eq!(bucket.tokens(), 3);
    assert!(bucket.tokens() <= bucket.capacity());
    Ok(())
}
