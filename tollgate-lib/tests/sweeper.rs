use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tollgate_lib::admission::{
    AdmissionController, IdleSweep, IdleSweeper, KeyExtractor, RateLimitPolicy, MAX_SWEEP_PERIOD,
};
use tollgate_lib::config::{RateLimitConfig, SweepConfig};
use tollgate_lib::TollgateError;

type TestResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Counts sweeps; panics on the listed call numbers (1-based).
#[derive(Default)]
struct CountingSweep {
    calls: AtomicUsize,
    panic_on: Vec<usize>,
}

impl CountingSweep {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl IdleSweep for CountingSweep {
    fn sweep_idle(&self, _max_idle: Duration) -> usize {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.panic_on.contains(&call) {
            panic!("sweep {call} failed");
        }
        0
    }
}

fn policy(sweep_secs: u64) -> Result<RateLimitPolicy, tollgate_lib::TollgateError> {
    RateLimitPolicy::new(
        "sweep-test",
        10,
        Duration::from_secs(1),
        Duration::from_secs(sweep_secs),
        Duration::from_secs(3600),
    )
}

async fn advance(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
    tokio::task::yield_now().await;
}

#[tokio::test(start_paused = true)]
async fn sweeps_on_a_fixed_period_after_the_first_interval() -> TestResult {
    let target = Arc::new(CountingSweep::default());
    let token = CancellationToken::new();
    let handle = IdleSweeper::new(target.clone(), &policy(60)?).spawn(&token);

    advance(59).await;
    assert_eq!(target.calls(), 0, "no sweep before the first period");

    advance(2).await;
    assert_eq!(target.calls(), 1);

    advance(120).await;
    assert_eq!(target.calls(), 3);

    handle.stop();
    handle.join().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn panicking_sweep_does_not_end_the_schedule() -> TestResult {
    let target = Arc::new(CountingSweep { panic_on: vec![1, 2], ..CountingSweep::default() });
    let token = CancellationToken::new();
    let handle = IdleSweeper::new(target.clone(), &policy(10)?).spawn(&token);

    advance(35).await;
    assert_eq!(target.calls(), 3);
    assert!(!handle.is_finished());

    handle.stop();
    handle.join().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stop_halts_future_ticks() -> TestResult {
    let target = Arc::new(CountingSweep::default());
    let token = CancellationToken::new();
    let handle = IdleSweeper::new(target.clone(), &policy(10)?).spawn(&token);

    advance(15).await;
    assert_eq!(target.calls(), 1);

    handle.stop();
    handle.join().await?;

    advance(100).await;
    assert_eq!(target.calls(), 1);
    assert!(!token.is_cancelled(), "stopping one sweeper leaves the parent token alone");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn cancelling_the_parent_stops_every_sweeper() -> TestResult {
    let a = Arc::new(CountingSweep::default());
    let b = Arc::new(CountingSweep::default());
    let token = CancellationToken::new();
    let first = IdleSweeper::new(a.clone(), &policy(10)?).spawn(&token);
    let second = IdleSweeper::new(b.clone(), &policy(25)?).spawn(&token);

    advance(35).await;
    assert_eq!(a.calls(), 3);
    assert_eq!(b.calls(), 1);

    token.cancel();
    first.join().await?;
    second.join().await?;
    Ok(())
}

#[test]
fn oversized_sweep_periods_fail_at_construction() {
    let huge = SweepConfig { interval_secs: u64::MAX, ..SweepConfig::default() };
    assert!(matches!(
        AdmissionController::from_config("huge", &RateLimitConfig::default(), &huge),
        Err(TollgateError::InvalidSweepInterval(_))
    ));

    let stale = SweepConfig { idle_threshold_secs: u64::MAX, ..SweepConfig::default() };
    assert!(matches!(
        AdmissionController::from_config("stale", &RateLimitConfig::default(), &stale),
        Err(TollgateError::InvalidIdleThreshold(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn longest_accepted_period_keeps_the_sweeper_running() -> TestResult {
    let policy = RateLimitPolicy::new(
        "yearly",
        10,
        Duration::from_secs(1),
        MAX_SWEEP_PERIOD,
        MAX_SWEEP_PERIOD,
    )?;
    let target = Arc::new(CountingSweep::default());
    let token = CancellationToken::new();
    let handle = IdleSweeper::new(target.clone(), &policy).spawn(&token);

    advance(60).await;
    assert!(!handle.is_finished(), "sweeper must still be scheduled");
    assert_eq!(target.calls(), 0);

    handle.stop();
    handle.join().await?;
    Ok(())
}

#[test]
fn sweep_once_reports_panics_as_none() -> TestResult {
    let target = Arc::new(CountingSweep { panic_on: vec![1], ..CountingSweep::default() });
    let sweeper = IdleSweeper::new(target.clone(), &policy(10)?);

    assert_eq!(sweeper.sweep_once(), None);
    assert_eq!(sweeper.sweep_once(), Some(0));
    assert_eq!(target.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn sweeper_evicts_idle_buckets_from_a_live_registry() -> TestResult {
    let policy = RateLimitPolicy::new(
        "live",
        1,
        Duration::from_secs(3600),
        Duration::from_millis(20),
        Duration::from_millis(50),
    )?;
    let controller = AdmissionController::new(policy, KeyExtractor::global());
    assert!(controller.admit_key("idle-key").is_admitted());
    assert!(controller.admit_key("idle-key").is_rejected());

    let token = CancellationToken::new();
    let handle = IdleSweeper::for_controller(&controller).spawn(&token);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while controller.registry().contains("idle-key") {
        if tokio::time::Instant::now() >= deadline {
            return Err("idle bucket was never evicted".into());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // A fresh bucket with full capacity replaces the evicted one.
    assert!(controller.admit_key("idle-key").is_admitted());

    handle.stop();
    handle.join().await?;
    Ok(())
}
