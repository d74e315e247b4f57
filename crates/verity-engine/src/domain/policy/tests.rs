//! Unit tests for the corruption policy.

use super::*;
use crate::test_utils::{RecordingFatalHandler, RecordingTelemetry, TelemetryEvent};

fn policy(mode: CorruptionMode) -> (CorruptionPolicy, Arc<RecordingTelemetry>, Arc<RecordingFatalHandler>) {
    let sink = Arc::new(RecordingTelemetry::default());
    let fatal = Arc::new(RecordingFatalHandler::default());
    let policy = CorruptionPolicy::new(mode, sink.clone(), fatal.clone())
        .with_telemetry_interval(Duration::ZERO);
    (policy, sink, fatal)
}

// =============================================================================
// Modes
// =============================================================================

/// Test: fail-fast returns Fail and marks the device corrupted
#[test]
fn test_fail_fast_fails() {
    let (policy, sink, fatal) = policy(CorruptionMode::FailFast);
    assert_eq!(policy.status(), VerityStatus::Valid);

    assert_eq!(policy.handle(BlockKind::Data, 5), PolicyDecision::Fail);
    assert!(policy.hash_failed());
    assert_eq!(policy.status(), VerityStatus::Corrupted);
    assert_eq!(sink.events(), vec![TelemetryEvent::Corruption(BlockKind::Data, 5, 1)]);
    assert_eq!(fatal.count(), 0);
}

/// Test: logging mode continues
#[test]
fn test_logging_continues() {
    let (policy, _, fatal) = policy(CorruptionMode::Logging);
    assert_eq!(policy.handle(BlockKind::Metadata, 9), PolicyDecision::Continue);
    assert_eq!(policy.status().as_char(), 'C');
    assert_eq!(fatal.count(), 0);
}

/// Test: restart mode continues and notifies the fatal handler
#[test]
fn test_restart_notifies_fatal_handler() {
    let (policy, _, fatal) = policy(CorruptionMode::Restart);
    assert_eq!(policy.handle(BlockKind::Data, 1), PolicyDecision::Continue);
    assert_eq!(fatal.calls(), vec![(BlockKind::Data, 1)]);
}

// =============================================================================
// Saturation
// =============================================================================

/// Test: counter stops at 100 and event 101 is still decided by mode
#[test]
fn test_saturates_at_maximum() {
    let (policy, sink, _) = policy(CorruptionMode::FailFast);
    for block in 0..MAX_CORRUPTED_ERRS as u64 {
        policy.handle(BlockKind::Data, block);
    }
    assert_eq!(policy.corrupted_error_count(), MAX_CORRUPTED_ERRS);
    assert_eq!(sink.corruption_count(), MAX_CORRUPTED_ERRS as usize);

    assert_eq!(policy.handle(BlockKind::Data, 1000), PolicyDecision::Fail);
    assert_eq!(policy.corrupted_error_count(), MAX_CORRUPTED_ERRS);
    assert_eq!(sink.corruption_count(), MAX_CORRUPTED_ERRS as usize);
}

/// Test: saturated restart mode still triggers the fatal action
#[test]
fn test_saturated_restart_still_fatal() {
    let (policy, _, fatal) = policy(CorruptionMode::Restart);
    for block in 0..=MAX_CORRUPTED_ERRS as u64 {
        assert_eq!(policy.handle(BlockKind::Data, block), PolicyDecision::Continue);
    }
    assert_eq!(fatal.count(), MAX_CORRUPTED_ERRS as usize + 1);
}

/// Test: concurrent reports never exceed the cap
#[test]
fn test_concurrent_saturation() {
    let (policy, _, _) = policy(CorruptionMode::Logging);
    std::thread::scope(|s| {
        for t in 0..8u64 {
            let policy = &policy;
            s.spawn(move || {
                for i in 0..50 {
                    policy.handle(BlockKind::Data, t * 100 + i);
                }
            });
        }
    });
    assert_eq!(policy.corrupted_error_count(), MAX_CORRUPTED_ERRS);
    assert!(policy.hash_failed());
}

// =============================================================================
// Rate limiting
// =============================================================================

/// Test: limiter allows one event per interval
#[test]
fn test_rate_limiter_throttles() {
    let limiter = RateLimiter::new(Duration::from_secs(1));
    let t0 = Instant::now();
    assert!(limiter.should_emit(t0));
    assert!(!limiter.should_emit(t0 + Duration::from_millis(500)));
    assert!(limiter.should_emit(t0 + Duration::from_millis(1000)));
    assert!(!limiter.should_emit(t0 + Duration::from_millis(1999)));
}

/// Test: zero interval never throttles
#[test]
fn test_rate_limiter_zero_interval() {
    let limiter = RateLimiter::new(Duration::ZERO);
    let now = Instant::now();
    assert!(limiter.should_emit(now));
    assert!(limiter.should_emit(now));
}

/// Test: corruption notices bypass the limiter; informational ones do not
#[test]
fn test_corruption_never_throttled() {
    let sink = Arc::new(RecordingTelemetry::default());
    let fatal = Arc::new(RecordingFatalHandler::default());
    let policy = CorruptionPolicy::new(CorruptionMode::Logging, sink.clone(), fatal)
        .with_telemetry_interval(Duration::from_secs(3600));

    for block in 0..5 {
        policy.handle(BlockKind::Data, block);
    }
    policy.report_soft_mismatch(BlockKind::Data, 40);
    policy.report_fec_corrected(BlockKind::Data, 41);

    assert_eq!(sink.corruption_count(), 5);
    assert_eq!(policy.corrupted_error_count(), 5);
    assert_eq!(
        sink.events().last(),
        Some(&TelemetryEvent::SoftMismatch(BlockKind::Data, 40))
    );
}

/// Test: a soft mismatch under the default interval does not swallow the next corruption
#[test]
fn test_soft_mismatch_then_corruption_default_interval() {
    let sink = Arc::new(RecordingTelemetry::default());
    let fatal = Arc::new(RecordingFatalHandler::default());
    let policy = CorruptionPolicy::new(CorruptionMode::Logging, sink.clone(), fatal);

    policy.report_soft_mismatch(BlockKind::Data, 7);
    policy.handle(BlockKind::Data, 20);
    policy.handle(BlockKind::Metadata, 2);

    assert_eq!(
        sink.events(),
        vec![
            TelemetryEvent::SoftMismatch(BlockKind::Data, 7),
            TelemetryEvent::Corruption(BlockKind::Data, 20, 1),
            TelemetryEvent::Corruption(BlockKind::Metadata, 2, 2),
        ]
    );
}

/// Test: soft mismatches and FEC corrections reach the sink without touching state
#[test]
fn test_soft_events_do_not_mark_corrupted() {
    let (policy, sink, _) = policy(CorruptionMode::FailFast);
    policy.report_soft_mismatch(BlockKind::Data, 3);
    policy.report_fec_corrected(BlockKind::Metadata, 7);

    assert!(!policy.hash_failed());
    assert_eq!(
        sink.events(),
        vec![
            TelemetryEvent::SoftMismatch(BlockKind::Data, 3),
            TelemetryEvent::FecCorrected(BlockKind::Metadata, 7),
        ]
    );
}
