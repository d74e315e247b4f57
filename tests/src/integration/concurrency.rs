//! # Concurrent Reads
//!
//! Many requests in flight on one target share the hash cache and the
//! corruption counters. Results must be exactly what a serial reader sees.

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::time::Duration;

    use verity_engine::test_utils::{Fixture, RecordingTelemetry};
    use verity_engine::{
        BlockVerityApi, CancellationFlag, CorruptionMode, ReadRequest, VerityDependencies,
        VerityError, VerityStatus, VerityTarget, MAX_CORRUPTED_ERRS,
    };

    fn open(fixture: &Fixture, cache_blocks: usize, threads: usize) -> VerityTarget {
        let config = fixture
            .config
            .clone()
            .with_hash_cache_blocks(cache_blocks)
            .with_worker_threads(threads)
            .with_prefetch_cluster_bytes(4096);
        VerityTarget::new(
            config,
            VerityDependencies::new(fixture.data.clone(), fixture.hash.clone()),
        )
        .unwrap()
    }

    /// Test: random overlapping requests from many threads all verify
    #[test]
    fn test_random_parallel_reads() {
        let fixture = Fixture::patterned(1, 1000);
        let target = open(&fixture, 8, 4);
        let bytes = fixture.data.snapshot();

        std::thread::scope(|s| {
            for seed in 0..8u64 {
                let target = &target;
                let bytes = &bytes;
                s.spawn(move || {
                    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
                    for _ in 0..40 {
                        let block = rng.gen_range(0..990u64);
                        let count = rng.gen_range(1..=10u64);
                        let content = target.read_blocks(block, count).unwrap();
                        let start = block as usize * 512;
                        assert_eq!(content, bytes[start..start + count as usize * 512]);
                    }
                });
            }
        });

        assert_eq!(target.status(), VerityStatus::Valid);
        assert!(target.cache_stats().resident <= 8);
    }

    /// Test: submitted requests complete independently on the pool
    #[test]
    fn test_submitted_requests_complete() {
        let fixture = Fixture::patterned(1, 256);
        let target = open(&fixture, 64, 4);
        let (tx, rx) = mpsc::channel();

        for i in 0..32u64 {
            let tx = tx.clone();
            target.submit(ReadRequest::new(i * 8, 8), move |result| {
                tx.send((i, result)).unwrap();
            });
        }
        drop(tx);

        let bytes = fixture.data.snapshot();
        let mut completed = 0;
        while let Ok((i, result)) = rx.recv_timeout(Duration::from_secs(30)) {
            let start = i as usize * 8 * 512;
            assert_eq!(result.unwrap(), bytes[start..start + 8 * 512]);
            completed += 1;
        }
        assert_eq!(completed, 32);
        assert_eq!(target.metrics().requests_completed, 32);
    }

    /// Test: cancellation only affects the cancelled request
    #[test]
    fn test_cancellation_is_per_request() {
        let fixture = Fixture::patterned(1, 128);
        let target = open(&fixture, 64, 2);
        let cancel = CancellationFlag::new();
        cancel.cancel();

        let requests = vec![
            ReadRequest::new(0, 64),
            ReadRequest::new(64, 64).with_cancellation(cancel),
        ];
        let results = target.read_many(&requests);
        assert!(results[0].is_ok());
        assert_eq!(results[1], Err(VerityError::Cancelled));
    }

    /// Test: concurrent corruption reports never exceed the cap
    #[test]
    fn test_concurrent_corruption_counting() {
        let fixture = Fixture::patterned(1, 400);
        for block in (0..400).step_by(2) {
            fixture.data.corrupt_byte(fixture.data_offset(block) + 1);
        }
        let telemetry = Arc::new(RecordingTelemetry::default());
        let target = VerityTarget::new(
            fixture.config.clone().with_corruption_mode(CorruptionMode::Logging),
            VerityDependencies::new(fixture.data.clone(), fixture.hash.clone())
                .with_telemetry(telemetry.clone())
                .with_telemetry_interval(Duration::ZERO),
        )
        .unwrap();

        let requests: Vec<ReadRequest> = (0..40).map(|i| ReadRequest::new(i * 10, 10)).collect();
        assert!(target.read_many(&requests).iter().all(Result::is_ok));

        assert_eq!(target.corrupted_error_count(), MAX_CORRUPTED_ERRS);
        assert_eq!(telemetry.corruption_count(), MAX_CORRUPTED_ERRS as usize);
        assert_eq!(target.metrics().corruption_events, 200);
        assert_eq!(target.status(), VerityStatus::Corrupted);
    }
}
