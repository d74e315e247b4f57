//! # Verification Scenarios
//!
//! Full read path through `VerityTarget` over in-memory regions:
//!
//! 1. **Layout**: tree geometry for large devices, leaf digests written by the
//!    formatter, version 0 and version 1 images
//! 2. **Tampering**: corrupted data and hash blocks under each corruption mode
//! 3. **Reporting**: saturation of the corruption counter, unthrottled corruption notices

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::time::Duration;

    use verity_crypto::{digest_parts, DigestAlgorithm, SoftwareBackend};
    use verity_engine::test_utils::{
        patterned_data, small_config, Fixture, RecordingFatalHandler, RecordingTelemetry,
        TelemetryEvent,
    };
    use verity_engine::{
        BlockKind, BlockRegion, BlockVerityApi, CorruptionMode, TreeGeometry, VerityConfig, VerityDependencies,
        VerityError, VerityStatus, VerityTarget, MAX_CORRUPTED_ERRS,
    };

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn open(fixture: &Fixture, config: VerityConfig) -> VerityTarget {
        VerityTarget::new(
            config,
            VerityDependencies::new(fixture.data.clone(), fixture.hash.clone()),
        )
        .unwrap()
    }

    fn open_observed(
        fixture: &Fixture,
        mode: CorruptionMode,
        interval: Duration,
    ) -> (VerityTarget, Arc<RecordingTelemetry>, Arc<RecordingFatalHandler>) {
        let telemetry = Arc::new(RecordingTelemetry::default());
        let fatal = Arc::new(RecordingFatalHandler::default());
        let target = VerityTarget::new(
            fixture.config.clone().with_corruption_mode(mode),
            VerityDependencies::new(fixture.data.clone(), fixture.hash.clone())
                .with_telemetry(telemetry.clone())
                .with_fatal_handler(fatal.clone())
                .with_telemetry_interval(interval),
        )
        .unwrap();
        (target, telemetry, fatal)
    }

    // =============================================================================
    // LAYOUT
    // =============================================================================

    /// Test: 2^20 blocks of 4096 bytes with 32-byte digests need three levels
    #[test]
    fn test_large_device_geometry() {
        let geometry = TreeGeometry::new(1, 4096, 4096, 32, 1 << 20, 0).unwrap();
        assert_eq!(geometry.hash_per_block_bits(), 7);
        assert_eq!(geometry.levels(), 3);
        // 1 + 64 + 8192 tree blocks
        assert_eq!(geometry.hash_blocks(), 8257);
    }

    /// Test: the formatter writes salt-first leaf digests for version 1
    #[test]
    fn test_leaf_digests_match_formatter_v1() {
        let fixture = Fixture::patterned(1, 40);
        let image = fixture.hash.snapshot();
        let geometry = TreeGeometry::new(1, 512, 512, 32, 40, 0).unwrap();

        for block in [0u64, 15, 16, 39] {
            let (address, offset) = geometry.hash_block_and_offset(block, 0);
            let start = address as usize * 512 + offset;
            let expected = digest_parts(
                &SoftwareBackend,
                DigestAlgorithm::Sha256,
                &[b"verity-salt".as_slice(), fixture.block(block).as_slice()],
            );
            assert_eq!(&image[start..start + 32], expected.as_bytes(), "block {block}");
        }
    }

    /// Test: version 0 puts the salt after the content
    #[test]
    fn test_leaf_digests_match_formatter_v0() {
        let fixture = Fixture::patterned(0, 40);
        let image = fixture.hash.snapshot();
        let geometry = TreeGeometry::new(0, 512, 512, 32, 40, 0).unwrap();

        let (address, offset) = geometry.hash_block_and_offset(21, 0);
        let start = address as usize * 512 + offset;
        let expected = digest_parts(
            &SoftwareBackend,
            DigestAlgorithm::Sha256,
            &[fixture.block(21).as_slice(), b"verity-salt".as_slice()],
        );
        assert_eq!(&image[start..start + 32], expected.as_bytes());
    }

    /// Test: both on-disk formats verify end to end
    #[test]
    fn test_both_versions_verify() {
        for version in [0, 1] {
            let fixture = Fixture::patterned(version, 100);
            let target = open(&fixture, fixture.config.clone());
            assert_eq!(target.read_blocks(0, 100).unwrap(), fixture.data.snapshot());
            assert_eq!(target.status(), VerityStatus::Valid);
        }
    }

    /// Test: every supported digest verifies a multi-level tree
    #[test]
    fn test_algorithms_verify() {
        for algorithm in ["sha1", "sha256", "sha512", "sha3-256", "blake3"] {
            let mut config = small_config(1, 300);
            config.algorithm = algorithm.to_string();
            let fixture = Fixture::build(config, patterned_data(300, 512));
            let target = open(&fixture, fixture.config.clone());
            assert_eq!(
                target.read_blocks(250, 50).unwrap(),
                fixture.data.snapshot()[250 * 512..],
                "{algorithm}"
            );
        }
    }

    /// Test: a tree placed after other hash-region content still verifies
    #[test]
    fn test_hash_start_offset() {
        let mut config = small_config(1, 40);
        config.hash_start_block = 5;
        let fixture = Fixture::build(config, patterned_data(40, 512));
        assert_eq!(fixture.hash.block_count(), 9);

        let target = open(&fixture, fixture.config.clone());
        assert_eq!(target.read_blocks(0, 40).unwrap(), fixture.data.snapshot());
    }

    // =============================================================================
    // TAMPERING
    // =============================================================================

    /// Test: FailFast fails the request at the corrupted block only
    #[test]
    fn test_fail_fast_corrupted_block() {
        let fixture = Fixture::patterned(1, 40);
        fixture.data.corrupt_byte(fixture.data_offset(12) + 100);
        let target = open(&fixture, fixture.config.clone());

        assert_eq!(
            target.read_blocks(8, 8),
            Err(VerityError::Corruption {
                kind: BlockKind::Data,
                block: 12
            })
        );
        assert_eq!(target.read_blocks(8, 4).unwrap(), fixture.data.snapshot()[8 * 512..12 * 512]);
        assert_eq!(target.status(), VerityStatus::Corrupted);
    }

    /// Test: Logging mode completes the request and marks the device corrupted
    #[test]
    fn test_logging_mode_corrupted_block() {
        let fixture = Fixture::patterned(1, 40);
        fixture.data.corrupt_byte(fixture.data_offset(12));
        let (target, telemetry, fatal) =
            open_observed(&fixture, CorruptionMode::Logging, Duration::ZERO);

        assert!(target.read_blocks(8, 8).is_ok());
        assert_eq!(target.status().as_char(), 'C');
        assert_eq!(
            telemetry.events(),
            vec![TelemetryEvent::Corruption(BlockKind::Data, 12, 1)]
        );
        assert_eq!(fatal.count(), 0);
    }

    /// Test: a corrupted leaf hash block fails every block it covers
    #[test]
    fn test_tampered_hash_block() {
        let fixture = Fixture::patterned(1, 40);
        // address 0 is the top level; address 1 holds leaves 0..16
        fixture.hash.corrupt_byte(fixture.hash_offset(1) + 40);
        let target = open(&fixture, fixture.config.clone());

        assert_eq!(
            target.read_blocks(5, 1),
            Err(VerityError::Corruption {
                kind: BlockKind::Metadata,
                block: 1
            })
        );
        assert!(target.read_blocks(16, 24).is_ok());
    }

    /// Test: Restart mode notifies the fatal handler on every corruption
    #[test]
    fn test_restart_mode() {
        let fixture = Fixture::patterned(1, 40);
        fixture.data.corrupt_byte(fixture.data_offset(2));
        fixture.data.corrupt_byte(fixture.data_offset(30));
        let (target, _, fatal) = open_observed(&fixture, CorruptionMode::Restart, Duration::ZERO);

        target.read_blocks(0, 40).unwrap();
        target.read_blocks(2, 1).unwrap();
        assert_eq!(
            fatal.calls(),
            vec![(BlockKind::Data, 2), (BlockKind::Data, 30), (BlockKind::Data, 2)]
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        /// Any flipped byte of data is detected at its block
        #[test]
        fn prop_any_data_corruption_detected(block in 0u64..40, offset in 0usize..512) {
            let fixture = Fixture::patterned(1, 40);
            fixture.data.corrupt_byte(fixture.data_offset(block) + offset);
            let target = open(&fixture, fixture.config.clone());

            prop_assert_eq!(
                target.read_blocks(0, 40),
                Err(VerityError::Corruption { kind: BlockKind::Data, block })
            );
        }
    }

    // =============================================================================
    // REPORTING
    // =============================================================================

    /// Test: reports stop at 100 while the policy keeps deciding
    #[test]
    fn test_corruption_count_saturates() {
        let fixture = Fixture::patterned(1, 120);
        for block in 0..110 {
            fixture.data.corrupt_byte(fixture.data_offset(block));
        }
        let (target, telemetry, fatal) =
            open_observed(&fixture, CorruptionMode::Restart, Duration::ZERO);

        target.read_blocks(0, 120).unwrap();
        assert_eq!(target.corrupted_error_count(), MAX_CORRUPTED_ERRS);
        assert_eq!(telemetry.corruption_count(), MAX_CORRUPTED_ERRS as usize);
        assert_eq!(fatal.count(), 110);
        assert_eq!(target.metrics().corruption_events, 110);
    }

    /// Test: a long interval never hides corruption notices
    #[test]
    fn test_corruption_notices_not_throttled() {
        let fixture = Fixture::patterned(1, 40);
        for block in [1, 5, 9, 13, 17] {
            fixture.data.corrupt_byte(fixture.data_offset(block));
        }
        let (target, telemetry, _) =
            open_observed(&fixture, CorruptionMode::Logging, Duration::from_secs(3600));

        target.read_blocks(0, 40).unwrap();
        assert_eq!(target.corrupted_error_count(), 5);
        assert_eq!(
            telemetry.events(),
            [1, 5, 9, 13, 17]
                .into_iter()
                .zip(1..)
                .map(|(block, count)| TelemetryEvent::Corruption(BlockKind::Data, block, count))
                .collect::<Vec<_>>()
        );
    }

    /// Test: zero blocks never touch the data region
    #[test]
    fn test_zero_blocks_synthesized() {
        let mut data = patterned_data(40, 512);
        data[20 * 512..24 * 512].fill(0);
        let fixture = Fixture::build(small_config(1, 40).with_ignore_zero_blocks(true), data);
        // Garbage in the region is never seen for a zero leaf
        fixture.data.write_at(fixture.data_offset(21), &[0xAB; 512]);
        let target = open(&fixture, fixture.config.clone());

        let content = target.read_blocks(20, 4).unwrap();
        assert!(content.iter().all(|b| *b == 0));
        assert_eq!(fixture.data.read_count(), 0);
        assert_eq!(target.metrics().zero_blocks, 4);
        assert_eq!(target.status(), VerityStatus::Valid);
    }
}
