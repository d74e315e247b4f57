//! # Recovery Flows
//!
//! Corruption that is resolved before the corruption policy runs:
//!
//! - a primary digest fault cleared by the fallback digest
//! - data and hash blocks repaired by forward error correction
//! - FEC output that does not verify, which must never be served

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use verity_engine::test_utils::{
        patterned_data, small_config, EchoFec, FaultyBackend, Fixture, MirrorFec,
        RecordingTelemetry, TelemetryEvent,
    };
    use verity_engine::{
        BlockKind, BlockVerityApi, CorruptionMode, FecDecoder, IoSegments, VerityDependencies, VerityError,
        VerityStatus, VerityTarget,
    };

    const MARKER: &[u8] = b"OFFLOAD!";

    fn deps(fixture: &Fixture, telemetry: &Arc<RecordingTelemetry>) -> VerityDependencies {
        VerityDependencies::new(fixture.data.clone(), fixture.hash.clone())
            .with_telemetry(telemetry.clone())
            .with_telemetry_interval(Duration::ZERO)
    }

    fn with_fec(fixture: &Fixture, fec: Arc<dyn FecDecoder>) -> (VerityTarget, Arc<RecordingTelemetry>) {
        let telemetry = Arc::new(RecordingTelemetry::default());
        let target = VerityTarget::new(fixture.config.clone(), deps(fixture, &telemetry).with_fec(fec)).unwrap();
        (target, telemetry)
    }

    // =============================================================================
    // FALLBACK DIGEST
    // =============================================================================

    /// Test: primary fault on one block, fallback matches, device stays valid
    #[test]
    fn test_primary_fault_cleared_by_fallback() {
        let mut data = patterned_data(40, 512);
        data[9 * 512 + 64..9 * 512 + 64 + MARKER.len()].copy_from_slice(MARKER);
        let fixture = Fixture::build(small_config(1, 40), data);

        let backend = Arc::new(FaultyBackend::new(MARKER));
        let telemetry = Arc::new(RecordingTelemetry::default());
        let target = VerityTarget::new(
            fixture.config.clone(),
            deps(&fixture, &telemetry).with_primary_backend(backend.clone()),
        )
        .unwrap();

        assert_eq!(target.read_blocks(0, 40).unwrap(), fixture.data.snapshot());
        assert_eq!(backend.faults(), 1);
        assert_eq!(
            telemetry.events(),
            vec![TelemetryEvent::SoftMismatch(BlockKind::Data, 9)]
        );
        assert_eq!(target.status(), VerityStatus::Valid);
        assert_eq!(target.metrics().soft_mismatches, 1);
    }

    /// Test: a soft mismatch does not hide a later corruption under the default interval
    #[test]
    fn test_soft_mismatch_then_corruption_both_reported() {
        let mut data = patterned_data(40, 512);
        data[7 * 512 + 64..7 * 512 + 64 + MARKER.len()].copy_from_slice(MARKER);
        let fixture = Fixture::build(small_config(1, 40), data);
        fixture.data.corrupt_byte(fixture.data_offset(20) + 9);

        let telemetry = Arc::new(RecordingTelemetry::default());
        let target = VerityTarget::new(
            fixture.config.clone().with_corruption_mode(CorruptionMode::Logging),
            VerityDependencies::new(fixture.data.clone(), fixture.hash.clone())
                .with_telemetry(telemetry.clone())
                .with_primary_backend(Arc::new(FaultyBackend::new(MARKER))),
        )
        .unwrap();

        target.read_blocks(0, 40).unwrap();
        assert_eq!(
            telemetry.events(),
            vec![
                TelemetryEvent::SoftMismatch(BlockKind::Data, 7),
                TelemetryEvent::Corruption(BlockKind::Data, 20, 1),
            ]
        );
        assert_eq!(target.status(), VerityStatus::Corrupted);
    }

    /// Test: a fault in both paths is real corruption
    #[test]
    fn test_fault_in_both_paths_fails() {
        let mut data = patterned_data(40, 512);
        data[3 * 512..3 * 512 + MARKER.len()].copy_from_slice(MARKER);
        let fixture = Fixture::build(small_config(1, 40), data);

        let telemetry = Arc::new(RecordingTelemetry::default());
        let target = VerityTarget::new(
            fixture.config.clone(),
            deps(&fixture, &telemetry)
                .with_primary_backend(Arc::new(FaultyBackend::new(MARKER)))
                .with_fallback_backend(Arc::new(FaultyBackend::new(MARKER))),
        )
        .unwrap();

        assert_eq!(
            target.read_blocks(3, 1),
            Err(VerityError::Corruption {
                kind: BlockKind::Data,
                block: 3
            })
        );
    }

    // =============================================================================
    // FORWARD ERROR CORRECTION
    // =============================================================================

    /// Test: corrupted data is repaired in the caller's buffer
    #[test]
    fn test_fec_repairs_data_in_place() {
        let fixture = Fixture::patterned(1, 40);
        let fec = Arc::new(MirrorFec::new(&fixture));
        let pristine = fixture.data.snapshot();
        fixture.data.corrupt_byte(fixture.data_offset(25) + 7);
        let (target, telemetry) = with_fec(&fixture, fec.clone());

        let mut buf = fixture.data.snapshot()[24 * 512..27 * 512].to_vec();
        let mut segments = IoSegments::single(&mut buf);
        target.verify_read(24, 3, &mut segments).unwrap();

        assert_eq!(buf, pristine[24 * 512..27 * 512]);
        assert_eq!(
            telemetry.events(),
            vec![TelemetryEvent::FecCorrected(BlockKind::Data, 25)]
        );
        assert_eq!(fec.calls(), 1);
        assert_eq!(target.status(), VerityStatus::Valid);
    }

    /// Test: a corrupted hash block is repaired and its subtree served
    #[test]
    fn test_fec_repairs_hash_block() {
        let fixture = Fixture::patterned(1, 40);
        let fec = Arc::new(MirrorFec::new(&fixture));
        let pristine = fixture.data.snapshot();
        fixture.hash.corrupt_byte(fixture.hash_offset(2) + 100);
        let (target, telemetry) = with_fec(&fixture, fec);

        assert_eq!(target.read_blocks(16, 16).unwrap(), pristine[16 * 512..32 * 512]);
        assert_eq!(
            telemetry.events(),
            vec![TelemetryEvent::FecCorrected(BlockKind::Metadata, 2)]
        );
        assert_eq!(target.metrics().fec_corrections, 1);
        assert_eq!(target.status(), VerityStatus::Valid);
    }

    /// Test: unrecoverable blocks fall through to the corruption policy
    #[test]
    fn test_uncorrectable_block() {
        let fixture = Fixture::patterned(1, 40);
        let fec = Arc::new(MirrorFec::new(&fixture));
        fec.break_block(BlockKind::Data, 4);
        fixture.data.corrupt_byte(fixture.data_offset(4));
        let (target, _) = with_fec(&fixture, fec);

        assert_eq!(
            target.read_blocks(0, 8),
            Err(VerityError::Corruption {
                kind: BlockKind::Data,
                block: 4
            })
        );
        assert_eq!(target.status(), VerityStatus::Corrupted);
    }

    /// Test: FEC output that fails the digest is discarded
    #[test]
    fn test_unverified_fec_output_discarded() {
        let fixture = Fixture::patterned(1, 40);
        fixture.data.corrupt_byte(fixture.data_offset(30));
        let (target, telemetry) = with_fec(&fixture, Arc::new(EchoFec));

        assert!(target.read_blocks(30, 1).is_err());
        assert_eq!(telemetry.corruption_count(), 1);
        assert!(!telemetry
            .events()
            .iter()
            .any(|e| matches!(e, TelemetryEvent::FecCorrected(..))));
    }

    /// Test: a failed data read is reconstructed when FEC is available
    #[test]
    fn test_read_failure_reconstructed() {
        let fixture = Fixture::patterned(0, 64);
        let fec = Arc::new(MirrorFec::new(&fixture));
        fixture.data.fail_block(40);
        let (target, _) = with_fec(&fixture, fec);

        assert_eq!(target.read_blocks(40, 1).unwrap(), fixture.block(40));

        fixture.data.heal_block(40);
        assert_eq!(target.read_blocks(38, 4).unwrap(), fixture.data.snapshot()[38 * 512..42 * 512]);
    }
}
