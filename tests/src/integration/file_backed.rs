//! # File-Backed Images
//!
//! Formats a data file, writes the hash image next to it, then verifies
//! through `FileRegion` and exports the resulting counters.

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    use verity_engine::test_utils::{patterned_data, small_config};
    use verity_engine::{
        BlockKind, BlockVerityApi, FileRegion, HashTreeBuilder, VerityConfig, VerityDependencies,
        VerityError, VerityStatus, VerityTarget,
    };
    use verity_telemetry::VerityExporter;

    struct Images {
        dir: TempDir,
        config: VerityConfig,
    }

    impl Images {
        fn data_path(&self) -> std::path::PathBuf {
            self.dir.path().join("data.img")
        }

        fn hash_path(&self) -> std::path::PathBuf {
            self.dir.path().join("hash.img")
        }

        fn open(&self) -> VerityTarget {
            let data = FileRegion::open(self.data_path(), 512).unwrap();
            let hash = FileRegion::open(self.hash_path(), 512).unwrap();
            VerityTarget::new(
                self.config.clone(),
                VerityDependencies::new(Arc::new(data), Arc::new(hash)),
            )
            .unwrap()
        }
    }

    fn format(config: VerityConfig, blocks: u64) -> Images {
        let dir = tempfile::tempdir().unwrap();
        let data_path = dir.path().join("data.img");
        fs::write(&data_path, patterned_data(blocks, 512)).unwrap();

        let region = FileRegion::open(&data_path, 512).unwrap();
        let tree = HashTreeBuilder::from_config(&config)
            .unwrap()
            .build(&region)
            .unwrap();
        fs::write(dir.path().join("hash.img"), tree.image()).unwrap();

        Images {
            dir,
            config: config.with_root_digest(tree.root_digest.as_bytes().to_vec()),
        }
    }

    /// Test: a formatted file pair verifies completely
    #[test]
    fn test_formatted_files_verify() {
        let images = format(small_config(1, 500), 500);
        let target = images.open();

        let content = target.read_blocks(0, 500).unwrap();
        assert_eq!(content, fs::read(images.data_path()).unwrap());
        assert_eq!(target.status(), VerityStatus::Valid);
    }

    /// Test: an edit to the data file after formatting is caught
    #[test]
    fn test_edited_file_detected() {
        let images = format(small_config(0, 100), 100);
        let mut bytes = fs::read(images.data_path()).unwrap();
        bytes[77 * 512 + 300] = 0;
        fs::write(images.data_path(), &bytes).unwrap();

        let target = images.open();
        assert_eq!(
            target.read_blocks(70, 10),
            Err(VerityError::Corruption {
                kind: BlockKind::Data,
                block: 77
            })
        );
    }

    /// Test: a truncated hash image is rejected at construction
    #[test]
    fn test_truncated_hash_image_rejected() {
        let images = format(small_config(1, 100), 100);
        let hash = fs::read(images.hash_path()).unwrap();
        fs::write(images.hash_path(), &hash[..hash.len() - 512]).unwrap();

        let data = FileRegion::open(images.data_path(), 512).unwrap();
        let hash = FileRegion::open(images.hash_path(), 512).unwrap();
        let result = VerityTarget::new(
            images.config.clone(),
            VerityDependencies::new(Arc::new(data), Arc::new(hash)),
        );
        assert!(result.is_err());
    }

    /// Test: counters from a file-backed pass render as Prometheus text
    #[test]
    fn test_metrics_exported() {
        let images = format(small_config(1, 64), 64);
        let target = images.open();
        target.read_blocks(0, 64).unwrap();

        let exporter = VerityExporter::register().unwrap();
        exporter.export("file-backed", &target.metrics(), target.status());
        let text = exporter.render().unwrap();
        assert!(text.contains("verity_data_blocks_verified_total{device=\"file-backed\"} 64"));
        assert!(text.contains("verity_corrupted{device=\"file-backed\"} 0"));
    }
}
