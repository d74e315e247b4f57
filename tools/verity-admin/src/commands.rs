//! Subcommand implementations.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{info, warn};
use verity_engine::{
    BlockKind, BlockRegion, BlockVerityApi, CorruptionMode, FileRegion, HashTreeBuilder,
    ReadRequest, TracingTelemetrySink, VerityConfig, VerityDependencies,
    VerityError, VerityTarget,
};
use verity_telemetry::VerityExporter;

use crate::ImageArgs;

// =============================================================================
// Configuration
// =============================================================================

/// Merge the JSON configuration (if any) with command-line overrides.
pub fn resolve_config(args: &ImageArgs) -> Result<VerityConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str::<VerityConfig>(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => VerityConfig::default(),
    };

    if let Some(version) = args.format_version {
        config.version = version;
    }
    if let Some(size) = args.data_block_size {
        config.data_block_size = size;
    }
    if let Some(size) = args.hash_block_size {
        config.hash_block_size = size;
    }
    if let Some(blocks) = args.data_blocks {
        config.data_block_count = blocks;
    }
    if let Some(offset) = args.hash_offset {
        config.hash_start_block = offset;
    }
    if let Some(algorithm) = &args.algorithm {
        config.algorithm = algorithm.clone();
    }
    match args.salt.as_deref() {
        Some("-") => config.salt = None,
        Some(salt) => config.salt = Some(hex::decode(salt).context("salt is not valid hex")?),
        None => {}
    }
    Ok(config)
}

fn apply_root(config: VerityConfig, root: Option<&str>) -> Result<VerityConfig> {
    let config = match root {
        Some(root) => config.with_root_digest(hex::decode(root).context("root digest is not valid hex")?),
        None => config,
    };
    if config.root_digest.is_empty() {
        bail!("no root digest: pass --root or a config containing root_digest");
    }
    Ok(config)
}

// =============================================================================
// format
// =============================================================================

/// Build the tree for the data image and write the hash image.
pub fn format(args: &ImageArgs, write_config: Option<&Path>) -> Result<()> {
    let mut config = resolve_config(args)?;
    let data = FileRegion::open(&args.data, config.data_block_size as usize)
        .with_context(|| format!("opening data image {}", args.data.display()))?;
    if config.data_block_count == 0 {
        config.data_block_count = data.block_count();
    }
    if config.data_block_count == 0 {
        bail!("data image {} holds no complete block", args.data.display());
    }

    let builder = HashTreeBuilder::from_config(&config)?;
    let tree = builder.build(&data)?;
    fs::write(&args.hash, tree.image())
        .with_context(|| format!("writing hash image {}", args.hash.display()))?;

    info!(
        data_blocks = config.data_block_count,
        levels = builder.geometry().levels(),
        tree_blocks = tree.tree_blocks(),
        root = %tree.root_digest,
        "hash tree formatted"
    );

    let config = config.with_root_digest(tree.root_digest.as_bytes().to_vec());
    let json = serde_json::to_string_pretty(&config)?;
    if let Some(path) = write_config {
        fs::write(path, &json).with_context(|| format!("writing config {}", path.display()))?;
    }
    println!("{}", tree.root_digest.to_hex());
    if write_config.is_none() {
        println!("{json}");
    }
    Ok(())
}

// =============================================================================
// verify
// =============================================================================

/// Corrupted block found during a verification pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct CorruptedBlock {
    /// Region holding the block
    pub kind: BlockKind,
    /// Block index within its region
    pub block: u64,
}

/// Result of a full verification pass.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    /// Data blocks covered
    pub data_blocks: u64,
    /// Status character (`V` or `C`)
    pub status: char,
    /// Reported corruption events, saturating
    pub corrupted_error_count: u32,
    /// Distinct corrupted blocks seen
    pub corrupted_blocks: Vec<CorruptedBlock>,
}

impl VerifyReport {
    /// No corruption was seen.
    pub fn clean(&self) -> bool {
        self.status == 'V' && self.corrupted_blocks.is_empty()
    }
}

/// How far a verification pass goes once corruption is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Stop at the lowest corrupted block
    FirstCorruption,
    /// Visit every data block and record each corrupted one
    Exhaustive,
}

// Fail-fast so each corrupted block surfaces as its own error.
fn open_target(args: &ImageArgs, root: Option<&str>) -> Result<VerityTarget> {
    let mut config = apply_root(resolve_config(args)?, root)?.with_corruption_mode(CorruptionMode::FailFast);
    let data = FileRegion::open(&args.data, config.data_block_size as usize)
        .with_context(|| format!("opening data image {}", args.data.display()))?;
    let hash = FileRegion::open(&args.hash, config.hash_block_size as usize)
        .with_context(|| format!("opening hash image {}", args.hash.display()))?;
    if config.data_block_count == 0 {
        config.data_block_count = data.block_count();
    }

    let deps = VerityDependencies::new(Arc::new(data), Arc::new(hash))
        .with_telemetry(Arc::new(TracingTelemetrySink::new(args.data.display().to_string())))
        .with_telemetry_interval(Duration::ZERO);
    Ok(VerityTarget::new(config, deps)?)
}

/// Read every data block through the verifier.
pub fn verify(args: &ImageArgs, root: Option<&str>, mode: ScanMode, batch: u64) -> Result<VerifyReport> {
    let target = open_target(args, root)?;
    let corrupted_blocks = scan(&target, batch, mode)?;
    Ok(VerifyReport {
        data_blocks: target.config().data_block_count,
        status: target.status().as_char(),
        corrupted_error_count: target.corrupted_error_count(),
        corrupted_blocks,
    })
}

fn corrupted(error: VerityError) -> Result<CorruptedBlock> {
    match error {
        VerityError::Corruption { kind, block } => Ok(CorruptedBlock { kind, block }),
        other => Err(other.into()),
    }
}

fn scan(target: &VerityTarget, batch: u64, mode: ScanMode) -> Result<Vec<CorruptedBlock>> {
    let total = target.config().data_block_count;
    let batch = batch.max(1);
    let requests: Vec<ReadRequest> = (0..total)
        .step_by(batch as usize)
        .map(|start| ReadRequest::new(start, batch.min(total - start)))
        .collect();

    let mut found = BTreeSet::new();
    'requests: for (request, result) in requests.iter().zip(target.read_many(&requests)) {
        let end = request.block + request.count;
        let mut start = request.block;
        let mut result = result.map(drop);

        // A failed read stops at its first bad block; resume after it.
        while let Err(e) = result {
            let bad = corrupted(e)?;
            found.insert(bad);
            if mode == ScanMode::FirstCorruption {
                break 'requests;
            }
            warn!(kind = %bad.kind, block = bad.block, start, end, "corrupted block, resuming scan");

            match bad.kind {
                BlockKind::Data => start = bad.block + 1,
                BlockKind::Metadata => {
                    // The data block behind a bad hash block is unknown.
                    for block in start..end {
                        if let Err(e) = target.read_blocks(block, 1) {
                            found.insert(corrupted(e)?);
                        }
                    }
                    start = end;
                }
            }
            result = if start < end {
                target.read_blocks(start, end - start).map(drop)
            } else {
                Ok(())
            };
        }
    }
    Ok(found.into_iter().collect())
}

// =============================================================================
// status
// =============================================================================

/// Run a verification pass and print the resulting metrics.
pub fn status(args: &ImageArgs, root: Option<&str>, prometheus: bool) -> Result<()> {
    let target = open_target(args, root)?;
    scan(&target, 256, ScanMode::Exhaustive)?;

    let snapshot = target.metrics();
    if prometheus {
        let exporter = VerityExporter::register()?;
        exporter.export(&args.data.display().to_string(), &snapshot, target.status());
        print!("{}", exporter.render()?);
    } else {
        let report = serde_json::json!({
            "status": target.status().as_char().to_string(),
            "corrupted_error_count": target.corrupted_error_count(),
            "root_digest": target.root_digest().to_hex(),
            "levels": target.geometry().levels(),
            "metrics": snapshot,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
