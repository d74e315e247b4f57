//! # Block-Verity Test Suite
//!
//! End-to-end flows across the verity crates.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── scenarios.rs    # Layout, tampering and policy scenarios
//!     ├── recovery.rs     # Fallback digests and FEC
//!     ├── concurrency.rs  # Worker pool, cancellation, shared cache
//!     └── file_backed.rs  # Formatting and verifying image files
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p verity-tests
//!
//! # By category
//! cargo test -p verity-tests integration::scenarios::
//!
//! # Benchmarks
//! cargo bench -p verity-tests
//! ```

pub mod integration;
