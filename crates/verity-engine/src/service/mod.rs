//! Service Layer
//!
//! The application service that wires the domain together behind the
//! inbound API and runs requests on a worker pool.

pub mod dependencies;
pub mod verity_target;


pub use dependencies::VerityDependencies;
pub use verity_target::VerityTarget;
