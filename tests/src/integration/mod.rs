//! Integration flows.

pub mod concurrency;
pub mod file_backed;
pub mod recovery;
pub mod scenarios;
