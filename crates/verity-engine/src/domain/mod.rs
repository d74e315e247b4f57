//! # Domain Layer
//!
//! Pure verification logic. Storage, FEC and telemetry are reached only
//! through the outbound ports.

pub mod builder;
pub mod cache;
pub mod config;
pub mod entities;
pub mod errors;
pub mod geometry;
pub mod hasher;
pub mod policy;
pub mod prefetch;
pub mod segments;
pub mod verifier;
