//! # Ports Layer
//!
//! Inbound API implemented by the service and outbound interfaces the host
//! provides.

pub mod inbound;
pub mod outbound;
