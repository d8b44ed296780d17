//! Core services for the relay

pub mod forwarder;
pub mod metrics;
