//! Route tables for the relay

pub mod api;
pub mod public;
