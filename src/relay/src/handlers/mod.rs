//! Request handlers for the relay

pub mod health;
pub mod proxy;
