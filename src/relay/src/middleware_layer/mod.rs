//! Middleware modules for the relay

pub mod logging;
