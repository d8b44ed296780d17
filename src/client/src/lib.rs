//! ML Tester client library
//!
//! Session-level request orchestration for testing Azure ML scoring endpoints
//! and the Vision image-analysis API, either directly or through the relay.

pub mod builders;
pub mod config;
pub mod error;
pub mod history;
pub mod orchestrator;
pub mod storage;
pub mod transport;

pub use config::ClientConfig;
pub use error::{OrchestratorError, Result};
pub use history::{History, HISTORY_LIMIT};
pub use orchestrator::{Orchestrator, ScoringInput, SendOutcome, FAILURE_PREFIX};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore};
pub use transport::{Transport, TransportMode};
