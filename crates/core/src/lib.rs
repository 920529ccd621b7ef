//! Rota Core Library
//!
//! Lease-based locking, versioned schedule storage and the guarded
//! recompute/save flows for shared monthly staff schedules.

pub mod config;
pub mod error;
pub mod invariants;
pub mod models;
pub mod orchestrator;
pub mod storage;
pub mod validation;

pub use config::{ConfigError, DatabaseConfig, LeaseConfig, RotaConfig};
pub use error::{Error, ErrorCode, Result};
pub use models::*;
pub use orchestrator::{EngineOutput, EngineRequest, Orchestrator, SchedulingEngine, WriteOutcome};
pub use storage::{
    Database, LeaseRepository, LeaseStore, ScheduleRepository, ScheduleStore, Storage,
};
