//! Startup readiness verification for the messaging platform's backing services.
//!
//! Before the service boots, every dependency is checked once: MongoDB is
//! pinged, MinIO's health endpoint is probed, Redis answers `PING`, a
//! ZooKeeper session is established, and Kafka is asked for its topic list.
//! Settings come from [`config::Config`], and each field can be overridden
//! through a `{BACKEND}_{FIELD}` environment variable (see [`env`]).

pub mod checks;
pub mod config;
pub mod env;
pub mod error;

pub use checks::{
    BackendKind, CheckError, CheckOutcome, CheckReport, CheckResult, Checker, ErrorKind,
    ExecutionMode, Orchestrator,
};
pub use config::Config;
pub use error::{AppError, Result};
