//! Startup readiness checks for the platform's backing services
//!
//! Each backend gets one stateless checker that opens a short-lived
//! connection, verifies it, and closes it again before returning.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 Orchestrator                     │
//! ├─────────────────────────────────────────────────┤
//! │  - sequential or concurrent execution           │
//! │  - report ordered by backend kind               │
//! └─────────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────────┐
//! │              Checker trait                       │
//! ├─────────────────────────────────────────────────┤
//! │  kind()  check() -> CheckResult<CheckOutcome>   │
//! └─────────────────────────────────────────────────┘
//!      │         │         │          │         │
//!      ▼         ▼         ▼          ▼         ▼
//!   MongoDB    MinIO     Redis    ZooKeeper   Kafka
//!    ping     health     PING     handshake   topics
//! ```
//!
//! Every checker talks to its backend through a connector/session pair of
//! traits. The session is consumed by `close`, so each opened connection is
//! released exactly once whichever way the check ends.
//!
//! # Example
//!
//! ```no_run
//! use component_check::checks::Orchestrator;
//! use component_check::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config/config.yaml")?;
//!     let report = Orchestrator::from_config(&config).run().await;
//!
//!     for entry in report.entries() {
//!         println!("{}: {:?}", entry.backend, entry.result);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod broker;
pub mod cache;
pub mod coordination;
mod error;
pub mod mongo;
pub mod object_store;
pub mod orchestrator;

pub use broker::KafkaChecker;
pub use cache::RedisChecker;
pub use coordination::ZookeeperChecker;
pub use error::{
    BoxError, CheckError, CheckResult, ErrorKind, COMPONENT_START_ERR_CODE, CONFIG_ERR_CODE,
};
pub use mongo::MongoChecker;
pub use object_store::MinioChecker;
pub use orchestrator::{CheckEntry, CheckReport, EntrySummary, ExecutionMode, Orchestrator};

use async_trait::async_trait;
use serde::Serialize;
use strum::{Display, EnumIter};

/// Backends verified before the service starts, in reporting order
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter, Serialize,
)]
pub enum BackendKind {
    Mongo,
    ObjectStore,
    Redis,
    Zookeeper,
    Kafka,
}

/// Successful result of a check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum CheckOutcome {
    /// Backend verified; carries the address(es) that were checked
    Verified(String),
    /// Check not applicable to this deployment
    Skipped(String),
}

impl CheckOutcome {
    /// Descriptor of what was verified, if anything was
    pub fn descriptor(&self) -> Option<&str> {
        match self {
            CheckOutcome::Verified(descriptor) => Some(descriptor),
            CheckOutcome::Skipped(_) => None,
        }
    }
}

/// One backend readiness check
#[async_trait]
pub trait Checker: Send + Sync {
    /// Backend this checker verifies
    fn kind(&self) -> BackendKind;

    /// Open, verify and close a connection to the backend
    async fn check(&self) -> CheckResult<CheckOutcome>;
}

/// Descriptor and error context for an address list
pub(crate) fn addr_context(address: &str) -> String {
    format!("the addr is:{}", address)
}
