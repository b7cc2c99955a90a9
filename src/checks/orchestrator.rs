//! Runs the checkers and collects their results

use crate::checks::{
    BackendKind, CheckError, CheckOutcome, CheckResult, Checker, ErrorKind, KafkaChecker,
    MinioChecker, MongoChecker, RedisChecker, ZookeeperChecker,
};
use crate::config::Config;
use crate::env::{Environment, ProcessEnv};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// How the orchestrator schedules checkers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Concurrent,
}

/// Result of one checker
#[derive(Debug)]
pub struct CheckEntry {
    pub backend: BackendKind,
    pub result: CheckResult<CheckOutcome>,
    pub elapsed: Duration,
}

impl CheckEntry {
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }

    pub fn summary(&self) -> EntrySummary {
        let (status, detail, error_kind, code) = match &self.result {
            Ok(CheckOutcome::Verified(descriptor)) => ("passed", descriptor.clone(), None, None),
            Ok(CheckOutcome::Skipped(reason)) => ("skipped", reason.clone(), None, None),
            Err(err) => ("failed", err.to_string(), Some(err.kind()), err.code()),
        };

        EntrySummary {
            backend: self.backend,
            status,
            detail,
            error_kind,
            code,
            elapsed_ms: self.elapsed.as_millis() as u64,
        }
    }
}

/// Serializable view of an entry
#[derive(Debug, Clone, Serialize)]
pub struct EntrySummary {
    pub backend: BackendKind,
    pub status: &'static str,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u32>,
    pub elapsed_ms: u64,
}

/// Results of a run, ordered by backend kind
#[derive(Debug, Default)]
pub struct CheckReport {
    entries: Vec<CheckEntry>,
}

impl CheckReport {
    fn new(mut entries: Vec<CheckEntry>) -> Self {
        entries.sort_by_key(|entry| entry.backend);
        Self { entries }
    }

    pub fn entries(&self) -> &[CheckEntry] {
        &self.entries
    }

    /// True when no checker failed; skipped checks count as passed
    pub fn all_passed(&self) -> bool {
        self.entries.iter().all(CheckEntry::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = (BackendKind, &CheckError)> {
        self.entries
            .iter()
            .filter_map(|entry| entry.result.as_ref().err().map(|err| (entry.backend, err)))
    }

    pub fn summaries(&self) -> Vec<EntrySummary> {
        self.entries.iter().map(CheckEntry::summary).collect()
    }
}

/// Invokes every registered checker once
#[derive(Default)]
pub struct Orchestrator {
    checkers: Vec<Box<dyn Checker>>,
    mode: ExecutionMode,
}

impl Orchestrator {
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            checkers: Vec::new(),
            mode,
        }
    }

    /// All five backend checkers, reading overrides from the process environment
    pub fn from_config(config: &Config) -> Self {
        Self::from_config_with_env(config, Arc::new(ProcessEnv))
    }

    pub fn from_config_with_env(config: &Config, env: Arc<dyn Environment>) -> Self {
        let check = &config.check;
        let mode = if check.concurrent {
            ExecutionMode::Concurrent
        } else {
            ExecutionMode::Sequential
        };

        Self::new(mode)
            .with_checker(
                MongoChecker::new(config.mongo.clone(), check.mongo_timeout())
                    .with_environment(env.clone()),
            )
            .with_checker(
                MinioChecker::new(config.object.clone(), check.object_store_probe())
                    .with_show_secrets(check.show_secrets)
                    .with_environment(env.clone()),
            )
            .with_checker(
                RedisChecker::new(config.redis.clone(), check.redis_timeout())
                    .with_environment(env.clone()),
            )
            .with_checker(
                ZookeeperChecker::new(config.zookeeper.clone(), check.zookeeper_connect())
                    .with_environment(env.clone()),
            )
            .with_checker(
                KafkaChecker::new(config.kafka.clone(), check.kafka_metadata_timeout())
                    .with_environment(env),
            )
    }

    pub fn with_checker(mut self, checker: impl Checker + 'static) -> Self {
        self.checkers.push(Box::new(checker));
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.checkers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }

    /// Run every checker; failures never stop the others
    pub async fn run(&self) -> CheckReport {
        info!(mode = ?self.mode, checks = self.checkers.len(), "Running component checks");

        let entries = match self.mode {
            ExecutionMode::Sequential => {
                let mut entries = Vec::with_capacity(self.checkers.len());
                for checker in &self.checkers {
                    entries.push(run_one(checker.as_ref()).await);
                }
                entries
            }
            ExecutionMode::Concurrent => {
                join_all(self.checkers.iter().map(|checker| run_one(checker.as_ref()))).await
            }
        };

        CheckReport::new(entries)
    }
}

async fn run_one(checker: &dyn Checker) -> CheckEntry {
    let backend = checker.kind();
    let start = Instant::now();
    let result = checker.check().await;
    let elapsed = start.elapsed();

    match &result {
        Ok(CheckOutcome::Verified(descriptor)) => {
            info!(backend = %backend, elapsed_ms = elapsed.as_millis() as u64, descriptor = %descriptor, "check passed")
        }
        Ok(CheckOutcome::Skipped(reason)) => {
            info!(backend = %backend, reason = %reason, "check skipped")
        }
        Err(err) => error!(
            backend = %backend,
            kind = %err.kind(),
            elapsed_ms = elapsed.as_millis() as u64,
            error = %err,
            "check failed"
        ),
    }

    CheckEntry {
        backend,
        result,
        elapsed,
    }
}
