//! Environment-variable overrides for backend settings.
//!
//! Every backend field can be overridden by a `{BACKEND}_{FIELD}` variable.
//! A variable that is set wins even when its value is empty; only an unset
//! variable falls back to the configured value.

use std::collections::HashMap;

pub const MONGO_URI: &str = "MONGO_URI";
pub const MONGO_ADDRESS: &str = "MONGO_ADDRESS";
pub const MONGO_USERNAME: &str = "MONGO_USERNAME";
pub const MONGO_PASSWORD: &str = "MONGO_PASSWORD";
pub const MONGO_DATABASE: &str = "MONGO_DATABASE";
pub const MONGO_MAX_POOL_SIZE: &str = "MONGO_MAX_POOL_SIZE";

pub const MINIO_ENDPOINT: &str = "MINIO_ENDPOINT";
pub const MINIO_ACCESS_KEY_ID: &str = "MINIO_ACCESS_KEY_ID";
pub const MINIO_SECRET_ACCESS_KEY: &str = "MINIO_SECRET_ACCESS_KEY";
pub const MINIO_USE_SSL: &str = "MINIO_USE_SSL";

pub const REDIS_ADDRESS: &str = "REDIS_ADDRESS";
pub const REDIS_USERNAME: &str = "REDIS_USERNAME";
pub const REDIS_PASSWORD: &str = "REDIS_PASSWORD";

pub const ZOOKEEPER_SCHEMA: &str = "ZOOKEEPER_SCHEMA";
pub const ZOOKEEPER_ADDRESS: &str = "ZOOKEEPER_ADDRESS";
pub const ZOOKEEPER_USERNAME: &str = "ZOOKEEPER_USERNAME";
pub const ZOOKEEPER_PASSWORD: &str = "ZOOKEEPER_PASSWORD";

pub const KAFKA_ADDRESS: &str = "KAFKA_ADDRESS";
pub const KAFKA_USERNAME: &str = "KAFKA_USERNAME";
pub const KAFKA_PASSWORD: &str = "KAFKA_PASSWORD";

/// Source of environment variables
pub trait Environment: Send + Sync {
    /// Look up a variable; `Some` whenever it is set, including to ""
    fn lookup(&self, key: &str) -> Option<String>;
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var_os(key).map(|value| value.to_string_lossy().into_owned())
    }
}

impl Environment for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Resolve a setting against the process environment
pub fn resolve(key: &str, config_value: &str) -> String {
    resolve_with(&ProcessEnv, key, config_value)
}

/// Resolve a setting against an arbitrary environment
pub fn resolve_with(env: &dyn Environment, key: &str, config_value: &str) -> String {
    env.lookup(key).unwrap_or_else(|| config_value.to_string())
}

/// Resolve an address list; the fallback is the configured list joined by `,`
pub fn resolve_list(env: &dyn Environment, key: &str, config_values: &[String]) -> String {
    resolve_with(env, key, &config_values.join(","))
}

/// Split a resolved address string on `,`
pub fn split_addresses(address: &str) -> Vec<String> {
    address.split(',').map(str::to_string).collect()
}
