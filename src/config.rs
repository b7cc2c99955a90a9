use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default location of the deployment configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Document store
    #[serde(default)]
    pub mongo: MongoConfig,

    /// Object storage
    #[serde(default)]
    pub object: ObjectConfig,

    /// Cache
    #[serde(default)]
    pub redis: RedisConfig,

    /// Coordination service
    #[serde(default)]
    pub zookeeper: ZookeeperConfig,

    /// Message broker
    #[serde(default)]
    pub kafka: KafkaConfig,

    /// Check execution settings
    #[serde(default)]
    pub check: CheckConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the embedded defaults, a file and the environment
    pub fn load(path: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(path).required(false))
            // Override with environment variables (prefix: COMPONENT_CHECK__)
            .add_source(
                config::Environment::with_prefix("COMPONENT_CHECK")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("mongo.address")
                    .with_list_parse_key("redis.address")
                    .with_list_parse_key("zookeeper.address")
                    .with_list_parse_key("kafka.address")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoConfig {
    /// Host:port list
    #[serde(default = "default_mongo_address")]
    pub address: Vec<String>,

    #[serde(default = "default_mongo_database")]
    pub database: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_pool_size")]
    pub max_pool_size: u32,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            address: default_mongo_address(),
            database: default_mongo_database(),
            username: String::new(),
            password: String::new(),
            max_pool_size: default_pool_size(),
        }
    }
}

/// Object storage providers the platform can be deployed with
///
/// Unknown names load as [`ObjectStorageKind::Other`]; only `minio` is
/// verified at startup, every other provider is skipped.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum ObjectStorageKind {
    #[default]
    Minio,
    Cos,
    Oss,
    Kodo,
    Aws,
    Other(String),
}

impl ObjectStorageKind {
    pub fn as_str(&self) -> &str {
        match self {
            ObjectStorageKind::Minio => "minio",
            ObjectStorageKind::Cos => "cos",
            ObjectStorageKind::Oss => "oss",
            ObjectStorageKind::Kodo => "kodo",
            ObjectStorageKind::Aws => "aws",
            ObjectStorageKind::Other(name) => name,
        }
    }
}

impl From<String> for ObjectStorageKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "minio" => ObjectStorageKind::Minio,
            "cos" => ObjectStorageKind::Cos,
            "oss" => ObjectStorageKind::Oss,
            "kodo" => ObjectStorageKind::Kodo,
            "aws" => ObjectStorageKind::Aws,
            _ => ObjectStorageKind::Other(name),
        }
    }
}

impl From<ObjectStorageKind> for String {
    fn from(kind: ObjectStorageKind) -> Self {
        kind.as_str().to_string()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectConfig {
    /// Active storage provider
    #[serde(default)]
    pub enable: ObjectStorageKind,

    /// Externally advertised API URL
    #[serde(default)]
    pub api_url: String,

    #[serde(default)]
    pub minio: MinioConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinioConfig {
    #[serde(default = "default_minio_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub access_key_id: String,

    #[serde(default)]
    pub secret_access_key: String,

    /// Public endpoint used when signing URLs
    #[serde(default)]
    pub sign_endpoint: String,

    #[serde(default)]
    pub use_ssl: bool,
}

impl Default for MinioConfig {
    fn default() -> Self {
        Self {
            endpoint: default_minio_endpoint(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            sign_endpoint: String::new(),
            use_ssl: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// One address for a single node, several for a cluster
    #[serde(default = "default_redis_address")]
    pub address: Vec<String>,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            address: default_redis_address(),
            username: String::new(),
            password: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZookeeperConfig {
    #[serde(default = "default_zookeeper_address")]
    pub address: Vec<String>,

    /// Auth scheme used with `add_auth`
    #[serde(default = "default_zookeeper_schema")]
    pub schema: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Session timeout requested from the ensemble (milliseconds)
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,
}

impl Default for ZookeeperConfig {
    fn default() -> Self {
        Self {
            address: default_zookeeper_address(),
            schema: default_zookeeper_schema(),
            username: String::new(),
            password: String::new(),
            session_timeout_ms: default_session_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    #[serde(default = "default_kafka_address")]
    pub address: Vec<String>,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_latest_msg_to_redis")]
    pub latest_msg_to_redis: TopicConfig,

    #[serde(default = "default_msg_to_mongo")]
    pub msg_to_mongo: TopicConfig,

    #[serde(default = "default_msg_to_push")]
    pub msg_to_push: TopicConfig,
}

impl KafkaConfig {
    /// Topics the service cannot start without
    pub fn required_topics(&self) -> Vec<String> {
        vec![
            self.msg_to_mongo.topic.clone(),
            self.msg_to_push.topic.clone(),
            self.latest_msg_to_redis.topic.clone(),
        ]
    }
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            address: default_kafka_address(),
            username: String::new(),
            password: String::new(),
            latest_msg_to_redis: default_latest_msg_to_redis(),
            msg_to_mongo: default_msg_to_mongo(),
            msg_to_push: default_msg_to_push(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicConfig {
    pub topic: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Run all checks at once instead of one after another
    #[serde(default)]
    pub concurrent: bool,

    /// Show credentials in error diagnostics
    #[serde(default)]
    pub show_secrets: bool,

    /// Bound for each of the mongo connect and ping stages (seconds)
    #[serde(default = "default_mongo_timeout")]
    pub mongo_timeout_secs: u64,

    /// Object store health probe bound (seconds)
    #[serde(default = "default_object_store_probe")]
    pub object_store_probe_secs: u64,

    /// Bound on the wait for a connected zookeeper session (seconds)
    #[serde(default = "default_zookeeper_connect")]
    pub zookeeper_connect_secs: u64,

    /// Bound on redis connect + ping (seconds)
    #[serde(default = "default_redis_timeout")]
    pub redis_timeout_secs: u64,

    /// Bound on the kafka topic listing (seconds)
    #[serde(default = "default_kafka_metadata_timeout")]
    pub kafka_metadata_timeout_secs: u64,
}

impl CheckConfig {
    pub fn mongo_timeout(&self) -> Duration {
        Duration::from_secs(self.mongo_timeout_secs)
    }

    pub fn object_store_probe(&self) -> Duration {
        Duration::from_secs(self.object_store_probe_secs)
    }

    pub fn zookeeper_connect(&self) -> Duration {
        Duration::from_secs(self.zookeeper_connect_secs)
    }

    pub fn redis_timeout(&self) -> Duration {
        Duration::from_secs(self.redis_timeout_secs)
    }

    pub fn kafka_metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.kafka_metadata_timeout_secs)
    }
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            concurrent: false,
            show_secrets: false,
            mongo_timeout_secs: default_mongo_timeout(),
            object_store_probe_secs: default_object_store_probe(),
            zookeeper_connect_secs: default_zookeeper_connect(),
            redis_timeout_secs: default_redis_timeout(),
            kafka_metadata_timeout_secs: default_kafka_metadata_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

// Default value functions
fn default_mongo_address() -> Vec<String> {
    vec!["127.0.0.1:37017".to_string()]
}

fn default_mongo_database() -> String {
    "openim_v3".to_string()
}

fn default_pool_size() -> u32 {
    100
}

fn default_minio_endpoint() -> String {
    "http://127.0.0.1:10005".to_string()
}

fn default_redis_address() -> Vec<String> {
    vec!["127.0.0.1:16379".to_string()]
}

fn default_zookeeper_address() -> Vec<String> {
    vec!["127.0.0.1:12181".to_string()]
}

fn default_zookeeper_schema() -> String {
    "digest".to_string()
}

fn default_session_timeout_ms() -> u64 {
    1000
}

fn default_kafka_address() -> Vec<String> {
    vec!["127.0.0.1:19092".to_string()]
}

fn default_latest_msg_to_redis() -> TopicConfig {
    TopicConfig {
        topic: "latestMsgToRedis".to_string(),
    }
}

fn default_msg_to_mongo() -> TopicConfig {
    TopicConfig {
        topic: "offlineMsgToMongoMysql".to_string(),
    }
}

fn default_msg_to_push() -> TopicConfig {
    TopicConfig {
        topic: "msgToPush".to_string(),
    }
}

fn default_mongo_timeout() -> u64 {
    30
}

fn default_object_store_probe() -> u64 {
    1
}

fn default_zookeeper_connect() -> u64 {
    5
}

fn default_redis_timeout() -> u64 {
    10
}

fn default_kafka_metadata_timeout() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}
