//! Message broker (Kafka) readiness check

use crate::checks::{addr_context, BackendKind, BoxError, CheckError, CheckOutcome, CheckResult, Checker};
use crate::config::KafkaConfig;
use crate::env::{self, Environment, ProcessEnv};
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// SASL/PLAIN credentials, only built when both parts are present
#[derive(Clone)]
pub struct SaslCredentials {
    pub username: String,
    pub password: String,
}

impl SaslCredentials {
    pub fn from_parts(username: &str, password: &str) -> Option<Self> {
        if username.is_empty() || password.is_empty() {
            return None;
        }
        Some(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

impl std::fmt::Debug for SaslCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaslCredentials")
            .field("username", &self.username)
            .field("password", &"******")
            .finish()
    }
}

/// Builds broker clients
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn connect(
        &self,
        addresses: &[String],
        sasl: Option<&SaslCredentials>,
    ) -> Result<Box<dyn BrokerSession>, BoxError>;
}

/// A constructed broker client
#[async_trait]
pub trait BrokerSession: Send + Sync {
    /// Names of all topics the cluster currently knows
    async fn topics(&self) -> Result<Vec<String>, BoxError>;

    async fn close(self: Box<Self>);
}

/// Connector backed by librdkafka
#[derive(Debug, Clone)]
pub struct RdKafkaDriver {
    metadata_timeout: Duration,
}

impl RdKafkaDriver {
    pub fn new(metadata_timeout: Duration) -> Self {
        Self { metadata_timeout }
    }

    /// Client configuration for the given brokers
    pub fn client_config(addresses: &[String], sasl: Option<&SaslCredentials>) -> ClientConfig {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", addresses.join(","))
            .set("client.id", "component-check");

        if let Some(sasl) = sasl {
            client_config
                .set("security.protocol", "SASL_PLAINTEXT")
                .set("sasl.mechanism", "PLAIN")
                .set("sasl.username", &sasl.username)
                .set("sasl.password", &sasl.password);
        }

        client_config
    }
}

#[async_trait]
impl BrokerConnector for RdKafkaDriver {
    async fn connect(
        &self,
        addresses: &[String],
        sasl: Option<&SaslCredentials>,
    ) -> Result<Box<dyn BrokerSession>, BoxError> {
        let consumer: BaseConsumer = Self::client_config(addresses, sasl).create()?;
        Ok(Box::new(RdKafkaSession {
            consumer: Arc::new(consumer),
            metadata_timeout: self.metadata_timeout,
        }))
    }
}

struct RdKafkaSession {
    consumer: Arc<BaseConsumer>,
    metadata_timeout: Duration,
}

#[async_trait]
impl BrokerSession for RdKafkaSession {
    async fn topics(&self) -> Result<Vec<String>, BoxError> {
        let consumer = Arc::clone(&self.consumer);
        let metadata_timeout = self.metadata_timeout;
        let topics = tokio::task::spawn_blocking(move || {
            consumer.fetch_metadata(None, metadata_timeout).map(|metadata| {
                metadata
                    .topics()
                    .iter()
                    .map(|topic| topic.name().to_string())
                    .collect::<Vec<_>>()
            })
        })
        .await??;

        Ok(topics)
    }

    async fn close(self: Box<Self>) {
        // librdkafka tears the client down when the last handle drops
        drop(self.consumer);
    }
}

/// First required topic absent from the live list, by exact name
pub fn first_missing_topic<'a>(required: &'a [String], live: &[String]) -> Option<&'a str> {
    let live: HashSet<&str> = live.iter().map(String::as_str).collect();
    required
        .iter()
        .map(String::as_str)
        .find(|topic| !live.contains(topic))
}

/// Lists topics and verifies the required ones exist
pub struct KafkaChecker {
    config: KafkaConfig,
    metadata_timeout: Duration,
    env: Arc<dyn Environment>,
    connector: Arc<dyn BrokerConnector>,
}

impl KafkaChecker {
    pub fn new(config: KafkaConfig, metadata_timeout: Duration) -> Self {
        Self {
            config,
            metadata_timeout,
            env: Arc::new(ProcessEnv),
            connector: Arc::new(RdKafkaDriver::new(metadata_timeout)),
        }
    }

    pub fn with_environment(mut self, env: Arc<dyn Environment>) -> Self {
        self.env = env;
        self
    }

    pub fn with_connector(mut self, connector: Arc<dyn BrokerConnector>) -> Self {
        self.connector = connector;
        self
    }

    async fn verify_topics(&self, session: &dyn BrokerSession, context: &str) -> CheckResult<()> {
        let live = match timeout(self.metadata_timeout, session.topics()).await {
            Ok(Ok(topics)) => topics,
            Ok(Err(e)) => return Err(CheckError::connectivity(e, context)),
            Err(_) => return Err(CheckError::timeout("kafka topic listing", context)),
        };

        // Topic names are structural, never taken from the environment
        let required = self.config.required_topics();
        match first_missing_topic(&required, &live) {
            Some(topic) => Err(CheckError::MissingTopic {
                topic: topic.to_string(),
                context: context.to_string(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Checker for KafkaChecker {
    fn kind(&self) -> BackendKind {
        BackendKind::Kafka
    }

    async fn check(&self) -> CheckResult<CheckOutcome> {
        let env = self.env.as_ref();
        let username = env::resolve_with(env, env::KAFKA_USERNAME, &self.config.username);
        let password = env::resolve_with(env, env::KAFKA_PASSWORD, &self.config.password);
        let address = env::resolve_list(env, env::KAFKA_ADDRESS, &self.config.address);

        let addresses = env::split_addresses(&address);
        let context = addr_context(&address);
        let sasl = SaslCredentials::from_parts(&username, &password);

        let session = self
            .connector
            .connect(&addresses, sasl.as_ref())
            .await
            .map_err(|e| CheckError::connectivity(e, context.clone()))?;

        let verified = self.verify_topics(session.as_ref(), &context).await;
        session.close().await;

        verified.map(|()| CheckOutcome::Verified(context))
    }
}
