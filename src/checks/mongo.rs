//! Document store (MongoDB) readiness check

use crate::checks::{addr_context, BackendKind, BoxError, CheckError, CheckOutcome, CheckResult, Checker};
use crate::config::MongoConfig;
use crate::env::{self, Environment, ProcessEnv};
use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Opens document store connections
#[async_trait]
pub trait MongoConnector: Send + Sync {
    async fn connect(&self, uri: &str) -> Result<Box<dyn MongoSession>, BoxError>;
}

/// An open document store connection
#[async_trait]
pub trait MongoSession: Send + Sync {
    /// Liveness probe
    async fn ping(&self) -> Result<(), BoxError>;

    async fn close(self: Box<Self>);
}

/// Connector backed by the official MongoDB driver
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoDriver;

#[async_trait]
impl MongoConnector for MongoDriver {
    async fn connect(&self, uri: &str) -> Result<Box<dyn MongoSession>, BoxError> {
        let client = Client::with_uri_str(uri).await?;
        Ok(Box::new(MongoDriverSession { client }))
    }
}

struct MongoDriverSession {
    client: Client,
}

#[async_trait]
impl MongoSession for MongoDriverSession {
    async fn ping(&self) -> Result<(), BoxError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await?;
        Ok(())
    }

    async fn close(self: Box<Self>) {
        self.client.shutdown().await;
    }
}

/// Build the connection URI; credentials are left out unless both are present
pub fn build_mongo_uri(
    hosts: &str,
    username: &str,
    password: &str,
    database: &str,
    max_pool_size: &str,
) -> String {
    if !username.is_empty() && !password.is_empty() {
        format!(
            "mongodb://{}:{}@{}/{}?maxPoolSize={}",
            encode_userinfo(username),
            encode_userinfo(password),
            hosts,
            database,
            max_pool_size
        )
    } else {
        format!("mongodb://{}/{}?maxPoolSize={}", hosts, database, max_pool_size)
    }
}

fn encode_userinfo(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Connects, pings, and disconnects
pub struct MongoChecker {
    config: MongoConfig,
    timeout: Duration,
    env: Arc<dyn Environment>,
    connector: Arc<dyn MongoConnector>,
}

impl MongoChecker {
    /// Create a checker using the process environment and the real driver
    pub fn new(config: MongoConfig, timeout: Duration) -> Self {
        Self {
            config,
            timeout,
            env: Arc::new(ProcessEnv),
            connector: Arc::new(MongoDriver),
        }
    }

    pub fn with_environment(mut self, env: Arc<dyn Environment>) -> Self {
        self.env = env;
        self
    }

    pub fn with_connector(mut self, connector: Arc<dyn MongoConnector>) -> Self {
        self.connector = connector;
        self
    }

    fn resolve_uri(&self, hosts: &str) -> String {
        let env = self.env.as_ref();
        let username = env::resolve_with(env, env::MONGO_USERNAME, &self.config.username);
        let password = env::resolve_with(env, env::MONGO_PASSWORD, &self.config.password);
        let database = env::resolve_with(env, env::MONGO_DATABASE, &self.config.database);
        let max_pool_size = env::resolve_with(
            env,
            env::MONGO_MAX_POOL_SIZE,
            &self.config.max_pool_size.to_string(),
        );

        let built = build_mongo_uri(hosts, &username, &password, &database, &max_pool_size);
        env::resolve_with(env, env::MONGO_URI, &built)
    }
}

#[async_trait]
impl Checker for MongoChecker {
    fn kind(&self) -> BackendKind {
        BackendKind::Mongo
    }

    async fn check(&self) -> CheckResult<CheckOutcome> {
        let hosts = env::resolve_list(self.env.as_ref(), env::MONGO_ADDRESS, &self.config.address);
        let uri = self.resolve_uri(&hosts);
        let context = addr_context(&hosts);

        let session = match timeout(self.timeout, self.connector.connect(&uri)).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => return Err(CheckError::connectivity(e, context)),
            Err(_) => return Err(CheckError::timeout("mongo connect", context)),
        };

        let pinged = timeout(self.timeout, session.ping()).await;
        session.close().await;

        match pinged {
            Ok(Ok(())) => {
                debug!(addr = %hosts, "mongo ping succeeded");
                Ok(CheckOutcome::Verified(context))
            }
            Ok(Err(e)) => Err(CheckError::connectivity(e, context)),
            Err(_) => Err(CheckError::timeout("mongo ping", context)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_with_credentials() {
        let uri = build_mongo_uri("a:27017,b:27017", "root", "secret", "im", "100");
        assert_eq!(uri, "mongodb://root:secret@a:27017,b:27017/im?maxPoolSize=100");
    }

    #[test]
    fn test_partial_credentials_mean_no_auth() {
        let uri = build_mongo_uri("a:27017", "root", "", "im", "50");
        assert_eq!(uri, "mongodb://a:27017/im?maxPoolSize=50");

        let uri = build_mongo_uri("a:27017", "", "secret", "im", "50");
        assert_eq!(uri, "mongodb://a:27017/im?maxPoolSize=50");
    }

    #[test]
    fn test_credentials_are_escaped() {
        let uri = build_mongo_uri("a:27017", "ad@min", "p/ss:w", "im", "1");
        assert_eq!(uri, "mongodb://ad%40min:p%2Fss%3Aw@a:27017/im?maxPoolSize=1");
    }

    #[test]
    fn test_uri_override_wins() {
        let env: std::collections::HashMap<String, String> = [
            (env::MONGO_URI.to_string(), "mongodb://override:1/x".to_string()),
            (env::MONGO_USERNAME.to_string(), "ignored".to_string()),
        ]
        .into_iter()
        .collect();

        let checker = MongoChecker::new(MongoConfig::default(), Duration::from_secs(1))
            .with_environment(Arc::new(env));
        assert_eq!(checker.resolve_uri("a:27017"), "mongodb://override:1/x");
    }

    #[test]
    fn test_field_overrides() {
        let env: std::collections::HashMap<String, String> = [
            (env::MONGO_DATABASE.to_string(), "other".to_string()),
            (env::MONGO_MAX_POOL_SIZE.to_string(), "7".to_string()),
        ]
        .into_iter()
        .collect();

        let checker = MongoChecker::new(MongoConfig::default(), Duration::from_secs(1))
            .with_environment(Arc::new(env));
        assert_eq!(checker.resolve_uri("h:1"), "mongodb://h:1/other?maxPoolSize=7");
    }
}
