//! Cache (Redis) readiness check

use crate::checks::{addr_context, BackendKind, BoxError, CheckError, CheckOutcome, CheckResult, Checker};
use crate::config::RedisConfig;
use crate::env::{self, Environment, ProcessEnv};
use async_trait::async_trait;
use redis::cluster::{ClusterClient, ClusterClientBuilder};
use redis::{Client, IntoConnectionInfo};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Client topology chosen from the resolved address list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheTopology {
    Single(String),
    Cluster(Vec<String>),
}

impl CacheTopology {
    /// More than one comma-separated address means a cluster
    pub fn from_address(address: &str) -> Self {
        let mut addresses = env::split_addresses(address);
        if addresses.len() > 1 {
            CacheTopology::Cluster(addresses)
        } else {
            CacheTopology::Single(addresses.pop().unwrap_or_default())
        }
    }

    pub fn addresses(&self) -> Vec<&str> {
        match self {
            CacheTopology::Single(address) => vec![address.as_str()],
            CacheTopology::Cluster(addresses) => addresses.iter().map(String::as_str).collect(),
        }
    }
}

/// Credentials presented to the cache; empty values are omitted
#[derive(Clone, Default)]
pub struct CacheCredentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl CacheCredentials {
    pub fn new(username: &str, password: &str) -> Self {
        let non_empty = |value: &str| (!value.is_empty()).then(|| value.to_string());
        Self {
            username: non_empty(username),
            password: non_empty(password),
        }
    }
}

impl std::fmt::Debug for CacheCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheCredentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "******"))
            .finish()
    }
}

/// Builds cache clients
#[async_trait]
pub trait CacheConnector: Send + Sync {
    async fn connect(
        &self,
        topology: &CacheTopology,
        credentials: &CacheCredentials,
    ) -> Result<Box<dyn CacheSession>, BoxError>;
}

/// A constructed cache client
#[async_trait]
pub trait CacheSession: Send + Sync {
    async fn ping(&self) -> Result<(), BoxError>;

    async fn close(self: Box<Self>);
}

/// Connector backed by the `redis` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisDriver;

fn redis_url(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("redis://{}", address)
    }
}

#[async_trait]
impl CacheConnector for RedisDriver {
    async fn connect(
        &self,
        topology: &CacheTopology,
        credentials: &CacheCredentials,
    ) -> Result<Box<dyn CacheSession>, BoxError> {
        let handle = match topology {
            CacheTopology::Single(address) => {
                let mut info = redis_url(address).into_connection_info()?;
                info.redis.username = credentials.username.clone();
                info.redis.password = credentials.password.clone();
                RedisHandle::Single(Client::open(info)?)
            }
            CacheTopology::Cluster(addresses) => {
                let mut builder =
                    ClusterClientBuilder::new(addresses.iter().map(|a| redis_url(a)));
                if let Some(username) = &credentials.username {
                    builder = builder.username(username.clone());
                }
                if let Some(password) = &credentials.password {
                    builder = builder.password(password.clone());
                }
                RedisHandle::Cluster(builder.build()?)
            }
        };

        Ok(Box::new(RedisSession { handle }))
    }
}

enum RedisHandle {
    Single(Client),
    Cluster(ClusterClient),
}

struct RedisSession {
    handle: RedisHandle,
}

#[async_trait]
impl CacheSession for RedisSession {
    async fn ping(&self) -> Result<(), BoxError> {
        match &self.handle {
            RedisHandle::Single(client) => {
                let mut conn = client.get_multiplexed_tokio_connection().await?;
                redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
            }
            RedisHandle::Cluster(client) => {
                let mut conn = client.get_async_connection().await?;
                redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
            }
        }
        Ok(())
    }

    async fn close(self: Box<Self>) {
        // Connections opened by ping are released with the client
        drop(self.handle);
    }
}

/// Pings a single node or a cluster, depending on the address list
pub struct RedisChecker {
    config: RedisConfig,
    timeout: Duration,
    env: Arc<dyn Environment>,
    connector: Arc<dyn CacheConnector>,
}

impl RedisChecker {
    pub fn new(config: RedisConfig, timeout: Duration) -> Self {
        Self {
            config,
            timeout,
            env: Arc::new(ProcessEnv),
            connector: Arc::new(RedisDriver),
        }
    }

    pub fn with_environment(mut self, env: Arc<dyn Environment>) -> Self {
        self.env = env;
        self
    }

    pub fn with_connector(mut self, connector: Arc<dyn CacheConnector>) -> Self {
        self.connector = connector;
        self
    }
}

#[async_trait]
impl Checker for RedisChecker {
    fn kind(&self) -> BackendKind {
        BackendKind::Redis
    }

    async fn check(&self) -> CheckResult<CheckOutcome> {
        let env = self.env.as_ref();
        let address = env::resolve_list(env, env::REDIS_ADDRESS, &self.config.address);
        let username = env::resolve_with(env, env::REDIS_USERNAME, &self.config.username);
        let password = env::resolve_with(env, env::REDIS_PASSWORD, &self.config.password);

        let topology = CacheTopology::from_address(&address);
        let context = addr_context(&topology.addresses().join(","));
        let credentials = CacheCredentials::new(&username, &password);

        let session = match timeout(self.timeout, self.connector.connect(&topology, &credentials)).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => return Err(CheckError::connectivity(e, context)),
            Err(_) => return Err(CheckError::timeout("redis connect", context)),
        };

        let pinged = timeout(self.timeout, session.ping()).await;
        session.close().await;

        match pinged {
            Ok(Ok(())) => Ok(CheckOutcome::Verified(context)),
            Ok(Err(e)) => Err(CheckError::connectivity(e, context)),
            Err(_) => Err(CheckError::timeout("redis ping", context)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topology_selection() {
        assert_eq!(
            CacheTopology::from_address("a:6379,b:6379"),
            CacheTopology::Cluster(vec!["a:6379".to_string(), "b:6379".to_string()])
        );
        assert_eq!(
            CacheTopology::from_address("a:6379"),
            CacheTopology::Single("a:6379".to_string())
        );
    }

    #[test]
    fn test_empty_credentials_are_omitted() {
        let credentials = CacheCredentials::new("", "pw");
        assert!(credentials.username.is_none());
        assert_eq!(credentials.password.as_deref(), Some("pw"));
        assert!(!format!("{:?}", credentials).contains("pw"));
    }

    #[test]
    fn test_redis_url() {
        assert_eq!(redis_url("a:6379"), "redis://a:6379");
        assert_eq!(redis_url("rediss://a:6380"), "rediss://a:6380");
    }

    #[tokio::test]
    async fn test_driver_builds_single_client_without_network() {
        let session = RedisDriver
            .connect(
                &CacheTopology::Single("127.0.0.1:6379".into()),
                &CacheCredentials::new("user", "pw"),
            )
            .await;
        assert!(session.is_ok());
    }

    #[tokio::test]
    async fn test_driver_rejects_bad_address() {
        let session = RedisDriver
            .connect(
                &CacheTopology::Single("not a host:port:x".into()),
                &CacheCredentials::default(),
            )
            .await;
        assert!(session.is_err());
    }
}
