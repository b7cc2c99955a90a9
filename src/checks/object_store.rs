//! Object storage (MinIO) readiness check
//!
//! Configuration problems (missing credentials, loopback public URLs) and
//! connectivity problems (unreachable or offline store) are reported
//! separately; a store can be reachable and still be misconfigured.

use crate::checks::{addr_context, BackendKind, BoxError, CheckError, CheckOutcome, CheckResult, Checker};
use crate::config::{ObjectConfig, ObjectStorageKind};
use crate::env::{self, Environment, ProcessEnv};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use url::{Host, Url};

const HEALTH_LIVE_PATH: &str = "/minio/health/live";
const REDACTED: &str = "******";

/// Parsed object store endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStoreEndpoint {
    /// `host` or `host:port`
    pub host: String,
    pub secure: bool,
}

impl ObjectStoreEndpoint {
    /// Secure when the scheme is https or the SSL flag is "true"
    pub fn parse(endpoint: &str, use_ssl: &str) -> CheckResult<Self> {
        let url = Url::parse(endpoint).map_err(|e| {
            CheckError::Configuration(format!("the endpoint is:{}: {}", endpoint, e))
        })?;
        let host = url.host_str().filter(|h| !h.is_empty()).ok_or_else(|| {
            CheckError::Configuration(format!("the endpoint is:{}: missing host", endpoint))
        })?;

        let host = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        Ok(Self {
            host,
            secure: url.scheme() == "https" || use_ssl == "true",
        })
    }

    pub fn base_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}", scheme, self.host)
    }
}

/// Static access/secret key pair
#[derive(Clone)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &REDACTED)
            .field("secret_access_key", &REDACTED)
            .finish()
    }
}

/// Builds object store clients
pub trait ObjectStoreConnector: Send + Sync {
    fn connect(
        &self,
        endpoint: &ObjectStoreEndpoint,
        credentials: &StaticCredentials,
    ) -> Result<Box<dyn ObjectStoreSession>, BoxError>;
}

/// A constructed object store client
#[async_trait]
pub trait ObjectStoreSession: Send + Sync {
    /// Probe the store once; errors only when the probe cannot be issued
    async fn health_check(&self, timeout: Duration) -> Result<(), BoxError>;

    /// Whether the last probe found the store offline
    fn is_offline(&self) -> bool;

    async fn close(self: Box<Self>);
}

/// Connector speaking the MinIO health API over HTTP
#[derive(Debug, Clone, Copy, Default)]
pub struct MinioHttp;

impl ObjectStoreConnector for MinioHttp {
    fn connect(
        &self,
        endpoint: &ObjectStoreEndpoint,
        _credentials: &StaticCredentials,
    ) -> Result<Box<dyn ObjectStoreSession>, BoxError> {
        // The liveness endpoint is unauthenticated
        let client = reqwest::Client::builder()
            .https_only(endpoint.secure)
            .build()?;

        Ok(Box::new(MinioHttpSession {
            client,
            base_url: endpoint.base_url(),
            offline: AtomicBool::new(false),
        }))
    }
}

struct MinioHttpSession {
    client: reqwest::Client,
    base_url: String,
    offline: AtomicBool,
}

#[async_trait]
impl ObjectStoreSession for MinioHttpSession {
    async fn health_check(&self, timeout: Duration) -> Result<(), BoxError> {
        let url = Url::parse(&self.base_url)?.join(HEALTH_LIVE_PATH)?;

        let online = match self.client.get(url).timeout(timeout).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(status = %response.status(), "minio health probe returned an error status");
                false
            }
            Err(e) => {
                warn!(error = %e, "minio health probe failed");
                false
            }
        };

        self.offline.store(!online, Ordering::SeqCst);
        Ok(())
    }

    fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    async fn close(self: Box<Self>) {}
}

/// True when the URL's host is a loopback address or `localhost`
pub fn points_to_loopback(raw: &str) -> bool {
    let Ok(url) = Url::parse(raw) else {
        return false;
    };
    match url.host() {
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        None => false,
    }
}

fn redact(secret: &str, reveal: bool) -> &str {
    if reveal {
        secret
    } else {
        REDACTED
    }
}

/// Verifies reachability, health, and public URL configuration of MinIO
pub struct MinioChecker {
    config: ObjectConfig,
    probe_timeout: Duration,
    show_secrets: bool,
    env: Arc<dyn Environment>,
    connector: Arc<dyn ObjectStoreConnector>,
}

impl MinioChecker {
    pub fn new(config: ObjectConfig, probe_timeout: Duration) -> Self {
        Self {
            config,
            probe_timeout,
            show_secrets: false,
            env: Arc::new(ProcessEnv),
            connector: Arc::new(MinioHttp),
        }
    }

    /// Include credentials verbatim in error diagnostics
    pub fn with_show_secrets(mut self, show_secrets: bool) -> Self {
        self.show_secrets = show_secrets;
        self
    }

    pub fn with_environment(mut self, env: Arc<dyn Environment>) -> Self {
        self.env = env;
        self
    }

    pub fn with_connector(mut self, connector: Arc<dyn ObjectStoreConnector>) -> Self {
        self.connector = connector;
        self
    }

    async fn probe(&self, session: &dyn ObjectStoreSession, context: &str) -> CheckResult<()> {
        session
            .health_check(self.probe_timeout)
            .await
            .map_err(|e| CheckError::connectivity(e, context))?;

        if session.is_offline() {
            return Err(CheckError::ComponentStart(format!(
                "Minio server is offline;{}",
                context
            )));
        }
        Ok(())
    }

    fn check_public_urls(&self) -> CheckResult<()> {
        let public_urls = [
            ("apiURL", &self.config.api_url),
            ("Minio SignEndpoint", &self.config.minio.sign_endpoint),
        ];
        for (name, url) in public_urls {
            if points_to_loopback(url) {
                return Err(CheckError::Configuration(format!(
                    "{} {} points to a loopback address",
                    name, url
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Checker for MinioChecker {
    fn kind(&self) -> BackendKind {
        BackendKind::ObjectStore
    }

    async fn check(&self) -> CheckResult<CheckOutcome> {
        if self.config.enable != ObjectStorageKind::Minio {
            return Ok(CheckOutcome::Skipped(format!(
                "object storage is {:?}",
                self.config.enable.as_str()
            )));
        }

        let env = self.env.as_ref();
        let minio = &self.config.minio;
        let endpoint = env::resolve_with(env, env::MINIO_ENDPOINT, &minio.endpoint);
        let access_key_id = env::resolve_with(env, env::MINIO_ACCESS_KEY_ID, &minio.access_key_id);
        let secret_access_key =
            env::resolve_with(env, env::MINIO_SECRET_ACCESS_KEY, &minio.secret_access_key);
        let use_ssl = env::resolve_with(env, env::MINIO_USE_SSL, &minio.use_ssl.to_string());

        if endpoint.is_empty() || access_key_id.is_empty() || secret_access_key.is_empty() {
            return Err(CheckError::Configuration(
                "MinIO configuration missing".to_string(),
            ));
        }

        let endpoint = ObjectStoreEndpoint::parse(&endpoint, &use_ssl)?;
        let context = addr_context(&endpoint.host);
        let credentials = StaticCredentials {
            access_key_id,
            secret_access_key,
        };

        let session = self
            .connector
            .connect(&endpoint, &credentials)
            .map_err(|e| {
                let diagnostics = format!(
                    "host:{},accessKeyID:{},secretAccessKey:{},Secure:{}",
                    endpoint.host,
                    redact(&credentials.access_key_id, self.show_secrets),
                    redact(&credentials.secret_access_key, self.show_secrets),
                    endpoint.secure
                );
                CheckError::connectivity(e, diagnostics)
            })?;

        let probed = self.probe(session.as_ref(), &context).await;
        session.close().await;
        probed?;

        self.check_public_urls()?;

        Ok(CheckOutcome::Verified(context))
    }
}
