//! Coordination service (ZooKeeper) readiness check
//!
//! Connecting to ZooKeeper is asynchronous: the client hands back a handle
//! right away and reports the session state later to its state listeners.
//! The check therefore races the event stream against a deadline:
//!
//! ```text
//! Connecting ──► Connected ──► (credentials?) ──► AuthOk | AuthFailed
//!     │
//!     ├────────► TimedOut
//!     └────────► ConnectFailed
//! ```

use crate::checks::{addr_context, BackendKind, BoxError, CheckError, CheckOutcome, CheckResult, Checker};
use crate::config::ZookeeperConfig;
use crate::env::{self, Environment, ProcessEnv};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use zookeeper::{WatchedEvent, Watcher, ZkError, ZkState, ZooKeeper};

/// Session state notifications delivered by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    Disconnected,
    AuthFailed,
    Expired,
}

impl SessionEvent {
    fn from_zk_state(state: ZkState) -> Option<Self> {
        match state {
            ZkState::Connected | ZkState::ConnectedReadOnly => Some(SessionEvent::Connected),
            ZkState::AuthFailed => Some(SessionEvent::AuthFailed),
            ZkState::Closed => Some(SessionEvent::Expired),
            _ => None,
        }
    }
}

/// Receiving half of a session's event stream
pub type SessionEvents = mpsc::UnboundedReceiver<SessionEvent>;

/// Starts coordination service sessions
#[async_trait]
pub trait CoordinationConnector: Send + Sync {
    /// Begin connecting; fails only when the attempt cannot even start
    async fn connect(
        &self,
        addresses: &[String],
        session_timeout: Duration,
    ) -> Result<(Box<dyn CoordinationSession>, SessionEvents), BoxError>;
}

/// A coordination service session handle
#[async_trait]
pub trait CoordinationSession: Send + Sync {
    async fn add_auth(&self, scheme: &str, auth: Vec<u8>) -> Result<(), BoxError>;

    async fn close(self: Box<Self>);
}

/// Connector backed by the `zookeeper` crate
#[derive(Debug, Clone, Copy)]
pub struct ZookeeperDriver {
    close_timeout: Duration,
}

impl ZookeeperDriver {
    /// `close_timeout` bounds the wait for the session to shut down
    pub fn new(close_timeout: Duration) -> Self {
        Self { close_timeout }
    }
}

// The default watcher only sees node watches; session state arrives through
// the listener registered in `connect`.
struct NodeEventLogger;

impl Watcher for NodeEventLogger {
    fn handle(&self, event: WatchedEvent) {
        debug!(path = ?event.path, state = ?event.keeper_state, "zookeeper watch event");
    }
}

#[async_trait]
impl CoordinationConnector for ZookeeperDriver {
    async fn connect(
        &self,
        addresses: &[String],
        session_timeout: Duration,
    ) -> Result<(Box<dyn CoordinationSession>, SessionEvents), BoxError> {
        let connect_string = addresses.join(",");
        let (tx, rx) = mpsc::unbounded_channel();

        // Listener goes on right after connect so the first state change is seen
        let zk = tokio::task::spawn_blocking(move || {
            let zk = ZooKeeper::connect(&connect_string, session_timeout, NodeEventLogger)?;
            zk.add_listener(move |state: ZkState| {
                if let Some(event) = SessionEvent::from_zk_state(state) {
                    // Receiver gone means the check already finished
                    let _ = tx.send(event);
                }
            });
            Ok::<_, ZkError>(zk)
        })
        .await??;

        Ok((
            Box::new(ZookeeperSession {
                zk: Arc::new(zk),
                close_timeout: self.close_timeout,
            }),
            rx,
        ))
    }
}

struct ZookeeperSession {
    zk: Arc<ZooKeeper>,
    close_timeout: Duration,
}

#[async_trait]
impl CoordinationSession for ZookeeperSession {
    async fn add_auth(&self, scheme: &str, auth: Vec<u8>) -> Result<(), BoxError> {
        let zk = Arc::clone(&self.zk);
        let scheme = scheme.to_string();
        tokio::task::spawn_blocking(move || zk.add_auth(scheme, auth)).await??;
        Ok(())
    }

    async fn close(self: Box<Self>) {
        let ZookeeperSession { zk, close_timeout } = *self;

        // Dropping the last handle sends CloseSession; an explicit close()
        // before it would send a second one.
        let closing = tokio::task::spawn_blocking(move || drop(zk));
        match timeout(close_timeout, closing).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "zookeeper close task failed"),
            Err(_) => warn!(?close_timeout, "zookeeper session did not close in time"),
        }
    }
}

/// Block until the stream reports a connected session
async fn wait_for_connected(events: &mut SessionEvents) -> Result<(), BoxError> {
    while let Some(event) = events.recv().await {
        if event == SessionEvent::Connected {
            return Ok(());
        }
        debug!(?event, "zookeeper session event while connecting");
    }
    Err("session event stream closed before connecting".into())
}

/// Waits for a connected session, then optionally authenticates
pub struct ZookeeperChecker {
    config: ZookeeperConfig,
    connect_timeout: Duration,
    env: Arc<dyn Environment>,
    connector: Arc<dyn CoordinationConnector>,
}

impl ZookeeperChecker {
    pub fn new(config: ZookeeperConfig, connect_timeout: Duration) -> Self {
        Self {
            config,
            connect_timeout,
            env: Arc::new(ProcessEnv),
            connector: Arc::new(ZookeeperDriver::new(connect_timeout)),
        }
    }

    pub fn with_environment(mut self, env: Arc<dyn Environment>) -> Self {
        self.env = env;
        self
    }

    pub fn with_connector(mut self, connector: Arc<dyn CoordinationConnector>) -> Self {
        self.connector = connector;
        self
    }

    async fn establish(
        &self,
        session: &dyn CoordinationSession,
        events: &mut SessionEvents,
        credentials: Option<(String, String, String)>,
        context: &str,
    ) -> CheckResult<()> {
        match timeout(self.connect_timeout, wait_for_connected(events)).await {
            Ok(Ok(())) => info!("Connected to Zookeeper"),
            Ok(Err(e)) => return Err(CheckError::connectivity(e, context)),
            Err(_) => {
                // Timeouts report the addresses from the config file, not overrides
                return Err(CheckError::timeout(
                    "Zookeeper connection",
                    format!("Zookeeper Addr: {}", self.config.address.join(" ")),
                ));
            }
        }

        if let Some((scheme, username, password)) = credentials {
            let auth = format!("{}:{}", username, password).into_bytes();
            session
                .add_auth(&scheme, auth)
                .await
                .map_err(|source| CheckError::Authentication {
                    context: context.to_string(),
                    source,
                })?;
        }

        Ok(())
    }
}

#[async_trait]
impl Checker for ZookeeperChecker {
    fn kind(&self) -> BackendKind {
        BackendKind::Zookeeper
    }

    async fn check(&self) -> CheckResult<CheckOutcome> {
        let env = self.env.as_ref();
        let scheme = env::resolve_with(env, env::ZOOKEEPER_SCHEMA, &self.config.schema);
        let address = env::resolve_list(env, env::ZOOKEEPER_ADDRESS, &self.config.address);
        let username = env::resolve_with(env, env::ZOOKEEPER_USERNAME, &self.config.username);
        let password = env::resolve_with(env, env::ZOOKEEPER_PASSWORD, &self.config.password);

        let addresses = env::split_addresses(&address);
        let context = addr_context(&address);
        let session_timeout = Duration::from_millis(self.config.session_timeout_ms);

        let (session, mut events) = self
            .connector
            .connect(&addresses, session_timeout)
            .await
            .map_err(|e| CheckError::connectivity(e, context.clone()))?;

        let credentials = (!username.is_empty() && !password.is_empty())
            .then(|| (scheme, username, password));

        let established = self
            .establish(session.as_ref(), &mut events, credentials, &context)
            .await;
        session.close().await;

        established.map(|()| CheckOutcome::Verified(context))
    }
}
