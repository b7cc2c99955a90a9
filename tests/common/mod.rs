//! Fake backends for exercising checkers without real services
//!
//! Every fake records how many sessions it opened and how many of them were
//! closed, so tests can assert that each path releases its connection once.

#![allow(dead_code)]

use async_trait::async_trait;
use component_check::checks::broker::{BrokerConnector, BrokerSession, SaslCredentials};
use component_check::checks::cache::{CacheConnector, CacheCredentials, CacheSession, CacheTopology};
use component_check::checks::coordination::{
    CoordinationConnector, CoordinationSession, SessionEvent, SessionEvents,
};
use component_check::checks::mongo::{MongoConnector, MongoSession};
use component_check::checks::object_store::{
    ObjectStoreConnector, ObjectStoreEndpoint, ObjectStoreSession, StaticCredentials,
};
use component_check::checks::BoxError;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Outcome a fake operation should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    Fail,
    Hang,
}

impl Behavior {
    async fn run(self, what: &str) -> Result<(), BoxError> {
        match self {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => Err(Box::new(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("{} refused", what),
            ))),
            Behavior::Hang => futures::future::pending().await,
        }
    }
}

/// Counts opened and closed sessions
#[derive(Debug, Default)]
pub struct Lifecycle {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl Lifecycle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn open(&self) {
        self.opened.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&self) {
        let previous = self.closed.fetch_add(1, Ordering::SeqCst);
        assert!(previous < self.opened.load(Ordering::SeqCst), "session closed twice");
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn assert_closed_once(&self) {
        assert_eq!(self.opened(), 1, "expected exactly one session to be opened");
        assert_eq!(self.closed(), 1, "expected the session to be closed exactly once");
    }

    pub fn assert_never_opened(&self) {
        assert_eq!(self.opened(), 0);
        assert_eq!(self.closed(), 0);
    }
}

pub fn env(pairs: &[(&str, &str)]) -> Arc<HashMap<String, String>> {
    Arc::new(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Document store

pub struct FakeMongo {
    pub lifecycle: Arc<Lifecycle>,
    pub connect: Behavior,
    pub ping: Behavior,
    pub uris: Mutex<Vec<String>>,
}

impl FakeMongo {
    pub fn new(connect: Behavior, ping: Behavior) -> Arc<Self> {
        Arc::new(Self {
            lifecycle: Lifecycle::new(),
            connect,
            ping,
            uris: Mutex::new(Vec::new()),
        })
    }
}

struct FakeMongoSession {
    lifecycle: Arc<Lifecycle>,
    ping: Behavior,
}

#[async_trait]
impl MongoConnector for FakeMongo {
    async fn connect(&self, uri: &str) -> Result<Box<dyn MongoSession>, BoxError> {
        self.uris.lock().unwrap().push(uri.to_string());
        self.connect.run("mongo connect").await?;
        self.lifecycle.open();
        Ok(Box::new(FakeMongoSession {
            lifecycle: self.lifecycle.clone(),
            ping: self.ping,
        }))
    }
}

#[async_trait]
impl MongoSession for FakeMongoSession {
    async fn ping(&self) -> Result<(), BoxError> {
        self.ping.run("mongo ping").await
    }

    async fn close(self: Box<Self>) {
        self.lifecycle.close();
    }
}

// ---------------------------------------------------------------------------
// Cache

pub struct FakeCache {
    pub lifecycle: Arc<Lifecycle>,
    pub connect: Behavior,
    pub ping: Behavior,
    pub topologies: Mutex<Vec<CacheTopology>>,
    pub credentials: Mutex<Vec<CacheCredentials>>,
}

impl FakeCache {
    pub fn new(connect: Behavior, ping: Behavior) -> Arc<Self> {
        Arc::new(Self {
            lifecycle: Lifecycle::new(),
            connect,
            ping,
            topologies: Mutex::new(Vec::new()),
            credentials: Mutex::new(Vec::new()),
        })
    }

    pub fn last_topology(&self) -> Option<CacheTopology> {
        self.topologies.lock().unwrap().last().cloned()
    }
}

struct FakeCacheSession {
    lifecycle: Arc<Lifecycle>,
    ping: Behavior,
}

#[async_trait]
impl CacheConnector for FakeCache {
    async fn connect(
        &self,
        topology: &CacheTopology,
        credentials: &CacheCredentials,
    ) -> Result<Box<dyn CacheSession>, BoxError> {
        self.topologies.lock().unwrap().push(topology.clone());
        self.credentials.lock().unwrap().push(credentials.clone());
        self.connect.run("redis client").await?;
        self.lifecycle.open();
        Ok(Box::new(FakeCacheSession {
            lifecycle: self.lifecycle.clone(),
            ping: self.ping,
        }))
    }
}

#[async_trait]
impl CacheSession for FakeCacheSession {
    async fn ping(&self) -> Result<(), BoxError> {
        self.ping.run("redis ping").await
    }

    async fn close(self: Box<Self>) {
        self.lifecycle.close();
    }
}

// ---------------------------------------------------------------------------
// Coordination service

pub struct FakeZookeeper {
    pub lifecycle: Arc<Lifecycle>,
    pub connect: Behavior,
    /// Events delivered right after connecting
    pub events: Vec<SessionEvent>,
    /// Keep the event stream open after the scripted events
    pub hold_stream: bool,
    pub auth: Behavior,
    pub addresses: Mutex<Vec<Vec<String>>>,
    pub auth_calls: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    senders: Mutex<Vec<mpsc::UnboundedSender<SessionEvent>>>,
}

impl FakeZookeeper {
    pub fn new(events: Vec<SessionEvent>, hold_stream: bool) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            connect: Behavior::Succeed,
            events,
            hold_stream,
            auth: Behavior::Succeed,
            addresses: Mutex::new(Vec::new()),
            auth_calls: Arc::new(Mutex::new(Vec::new())),
            senders: Mutex::new(Vec::new()),
        }
    }

    pub fn connected() -> Self {
        Self::new(vec![SessionEvent::Connected], true)
    }

    /// Never reports a state change, so the connect deadline fires
    pub fn silent() -> Self {
        Self::new(Vec::new(), true)
    }

    pub fn with_connect(mut self, connect: Behavior) -> Self {
        self.connect = connect;
        self
    }

    pub fn with_auth(mut self, auth: Behavior) -> Self {
        self.auth = auth;
        self
    }

    pub fn auth_calls(&self) -> Vec<(String, Vec<u8>)> {
        self.auth_calls.lock().unwrap().clone()
    }

    pub fn last_addresses(&self) -> Option<Vec<String>> {
        self.addresses.lock().unwrap().last().cloned()
    }
}

struct FakeZookeeperSession {
    lifecycle: Arc<Lifecycle>,
    auth: Behavior,
    auth_calls: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

#[async_trait]
impl CoordinationConnector for FakeZookeeper {
    async fn connect(
        &self,
        addresses: &[String],
        _session_timeout: Duration,
    ) -> Result<(Box<dyn CoordinationSession>, SessionEvents), BoxError> {
        self.addresses.lock().unwrap().push(addresses.to_vec());
        self.connect.run("zookeeper dial").await?;

        let (tx, rx) = mpsc::unbounded_channel();
        for event in &self.events {
            tx.send(*event).expect("receiver alive");
        }
        if self.hold_stream {
            self.senders.lock().unwrap().push(tx);
        }

        self.lifecycle.open();
        let session = FakeZookeeperSession {
            lifecycle: self.lifecycle.clone(),
            auth: self.auth,
            auth_calls: self.auth_calls.clone(),
        };
        Ok((Box::new(session), rx))
    }
}

#[async_trait]
impl CoordinationSession for FakeZookeeperSession {
    async fn add_auth(&self, scheme: &str, auth: Vec<u8>) -> Result<(), BoxError> {
        self.auth_calls
            .lock()
            .unwrap()
            .push((scheme.to_string(), auth));
        self.auth.run("zookeeper auth").await
    }

    async fn close(self: Box<Self>) {
        self.lifecycle.close();
    }
}

// ---------------------------------------------------------------------------
// Message broker

pub struct FakeBroker {
    pub lifecycle: Arc<Lifecycle>,
    pub connect: Behavior,
    pub listing: Behavior,
    pub topics: Vec<String>,
    pub addresses: Mutex<Vec<Vec<String>>>,
    pub sasl: Mutex<Vec<Option<SaslCredentials>>>,
}

impl FakeBroker {
    pub fn with_topics(topics: &[&str]) -> Arc<Self> {
        Self::build(Behavior::Succeed, Behavior::Succeed, topics)
    }

    pub fn build(connect: Behavior, listing: Behavior, topics: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            lifecycle: Lifecycle::new(),
            connect,
            listing,
            topics: strings(topics),
            addresses: Mutex::new(Vec::new()),
            sasl: Mutex::new(Vec::new()),
        })
    }

    pub fn last_sasl(&self) -> Option<Option<SaslCredentials>> {
        self.sasl.lock().unwrap().last().cloned()
    }
}

struct FakeBrokerSession {
    lifecycle: Arc<Lifecycle>,
    listing: Behavior,
    topics: Vec<String>,
}

#[async_trait]
impl BrokerConnector for FakeBroker {
    async fn connect(
        &self,
        addresses: &[String],
        sasl: Option<&SaslCredentials>,
    ) -> Result<Box<dyn BrokerSession>, BoxError> {
        self.addresses.lock().unwrap().push(addresses.to_vec());
        self.sasl.lock().unwrap().push(sasl.cloned());
        self.connect.run("kafka client").await?;
        self.lifecycle.open();
        Ok(Box::new(FakeBrokerSession {
            lifecycle: self.lifecycle.clone(),
            listing: self.listing,
            topics: self.topics.clone(),
        }))
    }
}

#[async_trait]
impl BrokerSession for FakeBrokerSession {
    async fn topics(&self) -> Result<Vec<String>, BoxError> {
        self.listing.run("kafka metadata").await?;
        Ok(self.topics.clone())
    }

    async fn close(self: Box<Self>) {
        self.lifecycle.close();
    }
}

// ---------------------------------------------------------------------------
// Object store

pub struct FakeObjectStore {
    pub lifecycle: Arc<Lifecycle>,
    pub connect_fails: bool,
    pub probe: Behavior,
    pub offline: bool,
    pub endpoints: Mutex<Vec<ObjectStoreEndpoint>>,
}

impl FakeObjectStore {
    pub fn online() -> Arc<Self> {
        Self::build(false, Behavior::Succeed, false)
    }

    pub fn offline() -> Arc<Self> {
        Self::build(false, Behavior::Succeed, true)
    }

    pub fn build(connect_fails: bool, probe: Behavior, offline: bool) -> Arc<Self> {
        Arc::new(Self {
            lifecycle: Lifecycle::new(),
            connect_fails,
            probe,
            offline,
            endpoints: Mutex::new(Vec::new()),
        })
    }

    pub fn last_endpoint(&self) -> Option<ObjectStoreEndpoint> {
        self.endpoints.lock().unwrap().last().cloned()
    }
}

struct FakeObjectStoreSession {
    lifecycle: Arc<Lifecycle>,
    probe: Behavior,
    offline: bool,
}

impl ObjectStoreConnector for FakeObjectStore {
    fn connect(
        &self,
        endpoint: &ObjectStoreEndpoint,
        _credentials: &StaticCredentials,
    ) -> Result<Box<dyn ObjectStoreSession>, BoxError> {
        self.endpoints.lock().unwrap().push(endpoint.clone());
        if self.connect_fails {
            return Err("invalid endpoint".into());
        }
        self.lifecycle.open();
        Ok(Box::new(FakeObjectStoreSession {
            lifecycle: self.lifecycle.clone(),
            probe: self.probe,
            offline: self.offline,
        }))
    }
}

#[async_trait]
impl ObjectStoreSession for FakeObjectStoreSession {
    async fn health_check(&self, _timeout: Duration) -> Result<(), BoxError> {
        self.probe.run("minio health").await
    }

    fn is_offline(&self) -> bool {
        self.offline
    }

    async fn close(self: Box<Self>) {
        self.lifecycle.close();
    }
}
