use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt, stream};

use crate::client_config::{AdminConfig, BOOTSTRAP_SERVERS, ConfigValue};
use crate::error::TransportError;
use crate::request::{AdminRequest, ReplicaPlacement, RequestKind, TopicSpecification};
use crate::result::{FailureReason, ItemResponse};
use crate::transport::{AdminTransport, ResponseStream};

/// Resolve a config pointing at a local broker.
pub fn local_config() -> AdminConfig {
    let raw = [(
        BOOTSTRAP_SERVERS.to_owned(),
        ConfigValue::from("localhost:9092"),
    )]
    .into_iter()
    .collect();
    AdminConfig::resolve(&raw).unwrap()
}

#[derive(Default)]
struct FakeCluster {
    brokers: i32,
    topics: HashSet<String>,
    latency: HashMap<String, Duration>,
    default_latency: Duration,
    omitted: HashSet<String>,
    failure: Option<String>,
}

/// In-memory cluster. Each topic of a request is answered after its own
/// latency, so responses come back in latency order rather than request order.
pub struct FakeTransport {
    cluster: Arc<Mutex<FakeCluster>>,
    sent: Arc<AtomicUsize>,
    shutdowns: AtomicUsize,
    operation_timeouts: Mutex<Vec<Option<Duration>>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            cluster: Arc::new(Mutex::new(FakeCluster {
                brokers: 1,
                ..Default::default()
            })),
            sent: Arc::new(AtomicUsize::new(0)),
            shutdowns: AtomicUsize::new(0),
            operation_timeouts: Mutex::new(vec![]),
        }
    }

    pub fn with_brokers(self, brokers: i32) -> Self {
        self.cluster.lock().unwrap().brokers = brokers;
        self
    }

    pub fn with_topic(self, name: &str) -> Self {
        self.cluster.lock().unwrap().topics.insert(name.to_owned());
        self
    }

    pub fn with_latency(self, name: &str, latency: Duration) -> Self {
        self.cluster
            .lock()
            .unwrap()
            .latency
            .insert(name.to_owned(), latency);
        self
    }

    pub fn with_default_latency(self, latency: Duration) -> Self {
        self.cluster.lock().unwrap().default_latency = latency;
        self
    }

    /// Never answer for `name`; the response stream ends without it.
    pub fn omitting(self, name: &str) -> Self {
        self.cluster.lock().unwrap().omitted.insert(name.to_owned());
        self
    }

    /// Fail every request at the transport level.
    pub fn failing(self, message: &str) -> Self {
        self.cluster.lock().unwrap().failure = Some(message.to_owned());
        self
    }

    /// Number of requests actually put on the wire.
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    /// Operation timeout of every request handed to `send`, in call order.
    pub fn operation_timeouts(&self) -> Vec<Option<Duration>> {
        self.operation_timeouts.lock().unwrap().clone()
    }

    pub fn has_topic(&self, name: &str) -> bool {
        self.cluster.lock().unwrap().topics.contains(name)
    }
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCluster {
    fn apply(
        &mut self,
        request: &AdminRequest,
    ) -> Result<Vec<(ItemResponse, Duration)>, TransportError> {
        if let Some(message) = &self.failure {
            return Err(TransportError::Other(message.clone()));
        }

        let responses = match &request.kind {
            RequestKind::CreateTopics(specs) => specs
                .iter()
                .map(|spec| self.create(spec, request.validate_only))
                .collect::<Vec<_>>(),
            RequestKind::DeleteTopics(names) => names
                .iter()
                .map(|name| self.delete(name, request.validate_only))
                .collect(),
        };

        Ok(responses
            .into_iter()
            .filter(|response| !self.omitted.contains(&response.name))
            .map(|response| {
                let latency = self
                    .latency
                    .get(&response.name)
                    .copied()
                    .unwrap_or(self.default_latency);
                (response, latency)
            })
            .collect())
    }

    fn create(&mut self, spec: &TopicSpecification, validate_only: bool) -> ItemResponse {
        if self.topics.contains(&spec.name) {
            return ItemResponse::failure(&spec.name, FailureReason::TopicAlreadyExists);
        }
        let replicas = match &spec.replication {
            ReplicaPlacement::Factor(factor) => *factor,
            ReplicaPlacement::Assignment(rows) => rows.iter().map(|r| r.len() as i32).max().unwrap_or(0),
        };
        if replicas > self.brokers {
            return ItemResponse::failure(&spec.name, FailureReason::InvalidReplicationFactor);
        }
        if !validate_only {
            self.topics.insert(spec.name.clone());
        }
        ItemResponse::success(&spec.name)
    }

    fn delete(&mut self, name: &str, validate_only: bool) -> ItemResponse {
        if !self.topics.contains(name) {
            return ItemResponse::failure(name, FailureReason::UnknownTopic);
        }
        if !validate_only {
            self.topics.remove(name);
        }
        ItemResponse::success(name)
    }
}

impl AdminTransport for FakeTransport {
    async fn connect(_config: &AdminConfig) -> Result<Self, TransportError> {
        Ok(Self::new())
    }

    fn send(&self, request: AdminRequest) -> ResponseStream {
        self.operation_timeouts
            .lock()
            .unwrap()
            .push(request.operation_timeout);
        let cluster = self.cluster.clone();
        let sent = self.sent.clone();
        stream::once(async move {
            sent.fetch_add(1, Ordering::SeqCst);
            cluster.lock().unwrap().apply(&request)
        })
        .flat_map(|applied| match applied {
            Ok(responses) => responses
                .into_iter()
                .map(|(response, latency)| -> BoxFuture<'static, Result<ItemResponse, TransportError>> {
                    async move {
                        tokio::time::sleep(latency).await;
                        Ok(response)
                    }
                    .boxed()
                })
                .collect::<FuturesUnordered<_>>()
                .left_stream(),
            Err(e) => stream::iter([Err(e)]).right_stream(),
        })
        .boxed()
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}
