use std::collections::BTreeMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::client_config::{AdminConfig, ConfigValue};
use crate::dispatcher;
use crate::error::AdminError;
use crate::lifecycle::{Lifecycle, SessionState};
use crate::request::{
    AdminRequest, OperationOptions, TopicSpecification, build_create_topics, build_delete_topics,
};
use crate::result::ResultSequence;
use crate::transport::AdminTransport;

/// An administrative session against one cluster.
///
/// Cheap to clone; clones share the session, so one session can serve
/// concurrent calls from independent tasks without extra locking.
pub struct AdminClient<T: AdminTransport> {
    inner: Arc<Inner<T>>,
}

struct Inner<T: AdminTransport> {
    id: Uuid,
    config: AdminConfig,
    transport: Arc<T>,

    /// False when the transport was adopted from another client.
    owns_transport: bool,

    lifecycle: Lifecycle,

    /// Cancelled when the session starts closing.
    shutdown: CancellationToken,

    inflight: TaskTracker,
}

impl<T: AdminTransport> Clone for AdminClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: AdminTransport> std::fmt::Debug for AdminClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminClient")
            .field("id", &self.inner.id)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl<T: AdminTransport> AdminClient<T> {
    /// Resolve a raw option map and open a session with it.
    pub async fn connect(raw: &BTreeMap<String, ConfigValue>) -> Result<Self, AdminError> {
        let config = AdminConfig::resolve(raw)?;
        Self::open(config).await
    }

    /// Open a session with its own connection to the cluster.
    #[instrument(skip_all, fields(brokers = %config.bootstrap_servers().join(",")))]
    pub async fn open(config: AdminConfig) -> Result<Self, AdminError> {
        let transport = T::connect(&config).await.map_err(AdminError::Connect)?;
        Ok(Self::start(config, Arc::new(transport), true))
    }

    /// Open a session that closes itself once `parent` is cancelled.
    pub async fn open_with_context(
        config: AdminConfig,
        parent: &CancellationToken,
    ) -> Result<Self, AdminError> {
        let client = Self::open(config).await?;
        client.close_when_cancelled(parent.clone());
        Ok(client)
    }

    /// Layer a session onto a handle that is already connected, e.g. one shared
    /// with a producer. Closing the session leaves that handle open.
    pub fn from_existing(config: AdminConfig, transport: Arc<T>) -> Self {
        Self::start(config, transport, false)
    }

    fn start(config: AdminConfig, transport: Arc<T>, owns_transport: bool) -> Self {
        let inner = Inner {
            id: Uuid::new_v4(),
            config,
            transport,
            owns_transport,
            lifecycle: Lifecycle::new(),
            shutdown: CancellationToken::new(),
            inflight: TaskTracker::new(),
        };
        inner
            .lifecycle
            .transition(SessionState::Created, SessionState::Open);
        info!(
            "Opened admin session {} (owns connection: {})",
            inner.id, owns_transport
        );

        Self {
            inner: Arc::new(inner),
        }
    }

    fn close_when_cancelled(&self, parent: CancellationToken) {
        let session = Arc::downgrade(&self.inner);
        let shutdown = self.inner.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = parent.cancelled() => {
                    if let Some(inner) = session.upgrade() {
                        info!("Owning context cancelled, closing admin session {}", inner.id);
                        inner.close().await;
                    }
                }
                _ = shutdown.cancelled() => {}
            }
        });
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    pub fn state(&self) -> SessionState {
        self.inner.lifecycle.current()
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.inner.transport
    }

    /// Create every topic of `specs` in one round trip.
    pub async fn create_topics(
        &self,
        specs: Vec<TopicSpecification>,
        options: OperationOptions,
        cancel: &CancellationToken,
    ) -> Result<ResultSequence, AdminError> {
        let request = build_create_topics(specs, options)?;
        self.dispatch(request, cancel).await
    }

    pub async fn delete_topics(
        &self,
        names: Vec<String>,
        options: OperationOptions,
        cancel: &CancellationToken,
    ) -> Result<ResultSequence, AdminError> {
        let request = build_delete_topics(names, options)?;
        self.dispatch(request, cancel).await
    }

    /// Dispatch an already built request. Fails straight away once the session
    /// has started closing.
    #[instrument(skip_all, fields(session = %self.inner.id))]
    pub async fn dispatch(
        &self,
        mut request: AdminRequest,
        cancel: &CancellationToken,
    ) -> Result<ResultSequence, AdminError> {
        // Registered before the state check so that a concurrent close either
        // waits for this call or makes it fail here.
        let _inflight = self.inner.inflight.token();
        if !self.inner.lifecycle.current().accepts_requests() {
            return Err(AdminError::SessionClosed);
        }

        // The broker gets the same deadline as the client side wait.
        let timeout = *request
            .operation_timeout
            .get_or_insert(self.inner.config.operation_timeout());
        dispatcher::dispatch(
            self.inner.transport.as_ref(),
            request,
            timeout,
            cancel,
            &self.inner.shutdown,
        )
        .await
        .map_err(AdminError::Dispatch)
    }

    /// Close the session: cancel in-flight calls, wait for them to return and
    /// release the connection. Calling it again, from any clone, waits for the
    /// first close to finish and then returns.
    #[instrument(skip_all, fields(session = %self.inner.id))]
    pub async fn close(&self) {
        self.inner.close().await;
    }
}

impl<T: AdminTransport> Inner<T> {
    async fn close(&self) {
        if !self
            .lifecycle
            .transition(SessionState::Open, SessionState::Closing)
        {
            debug!("Admin session {} is already {}", self.id, self.lifecycle.current());
            self.lifecycle.reached(SessionState::Closed).await;
            return;
        }

        info!("Closing admin session {}", self.id);
        self.shutdown.cancel();
        self.inflight.close();
        self.inflight.wait().await;

        if self.owns_transport {
            self.transport.shutdown().await;
        }

        self.lifecycle
            .transition(SessionState::Closing, SessionState::Closed);
        info!("Admin session {} closed", self.id);
    }
}

impl<T: AdminTransport> Drop for Inner<T> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    use super::AdminClient;
    use crate::client_config::{AdminConfig, BOOTSTRAP_SERVERS, ConfigValue};
    use crate::error::AdminError;
    use crate::lifecycle::SessionState;
    use crate::request::{OperationOptions, TopicSpecification};
    use crate::result::{FailureReason, TopicResult};
    use crate::test_utils::{FakeTransport, local_config};

    fn session(transport: FakeTransport) -> AdminClient<FakeTransport> {
        AdminClient::from_existing(local_config(), Arc::new(transport))
    }

    #[tokio::test]
    async fn test_open_then_close() {
        let client: AdminClient<FakeTransport> = AdminClient::open(local_config()).await.unwrap();
        assert_eq!(client.state(), SessionState::Open);

        client.close().await;
        assert_eq!(client.state(), SessionState::Closed);
        assert_eq!(client.transport().sent(), 0);
        assert_eq!(client.transport().shutdowns(), 1);
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_config() {
        let raw = [("bootstrap.server".to_owned(), ConfigValue::from("localhost:9092"))]
            .into_iter()
            .collect();
        let err = AdminClient::<FakeTransport>::connect(&raw).await.err().unwrap();
        assert!(matches!(err, AdminError::Config(_)));

        let raw = [(BOOTSTRAP_SERVERS.to_owned(), ConfigValue::from("localhost:9092"))]
            .into_iter()
            .collect();
        let client = AdminClient::<FakeTransport>::connect(&raw).await.unwrap();
        assert_eq!(client.config().bootstrap_servers(), &vec!["localhost:9092".to_owned()]);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let client = session(FakeTransport::new());
        let other = client.clone();

        tokio::join!(client.close(), other.close());
        client.close().await;

        assert_eq!(client.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_adopted_transport_is_not_shut_down() {
        let transport = Arc::new(FakeTransport::new());
        let client = AdminClient::from_existing(local_config(), transport.clone());
        client.close().await;
        assert_eq!(transport.shutdowns(), 0);
    }

    #[tokio::test]
    async fn test_create_topic() {
        let client = session(FakeTransport::new());
        let results = client
            .create_topics(
                vec![TopicSpecification::new("orders", 3, 1)],
                OperationOptions::new().operation_timeout(Duration::from_secs(60)),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(results.into_inner(), vec![TopicResult::Success("orders".into())]);
        assert!(client.transport().has_topic("orders"));
    }

    #[tokio::test]
    async fn test_validate_only_leaves_cluster_untouched() {
        let client = session(FakeTransport::new());
        let results = client
            .create_topics(
                vec![TopicSpecification::new("orders", 3, 1)],
                OperationOptions::new().validate_only(true),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(results.all_succeeded());
        assert!(!client.transport().has_topic("orders"));
    }

    #[tokio::test]
    async fn test_replication_factor_checked_by_broker() {
        let client = session(FakeTransport::new().with_brokers(1));
        let results = client
            .create_topics(
                vec![TopicSpecification::new("orders", 3, 3)],
                OperationOptions::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            results[0].reason(),
            Some(&FailureReason::InvalidReplicationFactor)
        );
    }

    #[tokio::test]
    async fn test_invalid_spec_sends_nothing() {
        let client = session(FakeTransport::new());
        let err = client
            .create_topics(
                vec![
                    TopicSpecification::new("orders", 3, 1),
                    TopicSpecification::new("orders", 1, 1),
                ],
                OperationOptions::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AdminError::InvalidSpec(_)));
        assert_eq!(client.transport().sent(), 0);
    }

    #[tokio::test]
    async fn test_delete_topics() {
        let client = session(FakeTransport::new().with_topic("orders"));
        let results = client
            .delete_topics(
                vec!["orders".into(), "missing".into()],
                OperationOptions::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(results[0].is_success());
        assert_eq!(results[1].reason(), Some(&FailureReason::UnknownTopic));
        assert!(!client.transport().has_topic("orders"));
    }

    #[tokio::test]
    async fn test_dispatch_after_close_fails_fast() {
        let client = session(FakeTransport::new());
        client.close().await;

        let err = tokio::time::timeout(
            Duration::from_secs(1),
            client.create_topics(
                vec![TopicSpecification::new("orders", 3, 1)],
                OperationOptions::new(),
                &CancellationToken::new(),
            ),
        )
        .await
        .unwrap()
        .unwrap_err();

        assert!(matches!(err, AdminError::SessionClosed));
        assert_eq!(client.transport().sent(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_inflight_dispatch() {
        let client = session(FakeTransport::new().with_default_latency(Duration::from_secs(30)));

        let call = tokio::spawn({
            let client = client.clone();
            async move {
                client
                    .create_topics(
                        vec![TopicSpecification::new("orders", 3, 1)],
                        OperationOptions::new(),
                        &CancellationToken::new(),
                    )
                    .await
            }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        let start = Instant::now();
        client.close().await;
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(client.state(), SessionState::Closed);

        let results = call.await.unwrap().unwrap();
        assert_eq!(results[0].reason(), Some(&FailureReason::Canceled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_dispatches_are_independent() {
        let client = session(
            FakeTransport::new()
                .with_latency("a", Duration::from_secs(2))
                .with_latency("b", Duration::from_secs(1)),
        );

        let first = tokio::spawn({
            let client = client.clone();
            async move {
                client
                    .create_topics(
                        vec![TopicSpecification::new("a", 1, 1)],
                        OperationOptions::new(),
                        &CancellationToken::new(),
                    )
                    .await
            }
        });
        let cancelled = CancellationToken::new();
        cancelled.cancel();
        let second = client
            .create_topics(
                vec![TopicSpecification::new("b", 1, 1)],
                OperationOptions::new(),
                &cancelled,
            )
            .await
            .unwrap();

        assert_eq!(second[0].reason(), Some(&FailureReason::Canceled));
        assert!(first.await.unwrap().unwrap().all_succeeded());
        assert_eq!(client.transport().sent(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_owning_context_closes_session() {
        let parent = CancellationToken::new();
        let client: AdminClient<FakeTransport> =
            AdminClient::open_with_context(local_config(), &parent)
                .await
                .unwrap();

        parent.cancel();
        tokio::time::timeout(
            Duration::from_secs(1),
            client.inner.lifecycle.reached(SessionState::Closed),
        )
        .await
        .unwrap();

        assert_eq!(client.transport().shutdowns(), 1);
        let err = client
            .delete_topics(
                vec!["orders".into()],
                OperationOptions::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::SessionClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_operation_timeout_from_config() {
        let client = session(FakeTransport::new().with_default_latency(Duration::from_secs(600)));

        let start = Instant::now();
        let results = client
            .create_topics(
                vec![TopicSpecification::new("orders", 1, 1)],
                OperationOptions::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(60) && elapsed < Duration::from_secs(61));
        assert_eq!(results[0].reason(), Some(&FailureReason::TimedOut));
    }

    #[tokio::test]
    async fn test_default_operation_timeout_is_sent_with_request() {
        let raw = [
            (BOOTSTRAP_SERVERS.to_owned(), ConfigValue::from("localhost:9092")),
            ("admin.operation.timeout.ms".to_owned(), ConfigValue::Int(5000)),
        ]
        .into_iter()
        .collect();
        let config = AdminConfig::resolve(&raw).unwrap();
        let client = AdminClient::from_existing(config, Arc::new(FakeTransport::new()));

        client
            .create_topics(
                vec![TopicSpecification::new("orders", 1, 1)],
                OperationOptions::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        client
            .create_topics(
                vec![TopicSpecification::new("payments", 1, 1)],
                OperationOptions::new().operation_timeout(Duration::from_secs(60)),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            client.transport().operation_timeouts(),
            vec![Some(Duration::from_secs(5)), Some(Duration::from_secs(60))]
        );
    }

    #[tokio::test]
    async fn test_dropping_every_handle_cancels_session() {
        let parent = CancellationToken::new();
        let client: AdminClient<FakeTransport> =
            AdminClient::open_with_context(local_config(), &parent)
                .await
                .unwrap();
        let other = client.clone();
        let shutdown = client.inner.shutdown.clone();
        let transport = client.transport().clone();

        drop(client);
        assert!(!shutdown.is_cancelled());
        drop(other);
        assert!(shutdown.is_cancelled());

        parent.cancel();
        tokio::task::yield_now().await;
        assert_eq!(transport.shutdowns(), 0);
    }
}
