use std::sync::Arc;

use futures::{StreamExt, stream};
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication, TopicResult};
use rdkafka::client::DefaultClientContext;
use rdkafka::types::RDKafkaErrorCode;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{AdminTransport, ResponseStream};
use crate::client_config::AdminConfig;
use crate::error::TransportError;
use crate::request::{AdminRequest, ReplicaPlacement, RequestKind};
use crate::result::{FailureReason, ItemResponse};

type RdAdminClient = AdminClient<DefaultClientContext>;

/// Admin transport backed by librdkafka.
///
/// Clones share the same native client, so a handle can be passed to other
/// components talking to the same cluster instead of opening a second one.
#[derive(Clone)]
pub struct KafkaTransport {
    client: Arc<RwLock<Option<Arc<RdAdminClient>>>>,
}

impl KafkaTransport {
    pub fn new(config: &AdminConfig) -> Result<Self, TransportError> {
        let client: RdAdminClient = config.to_client_config().create()?;
        info!(
            "Created kafka admin client for {}",
            config.bootstrap_servers().join(",")
        );
        Ok(Self {
            client: Arc::new(RwLock::new(Some(Arc::new(client)))),
        })
    }
}

impl AdminTransport for KafkaTransport {
    async fn connect(config: &AdminConfig) -> Result<Self, TransportError> {
        Self::new(config)
    }

    fn send(&self, request: AdminRequest) -> ResponseStream {
        let handle = self.client.clone();
        stream::once(async move {
            let client = handle.read().await.clone().ok_or(TransportError::Shutdown)?;
            execute(&client, request).await
        })
        .flat_map(|result| match result {
            Ok(responses) => stream::iter(responses.into_iter().map(Ok::<_, TransportError>)).left_stream(),
            Err(e) => stream::iter([Err(e)]).right_stream(),
        })
        .boxed()
    }

    async fn shutdown(&self) {
        // In-flight requests keep their own reference, the native client is
        // destroyed once the last of them completes.
        let Some(client) = self.client.write().await.take() else {
            return;
        };
        // Destroying the native client joins its polling thread.
        if let Err(e) = tokio::task::spawn_blocking(move || drop(client)).await {
            warn!("Failed to release kafka admin client: {e}");
            return;
        }
        debug!("Released kafka admin client");
    }
}

async fn execute(
    client: &RdAdminClient,
    request: AdminRequest,
) -> Result<Vec<ItemResponse>, TransportError> {
    let mut options = AdminOptions::new().validate_only(request.validate_only);
    if let Some(timeout) = request.operation_timeout {
        options = options
            .operation_timeout(Some(timeout))
            .request_timeout(Some(timeout));
    }

    let results = match &request.kind {
        RequestKind::CreateTopics(specs) => {
            let assignments: Vec<Vec<&[i32]>> = specs
                .iter()
                .map(|spec| match &spec.replication {
                    ReplicaPlacement::Assignment(rows) => rows.iter().map(Vec::as_slice).collect(),
                    ReplicaPlacement::Factor(_) => vec![],
                })
                .collect();

            let topics: Vec<NewTopic<'_>> = specs
                .iter()
                .zip(&assignments)
                .map(|(spec, rows)| {
                    let replication = match &spec.replication {
                        ReplicaPlacement::Factor(factor) => TopicReplication::Fixed(*factor),
                        ReplicaPlacement::Assignment(_) => {
                            TopicReplication::Variable(rows.as_slice())
                        }
                    };
                    spec.config.iter().fold(
                        NewTopic::new(&spec.name, spec.num_partitions, replication),
                        |topic, (key, value)| topic.set(key, value),
                    )
                })
                .collect();

            client.create_topics(&topics, &options).await?
        }
        RequestKind::DeleteTopics(names) => {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            client.delete_topics(&names, &options).await?
        }
    };

    Ok(results.into_iter().map(into_response).collect())
}

fn into_response(result: TopicResult) -> ItemResponse {
    match result {
        Ok(name) => ItemResponse::success(name),
        Err((name, code)) => ItemResponse::failure(name, failure_reason(code)),
    }
}

pub(crate) fn failure_reason(code: RDKafkaErrorCode) -> FailureReason {
    match code {
        RDKafkaErrorCode::TopicAlreadyExists => FailureReason::TopicAlreadyExists,
        RDKafkaErrorCode::UnknownTopicOrPartition => FailureReason::UnknownTopic,
        RDKafkaErrorCode::InvalidPartitions => FailureReason::InvalidPartitions,
        RDKafkaErrorCode::InvalidReplicationFactor => FailureReason::InvalidReplicationFactor,
        RDKafkaErrorCode::InvalidReplicaAssignment => FailureReason::InvalidReplicaAssignment,
        RDKafkaErrorCode::InvalidConfig => FailureReason::InvalidConfig,
        RDKafkaErrorCode::PolicyViolation => FailureReason::PolicyViolation,
        RDKafkaErrorCode::NotController => FailureReason::NotController,
        RDKafkaErrorCode::RequestTimedOut | RDKafkaErrorCode::OperationTimedOut => {
            FailureReason::TimedOut
        }
        other => FailureReason::Broker {
            code: format!("{other:?}"),
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{OperationOptions, TopicSpecification, build_create_topics};
    use crate::test_utils::local_config;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shutdown_releases_client() {
        let transport = KafkaTransport::new(&local_config()).unwrap();
        let shared = transport.clone();

        transport.shutdown().await;
        assert!(shared.client.read().await.is_none());
        // A second shutdown has nothing left to release.
        shared.shutdown().await;

        let request = build_create_topics(
            vec![TopicSpecification::new("orders", 1, 1)],
            OperationOptions::new(),
        )
        .unwrap();
        let responses: Vec<_> = shared.send(request).collect().await;
        assert!(matches!(responses[..], [Err(TransportError::Shutdown)]));
    }

    #[test]
    fn test_failure_reason_mapping() {
        assert_eq!(
            failure_reason(RDKafkaErrorCode::TopicAlreadyExists),
            FailureReason::TopicAlreadyExists
        );
        assert_eq!(
            failure_reason(RDKafkaErrorCode::InvalidReplicationFactor),
            FailureReason::InvalidReplicationFactor
        );
        assert_eq!(
            failure_reason(RDKafkaErrorCode::RequestTimedOut),
            FailureReason::TimedOut
        );
        assert!(matches!(
            failure_reason(RDKafkaErrorCode::BrokerNotAvailable),
            FailureReason::Broker { code, .. } if code == "BrokerNotAvailable"
        ));
    }

    #[test]
    fn test_into_response() {
        assert_eq!(into_response(Ok("orders".into())), ItemResponse::success("orders"));
        assert_eq!(
            into_response(Err(("orders".into(), RDKafkaErrorCode::TopicAlreadyExists))),
            ItemResponse::failure("orders", FailureReason::TopicAlreadyExists)
        );
    }
}
