use std::io::{self, Write};
use std::num::ParseIntError;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::Args;
use crate::config::Config;
use crate::error::AdminError;
use crate::request::{OperationOptions, TopicSpecification};
use crate::result::ResultSequence;
use crate::session::AdminClient;
use crate::transport::AdminTransport;

/// How long the create call may wait for the cluster.
pub const CREATE_TOPIC_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ArgumentError {
    #[error("Usage: {program} <bootstrap-servers> <topic> <partition-count> <replication-factor>")]
    Usage { program: String },

    #[error("Invalid partition count: {value}: {source}")]
    PartitionCount {
        value: String,
        source: ParseIntError,
    },

    #[error("Invalid replication factor: {value}: {source}")]
    ReplicationFactor {
        value: String,
        source: ParseIntError,
    },
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Failed to create Admin client: {0}")]
    Client(#[source] AdminError),

    #[error("Failed to create topic: {0}")]
    CreateTopics(#[source] AdminError),

    #[error("Failed to write results: {0}")]
    Output(#[from] io::Error),
}

/// A parsed create-topic invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTopicCommand {
    pub bootstrap_servers: String,
    pub topic: TopicSpecification,
}

impl TryFrom<&Args> for CreateTopicCommand {
    type Error = ArgumentError;

    fn try_from(args: &Args) -> Result<Self, Self::Error> {
        let partitions =
            args.partition_count
                .parse::<i32>()
                .map_err(|source| ArgumentError::PartitionCount {
                    value: args.partition_count.clone(),
                    source,
                })?;
        let replication_factor = args.replication_factor.parse::<i32>().map_err(|source| {
            ArgumentError::ReplicationFactor {
                value: args.replication_factor.clone(),
                source,
            }
        })?;

        Ok(CreateTopicCommand {
            bootstrap_servers: args.bootstrap_servers.clone(),
            topic: TopicSpecification::new(&args.topic, partitions, replication_factor),
        })
    }
}

/// Open a session for `command`, create the topic and print one line per result.
pub async fn run<T: AdminTransport>(
    command: CreateTopicCommand,
    config: &Config,
    cancel: &CancellationToken,
    out: &mut impl Write,
) -> Result<ResultSequence, CommandError> {
    let options = config.admin_client_options(&command.bootstrap_servers);
    let client = AdminClient::<T>::connect(&options)
        .await
        .map_err(CommandError::Client)?;

    let outcome = create_topic(&client, command.topic, cancel, out).await;
    client.close().await;
    outcome
}

/// Per-topic failures are printed, not returned as errors.
pub async fn create_topic<T: AdminTransport>(
    client: &AdminClient<T>,
    topic: TopicSpecification,
    cancel: &CancellationToken,
    out: &mut impl Write,
) -> Result<ResultSequence, CommandError> {
    info!(
        "Creating topic {:?} with {} partitions",
        topic.name, topic.num_partitions
    );
    let results = client
        .create_topics(
            vec![topic],
            OperationOptions::new().operation_timeout(CREATE_TOPIC_TIMEOUT),
            cancel,
        )
        .await
        .map_err(CommandError::CreateTopics)?;

    for result in &results {
        writeln!(out, "{result}")?;
    }
    out.flush()?;

    Ok(results)
}
