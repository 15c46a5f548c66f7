use std::fmt;

use rdkafka::error::KafkaError;
use thiserror::Error;

/// Failure to turn a raw option map into an [`AdminConfig`](crate::client_config::AdminConfig).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required option `{0}` is missing")]
    MissingKey(&'static str),

    #[error("unknown option `{0}`")]
    UnknownKey(String),

    #[error("option `{key}` expects a {expected} value")]
    InvalidType { key: String, expected: &'static str },

    #[error("option `{key}` is invalid: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("options `{0}` and `{1}` are mutually exclusive")]
    MutuallyExclusive(&'static str, &'static str),
}

/// Why a single entry of a batch was rejected before anything was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidSpecReason {
    EmptyName,
    DuplicateName,
    NonPositivePartitions(i32),
    NonPositiveReplicationFactor(i32),
    AssignmentLength { partitions: i32, rows: usize },
    EmptyAssignmentRow(usize),
}

impl fmt::Display for InvalidSpecReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "topic name must not be empty"),
            Self::DuplicateName => write!(f, "topic name appears more than once in the batch"),
            Self::NonPositivePartitions(n) => {
                write!(f, "partition count must be positive, got {n}")
            }
            Self::NonPositiveReplicationFactor(n) => {
                write!(f, "replication factor must be positive, got {n}")
            }
            Self::AssignmentLength { partitions, rows } => write!(
                f,
                "replica assignment has {rows} rows but the topic has {partitions} partitions"
            ),
            Self::EmptyAssignmentRow(partition) => {
                write!(f, "replica assignment for partition {partition} is empty")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSpecEntry {
    /// Position of the entry in the submitted batch.
    pub index: usize,
    pub name: String,
    pub reason: InvalidSpecReason,
}

/// A batch rejected wholesale. Lists every offending entry, not just the first.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct InvalidSpecError {
    pub entries: Vec<InvalidSpecEntry>,
}

impl InvalidSpecError {
    pub fn empty_batch() -> Self {
        Self { entries: vec![] }
    }

    pub fn is_empty_batch(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for InvalidSpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return write!(f, "invalid batch: expected at least one topic");
        }
        write!(f, "invalid batch:")?;
        for (i, entry) in self.entries.iter().enumerate() {
            let sep = if i == 0 { " " } else { "; " };
            write!(
                f,
                "{sep}#{} {:?}: {}",
                entry.index, entry.name, entry.reason
            )?;
        }
        Ok(())
    }
}

/// Errors raised by the connection handle underneath a session.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("kafka error: {0}")]
    Kafka(#[from] KafkaError),

    #[error("transport has been shut down")]
    Shutdown,

    #[error("{0}")]
    Other(String),
}

/// Top level errors of the administrative client.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("invalid client configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("unable to connect: {0}")]
    Connect(#[source] TransportError),

    #[error(transparent)]
    InvalidSpec(#[from] InvalidSpecError),

    #[error("request failed: {0}")]
    Dispatch(#[source] TransportError),

    #[error("admin session is closed")]
    SessionClosed,
}
