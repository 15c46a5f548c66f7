use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Deref;

use tracing::warn;

/// Why the broker (or the client) did not complete one item of a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailureReason {
    TopicAlreadyExists,
    UnknownTopic,
    InvalidPartitions,
    InvalidReplicationFactor,
    InvalidReplicaAssignment,
    InvalidConfig,
    PolicyViolation,
    NotController,
    /// Any other broker error, kept as reported.
    Broker { code: String, message: String },
    /// The batch deadline elapsed before a response for this item arrived.
    TimedOut,
    /// The call or the session was cancelled before a response arrived.
    Canceled,
    /// The transport finished without answering for this item.
    NoResponse,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TopicAlreadyExists => write!(f, "Topic already exists"),
            Self::UnknownTopic => write!(f, "Unknown topic or partition"),
            Self::InvalidPartitions => write!(f, "Invalid number of partitions"),
            Self::InvalidReplicationFactor => write!(f, "Invalid replication factor"),
            Self::InvalidReplicaAssignment => write!(f, "Invalid replica assignment"),
            Self::InvalidConfig => write!(f, "Configuration is invalid"),
            Self::PolicyViolation => write!(f, "Request parameters do not satisfy the policy"),
            Self::NotController => write!(f, "This is not the correct controller"),
            Self::Broker { code, message } => write!(f, "{message} ({code})"),
            Self::TimedOut => write!(f, "Operation timed out"),
            Self::Canceled => write!(f, "Operation canceled"),
            Self::NoResponse => write!(f, "No response received"),
        }
    }
}

/// A single answer from the cluster, before it is put back in request order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemResponse {
    pub name: String,
    pub outcome: Result<(), FailureReason>,
}

impl ItemResponse {
    pub fn success(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: Ok(()),
        }
    }

    pub fn failure(name: impl Into<String>, reason: FailureReason) -> Self {
        Self {
            name: name.into(),
            outcome: Err(reason),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TopicResult {
    Success(String),
    Failure(String, FailureReason),
}

impl TopicResult {
    pub fn name(&self) -> &str {
        match self {
            Self::Success(name) | Self::Failure(name, _) => name,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn reason(&self) -> Option<&FailureReason> {
        match self {
            Self::Success(_) => None,
            Self::Failure(_, reason) => Some(reason),
        }
    }
}

impl fmt::Display for TopicResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(name) => write!(f, "{name}"),
            Self::Failure(name, reason) => write!(f, "{name} ({reason})"),
        }
    }
}

/// Outcomes of one dispatch, in the order the items were submitted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResultSequence(Vec<TopicResult>);

impl ResultSequence {
    pub fn all_succeeded(&self) -> bool {
        self.0.iter().all(TopicResult::is_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &TopicResult> {
        self.0.iter().filter(|result| !result.is_success())
    }

    pub fn into_inner(self) -> Vec<TopicResult> {
        self.0
    }
}

impl Deref for ResultSequence {
    type Target = [TopicResult];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl IntoIterator for ResultSequence {
    type Item = TopicResult;
    type IntoIter = std::vec::IntoIter<TopicResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSequence {
    type Item = &'a TopicResult;
    type IntoIter = std::slice::Iter<'a, TopicResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Put raw responses back into request order. Items without a response are
/// reported as failed with `missing`. Responses for names that were not
/// requested, and repeats of a name already answered, are dropped.
pub fn aggregate(
    requested: &[String],
    responses: Vec<ItemResponse>,
    missing: FailureReason,
) -> ResultSequence {
    let wanted: HashSet<&str> = requested.iter().map(String::as_str).collect();
    let mut by_name: HashMap<String, Result<(), FailureReason>> =
        HashMap::with_capacity(responses.len());
    for response in responses {
        if !wanted.contains(response.name.as_str()) {
            warn!("Dropping response for unrequested topic {:?}", response.name);
            continue;
        }
        if by_name.contains_key(&response.name) {
            warn!("Dropping repeated response for topic {:?}", response.name);
            continue;
        }
        by_name.insert(response.name, response.outcome);
    }

    ResultSequence(
        requested
            .iter()
            .map(|name| match by_name.remove(name) {
                Some(Ok(())) => TopicResult::Success(name.clone()),
                Some(Err(reason)) => TopicResult::Failure(name.clone(), reason),
                None => TopicResult::Failure(name.clone(), missing.clone()),
            })
            .collect(),
    )
}
