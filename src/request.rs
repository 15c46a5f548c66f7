use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use uuid::Uuid;

use crate::error::{InvalidSpecEntry, InvalidSpecError, InvalidSpecReason};

/// How the replicas of a new topic are placed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplicaPlacement {
    /// Let the cluster place this many replicas per partition.
    Factor(i32),

    /// Explicit broker ids, one row per partition.
    Assignment(Vec<Vec<i32>>),
}

/// Description of a topic to create.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicSpecification {
    pub name: String,
    pub num_partitions: i32,
    pub replication: ReplicaPlacement,

    /// Topic level configuration, e.g. `cleanup.policy`.
    pub config: BTreeMap<String, String>,
}

impl TopicSpecification {
    pub fn new(name: impl Into<String>, num_partitions: i32, replication_factor: i32) -> Self {
        Self {
            name: name.into(),
            num_partitions,
            replication: ReplicaPlacement::Factor(replication_factor),
            config: BTreeMap::new(),
        }
    }

    pub fn with_assignment(name: impl Into<String>, assignment: Vec<Vec<i32>>) -> Self {
        Self {
            name: name.into(),
            num_partitions: partition_count(assignment.len()),
            replication: ReplicaPlacement::Assignment(assignment),
            config: BTreeMap::new(),
        }
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    fn problems(&self) -> Vec<InvalidSpecReason> {
        let mut problems = vec![];
        if self.name.is_empty() {
            problems.push(InvalidSpecReason::EmptyName);
        }
        if self.num_partitions <= 0 {
            problems.push(InvalidSpecReason::NonPositivePartitions(self.num_partitions));
        }
        match &self.replication {
            ReplicaPlacement::Factor(factor) if *factor <= 0 => {
                problems.push(InvalidSpecReason::NonPositiveReplicationFactor(*factor));
            }
            ReplicaPlacement::Factor(_) => {}
            ReplicaPlacement::Assignment(rows) => {
                if rows.len() as i64 != self.num_partitions as i64 {
                    problems.push(InvalidSpecReason::AssignmentLength {
                        partitions: self.num_partitions,
                        rows: rows.len(),
                    });
                }
                if let Some(partition) = rows.iter().position(Vec::is_empty) {
                    problems.push(InvalidSpecReason::EmptyAssignmentRow(partition));
                }
            }
        }
        problems
    }
}

/// Saturates, so an assignment with more rows than a partition count can hold
/// is rejected as a length mismatch.
fn partition_count(rows: usize) -> i32 {
    i32::try_from(rows).unwrap_or(i32::MAX)
}

/// Per call options. Never stored on the session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OperationOptions {
    /// Ceiling for the whole batch. Falls back to the session default.
    pub operation_timeout: Option<Duration>,

    /// Ask the broker to validate the request without applying it.
    pub validate_only: bool,
}

impl OperationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    pub fn validate_only(mut self, validate_only: bool) -> Self {
        self.validate_only = validate_only;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestKind {
    CreateTopics(Vec<TopicSpecification>),
    DeleteTopics(Vec<String>),
}

/// A validated batch, ready to hand to a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminRequest {
    /// Correlates log lines of one dispatch.
    pub id: Uuid,
    pub kind: RequestKind,
    pub operation_timeout: Option<Duration>,
    pub validate_only: bool,
}

impl AdminRequest {
    fn new(kind: RequestKind, options: OperationOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            operation_timeout: options.operation_timeout,
            validate_only: options.validate_only,
        }
    }

    /// Names of the items in submission order. Results are reported in this order.
    pub fn item_names(&self) -> Vec<String> {
        match &self.kind {
            RequestKind::CreateTopics(specs) => specs.iter().map(|s| s.name.clone()).collect(),
            RequestKind::DeleteTopics(names) => names.clone(),
        }
    }

    pub fn len(&self) -> usize {
        match &self.kind {
            RequestKind::CreateTopics(specs) => specs.len(),
            RequestKind::DeleteTopics(names) => names.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn operation(&self) -> &'static str {
        match &self.kind {
            RequestKind::CreateTopics(_) => "create_topics",
            RequestKind::DeleteTopics(_) => "delete_topics",
        }
    }
}

/// Validate every specification and build a create-topics request. Nothing is
/// built if any entry is invalid.
pub fn build_create_topics(
    specs: Vec<TopicSpecification>,
    options: OperationOptions,
) -> Result<AdminRequest, InvalidSpecError> {
    if specs.is_empty() {
        return Err(InvalidSpecError::empty_batch());
    }

    let mut entries = duplicate_entries(specs.iter().map(|spec| spec.name.as_str()));
    for (index, spec) in specs.iter().enumerate() {
        entries.extend(spec.problems().into_iter().map(|reason| InvalidSpecEntry {
            index,
            name: spec.name.clone(),
            reason,
        }));
    }
    if !entries.is_empty() {
        entries.sort_by_key(|entry| entry.index);
        return Err(InvalidSpecError { entries });
    }

    Ok(AdminRequest::new(RequestKind::CreateTopics(specs), options))
}

pub fn build_delete_topics(
    names: Vec<String>,
    options: OperationOptions,
) -> Result<AdminRequest, InvalidSpecError> {
    if names.is_empty() {
        return Err(InvalidSpecError::empty_batch());
    }

    let mut entries = duplicate_entries(names.iter().map(String::as_str));
    for (index, name) in names.iter().enumerate() {
        if name.is_empty() {
            entries.push(InvalidSpecEntry {
                index,
                name: name.clone(),
                reason: InvalidSpecReason::EmptyName,
            });
        }
    }
    if !entries.is_empty() {
        entries.sort_by_key(|entry| entry.index);
        return Err(InvalidSpecError { entries });
    }

    Ok(AdminRequest::new(RequestKind::DeleteTopics(names), options))
}

/// Every repeated occurrence of a name after its first one.
fn duplicate_entries<'a>(names: impl Iterator<Item = &'a str>) -> Vec<InvalidSpecEntry> {
    let mut seen = HashSet::new();
    names
        .enumerate()
        .filter(|(_, name)| !name.is_empty() && !seen.insert(*name))
        .map(|(index, name)| InvalidSpecEntry {
            index,
            name: name.to_owned(),
            reason: InvalidSpecReason::DuplicateName,
        })
        .collect()
}
