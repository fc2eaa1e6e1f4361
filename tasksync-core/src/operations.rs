use crate::dates::iso8601_option;
use crate::models::{Task, TaskId};
use crate::protocol::RemoteCall;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OperationType {
    Create,
    Update,
    Delete,
    Complete,
    Activate,
}

/// A mutation applied locally that the remote has not confirmed yet.
///
/// Records are immutable once queued; they leave the log only after their
/// replay succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub op_type: OperationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Task>,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl PendingOperation {
    fn new(id: TaskId, op_type: OperationType, data: Option<Task>) -> Self {
        Self {
            id,
            op_type,
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn create(task: Task) -> Self {
        Self::new(task.id.clone(), OperationType::Create, Some(task))
    }

    pub fn update(task: Task) -> Self {
        Self::new(task.id.clone(), OperationType::Update, Some(task))
    }

    pub fn delete(id: TaskId) -> Self {
        Self::new(id, OperationType::Delete, None)
    }

    pub fn complete(task: Task) -> Self {
        Self::new(task.id.clone(), OperationType::Complete, Some(task))
    }

    pub fn activate(task: Task) -> Self {
        Self::new(task.id.clone(), OperationType::Activate, Some(task))
    }

    /// The remote call that replays this operation against `target`.
    pub fn remote_call(&self, target: &TaskId) -> RemoteCall {
        match self.op_type {
            OperationType::Create => RemoteCall::CreateTask,
            OperationType::Update => RemoteCall::UpdateTask(target.clone()),
            OperationType::Delete => RemoteCall::DeleteTask(target.clone()),
            OperationType::Complete => RemoteCall::CompleteTask(target.clone()),
            OperationType::Activate => RemoteCall::ActivateTask(target.clone()),
        }
    }
}

mod timestamp {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        iso8601_option::serialize(&Some(*value), serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        iso8601_option::deserialize(deserializer)?
            .ok_or_else(|| serde::de::Error::custom("timestamp must not be null"))
    }
}
