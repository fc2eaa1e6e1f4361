//! The HTTP surface of the remote task service.
//!
//! Only the shape lives here (methods, paths, small response bodies); the
//! transport is the client's concern.

use crate::models::{Section, TaskId};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Health,
    ListSection(Section),
    GetTask(TaskId),
    CreateTask,
    UpdateTask(TaskId),
    DeleteTask(TaskId),
    CompleteTask(TaskId),
    ActivateTask(TaskId),
}

impl RemoteCall {
    pub fn method(&self) -> HttpMethod {
        match self {
            RemoteCall::Health | RemoteCall::ListSection(_) | RemoteCall::GetTask(_) => {
                HttpMethod::Get
            }
            RemoteCall::CreateTask | RemoteCall::CompleteTask(_) | RemoteCall::ActivateTask(_) => {
                HttpMethod::Post
            }
            RemoteCall::UpdateTask(_) => HttpMethod::Put,
            RemoteCall::DeleteTask(_) => HttpMethod::Delete,
        }
    }

    pub fn path(&self) -> String {
        match self {
            RemoteCall::Health => "/health".to_string(),
            RemoteCall::ListSection(section) => format!("/tasks/{}", section),
            RemoteCall::CreateTask => "/task".to_string(),
            RemoteCall::GetTask(id) | RemoteCall::UpdateTask(id) | RemoteCall::DeleteTask(id) => {
                format!("/task/{}", segment(id))
            }
            RemoteCall::CompleteTask(id) => format!("/task/{}/complete", segment(id)),
            RemoteCall::ActivateTask(id) => format!("/task/{}/activate", segment(id)),
        }
    }
}

/// Ids are opaque; reserved characters must not change the route.
fn segment(id: &TaskId) -> Cow<'_, str> {
    urlencoding::encode(id.as_str())
}

/// Body of a `DELETE /task/{id}` response.
///
/// Servers that answer with only a message still count as success when the
/// status was 2xx.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteResponse {
    #[serde(default = "default_success")]
    pub success: bool,
}

fn default_success() -> bool {
    true
}
