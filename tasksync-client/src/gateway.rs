//! Boundary to the remote task service.

use crate::errors::GatewayError;
use async_trait::async_trait;
use reqwest::{Method, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tasksync_core::protocol::{DeleteResponse, HttpMethod, RemoteCall};
use tasksync_core::{Section, Task, TaskDraft, TaskId, TaskPatch};

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Remote CRUD surface the engine depends on.
///
/// Any `Err` is a transient failure: the caller goes offline and falls back
/// to local state.
#[async_trait]
pub trait TaskGateway: Send + Sync {
    async fn list(&self, section: Section) -> GatewayResult<Vec<Task>>;

    async fn get(&self, id: &TaskId) -> GatewayResult<Task>;

    async fn create(&self, draft: &TaskDraft) -> GatewayResult<Task>;

    async fn update(&self, id: &TaskId, patch: &TaskPatch) -> GatewayResult<Task>;

    async fn delete(&self, id: &TaskId) -> GatewayResult<bool>;

    async fn complete(&self, id: &TaskId) -> GatewayResult<Task>;

    async fn activate(&self, id: &TaskId) -> GatewayResult<Task>;

    /// Cheap reachability check bounded by `timeout`.
    async fn health(&self, timeout: Duration) -> GatewayResult<()>;
}

pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> GatewayResult<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(
        &self,
        call: &RemoteCall,
        body: Option<String>,
        timeout: Duration,
    ) -> GatewayResult<Response> {
        let path = call.path();
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("CLIENT: {} {}", call.method(), url);

        let mut request = self
            .client
            .request(to_reqwest_method(call.method()), &url)
            .timeout(timeout);
        if let Some(body) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout(timeout)
            } else {
                GatewayError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                path,
            });
        }
        Ok(response)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        call: RemoteCall,
        body: Option<String>,
    ) -> GatewayResult<T> {
        let response = self.send(&call, body, self.request_timeout).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::Decode(format!("{}: {}", call.path(), e)))
    }
}

#[async_trait]
impl TaskGateway for HttpGateway {
    async fn list(&self, section: Section) -> GatewayResult<Vec<Task>> {
        self.call(RemoteCall::ListSection(section), None).await
    }

    async fn get(&self, id: &TaskId) -> GatewayResult<Task> {
        self.call(RemoteCall::GetTask(id.clone()), None).await
    }

    async fn create(&self, draft: &TaskDraft) -> GatewayResult<Task> {
        self.call(RemoteCall::CreateTask, Some(json_body(draft)?))
            .await
    }

    async fn update(&self, id: &TaskId, patch: &TaskPatch) -> GatewayResult<Task> {
        self.call(RemoteCall::UpdateTask(id.clone()), Some(json_body(patch)?))
            .await
    }

    async fn delete(&self, id: &TaskId) -> GatewayResult<bool> {
        let call = RemoteCall::DeleteTask(id.clone());
        let response = self.send(&call, None, self.request_timeout).await?;
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(true);
        }
        serde_json::from_str::<DeleteResponse>(&body)
            .map(|r| r.success)
            .map_err(|e| GatewayError::Decode(format!("{}: {}", call.path(), e)))
    }

    async fn complete(&self, id: &TaskId) -> GatewayResult<Task> {
        self.call(RemoteCall::CompleteTask(id.clone()), None).await
    }

    async fn activate(&self, id: &TaskId) -> GatewayResult<Task> {
        self.call(RemoteCall::ActivateTask(id.clone()), None).await
    }

    async fn health(&self, timeout: Duration) -> GatewayResult<()> {
        self.send(&RemoteCall::Health, None, timeout).await?;
        Ok(())
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn json_body<B: Serialize>(body: &B) -> GatewayResult<String> {
    serde_json::to_string(body).map_err(|e| GatewayError::Decode(format!("request body: {}", e)))
}
