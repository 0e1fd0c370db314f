use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{bearer, GatewayError, TaskGateway};
use crate::model::{FilterCriteria, Session, Task, TaskDraft, TaskId, TaskPatch};

/// REST gateway to the task backend.
pub struct HttpTaskGateway {
    client: Client,
    base: String,
}

impl HttpTaskGateway {
    pub fn new(
        base_url: &Url,
        timeout: Option<Duration>,
        user_agent: Option<&str>,
    ) -> Result<Self, GatewayError> {
        let mut builder = Client::builder().user_agent(user_agent.unwrap_or(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        )));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| GatewayError::ClientSetup(err.to_string()))?;
        Ok(Self {
            client,
            base: base_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn collection(&self) -> String {
        format!("{}/tasks/", self.base)
    }

    fn item(&self, id: TaskId) -> String {
        format!("{}/tasks/{}", self.base, id)
    }

    async fn send(
        request: RequestBuilder,
        token: &str,
        fallback: &str,
    ) -> Result<Response, GatewayError> {
        let response = request
            .bearer_auth(token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| GatewayError::Unreachable(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = detail_message(&body).unwrap_or_else(|| fallback.to_string());
        warn!(status = status.as_u16(), reason = %message, "backend rejected request");
        Err(GatewayError::RemoteRejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
        let body = response
            .bytes()
            .await
            .map_err(|err| GatewayError::Unreachable(err.to_string()))?;
        serde_json::from_slice(&body).map_err(|err| GatewayError::MalformedResponse(err.to_string()))
    }
}

/// Extracts `detail` from a `{ "detail": "..." }` error body.
fn detail_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("detail")
        .and_then(|detail| detail.as_str())
        .filter(|detail| !detail.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl TaskGateway for HttpTaskGateway {
    #[instrument(skip(self, session))]
    async fn list(
        &self,
        session: &Session,
        criteria: &FilterCriteria,
    ) -> Result<Vec<Task>, GatewayError> {
        let token = bearer(session)?;
        let request = self.client.get(self.collection()).query(criteria);
        let response = Self::send(request, token, "Failed to fetch tasks").await?;
        let tasks: Vec<Task> = Self::decode(response).await?;
        debug!(count = tasks.len(), "tasks fetched");
        Ok(tasks)
    }

    #[instrument(skip(self, session, draft), fields(title = %draft.title))]
    async fn create(&self, session: &Session, draft: &TaskDraft) -> Result<Task, GatewayError> {
        let token = bearer(session)?;
        let request = self.client.post(self.collection()).json(draft);
        let response = Self::send(request, token, "Failed to create task").await?;
        let task: Task = Self::decode(response).await?;
        debug!(task_id = %task.id, "task created");
        Ok(task)
    }

    #[instrument(skip(self, session, patch), fields(task_id = %id))]
    async fn update(
        &self,
        session: &Session,
        id: TaskId,
        patch: &TaskPatch,
    ) -> Result<Task, GatewayError> {
        let token = bearer(session)?;
        let request = self.client.put(self.item(id)).json(patch);
        let response = Self::send(request, token, "Failed to update task").await?;
        Self::decode(response).await
    }

    #[instrument(skip(self, session), fields(task_id = %id))]
    async fn delete(&self, session: &Session, id: TaskId) -> Result<(), GatewayError> {
        let token = bearer(session)?;
        let request = self.client.delete(self.item(id));
        Self::send(request, token, "Failed to delete task").await?;
        Ok(())
    }
}
