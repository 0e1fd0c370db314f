//! Gateway that hands every call to whoever holds the receiving end of a
//! channel, together with a oneshot to answer on. The host decides when and
//! in which order calls resolve.

use async_trait::async_trait;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::sync::oneshot;

use super::{bearer, GatewayError, TaskGateway};
use crate::model::{FilterCriteria, Session, Task, TaskDraft, TaskId, TaskPatch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayRequest {
    List(FilterCriteria),
    Create(TaskDraft),
    Update(TaskId, TaskPatch),
    Delete(TaskId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayResponse {
    List(Vec<Task>),
    Task(Task),
    Deleted,
    Error(GatewayError),
}

impl TryFrom<GatewayResponse> for Vec<Task> {
    type Error = GatewayError;

    fn try_from(value: GatewayResponse) -> Result<Self, Self::Error> {
        match value {
            GatewayResponse::List(tasks) => Ok(tasks),
            GatewayResponse::Error(err) => Err(err),
            other => Err(wrong_response(&other)),
        }
    }
}

impl TryFrom<GatewayResponse> for Task {
    type Error = GatewayError;

    fn try_from(value: GatewayResponse) -> Result<Self, Self::Error> {
        match value {
            GatewayResponse::Task(task) => Ok(task),
            GatewayResponse::Error(err) => Err(err),
            other => Err(wrong_response(&other)),
        }
    }
}

impl TryFrom<GatewayResponse> for () {
    type Error = GatewayError;

    fn try_from(value: GatewayResponse) -> Result<Self, Self::Error> {
        match value {
            GatewayResponse::Deleted => Ok(()),
            GatewayResponse::Error(err) => Err(err),
            other => Err(wrong_response(&other)),
        }
    }
}

fn wrong_response(response: &GatewayResponse) -> GatewayError {
    GatewayError::MalformedResponse(format!("unexpected response {:?}", response))
}

pub type RequestResponse = (GatewayRequest, oneshot::Sender<GatewayResponse>);

pub struct ChannelTaskGateway {
    tx: Sender<RequestResponse>,
}

impl ChannelTaskGateway {
    pub fn new(capacity: usize) -> (Self, Receiver<RequestResponse>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    async fn send<T>(&self, session: &Session, request: GatewayRequest) -> Result<T, GatewayError>
    where
        T: TryFrom<GatewayResponse, Error = GatewayError>,
    {
        bearer(session)?;
        let (req_sender, callback) = oneshot::channel();
        self.tx
            .send((request, req_sender))
            .await
            .map_err(|err| GatewayError::Closed(err.to_string()))?;

        let res = callback
            .await
            .map_err(|err| GatewayError::Closed(err.to_string()))?;
        T::try_from(res)
    }
}

#[async_trait]
impl TaskGateway for ChannelTaskGateway {
    async fn list(
        &self,
        session: &Session,
        criteria: &FilterCriteria,
    ) -> Result<Vec<Task>, GatewayError> {
        self.send(session, GatewayRequest::List(criteria.clone()))
            .await
    }

    async fn create(&self, session: &Session, draft: &TaskDraft) -> Result<Task, GatewayError> {
        self.send(session, GatewayRequest::Create(draft.clone()))
            .await
    }

    async fn update(
        &self,
        session: &Session,
        id: TaskId,
        patch: &TaskPatch,
    ) -> Result<Task, GatewayError> {
        self.send(session, GatewayRequest::Update(id, patch.clone()))
            .await
    }

    async fn delete(&self, session: &Session, id: TaskId) -> Result<(), GatewayError> {
        self.send(session, GatewayRequest::Delete(id)).await
    }
}
