mod channel;
mod error;
mod http;
mod memory;

use async_trait::async_trait;

use crate::model::{FilterCriteria, Session, Task, TaskDraft, TaskId, TaskPatch};

pub use channel::{ChannelTaskGateway, GatewayRequest, GatewayResponse, RequestResponse};
pub use error::GatewayError;
pub use http::HttpTaskGateway;
pub use memory::MemoryTaskGateway;

/// Remote side of the task collection. Implementations must fail with
/// `Unauthenticated` before any I/O when the session carries no token, and
/// must not retry.
#[async_trait]
pub trait TaskGateway: Send + Sync + 'static {
    async fn list(
        &self,
        session: &Session,
        criteria: &FilterCriteria,
    ) -> Result<Vec<Task>, GatewayError>;
    async fn create(&self, session: &Session, draft: &TaskDraft) -> Result<Task, GatewayError>;
    async fn update(
        &self,
        session: &Session,
        id: TaskId,
        patch: &TaskPatch,
    ) -> Result<Task, GatewayError>;
    async fn delete(&self, session: &Session, id: TaskId) -> Result<(), GatewayError>;
}

pub(crate) fn bearer(session: &Session) -> Result<&str, GatewayError> {
    session.token().ok_or(GatewayError::Unauthenticated)
}
