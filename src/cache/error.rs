use thiserror::Error;

use crate::gateway::GatewayError;
use crate::model::{ModelError, TaskId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error(transparent)]
    Validation(#[from] ModelError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("task {0} has not been confirmed by the backend yet")]
    ProvisionalTask(TaskId),
}

impl CacheError {
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, CacheError::Gateway(GatewayError::Unauthenticated))
    }
}
