use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Not authenticated")]
    Unauthenticated,
    #[error("request rejected with status {status}: {message}")]
    RemoteRejected { status: u16, message: String },
    #[error("backend unreachable: {0}")]
    Unreachable(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("gateway channel closed: {0}")]
    Closed(String),
    #[error("cannot build http client: {0}")]
    ClientSetup(String),
}

impl GatewayError {
    /// Message suitable for showing to the user as is.
    pub fn user_message(&self) -> String {
        match self {
            GatewayError::RemoteRejected { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
