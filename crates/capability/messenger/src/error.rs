use domain::ErrorKind;

/// 消息客户端错误。
#[derive(Debug, thiserror::Error)]
pub enum MessengerError {
    #[error("not connected")]
    NoConnection,
    #[error("connect to {0} timed out")]
    Timeout(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("transport error: {0}")]
    Transport(String),
}

impl MessengerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MessengerError::NoConnection | MessengerError::Transport(_) => ErrorKind::Io,
            MessengerError::Timeout(_) => ErrorKind::Timeout,
            MessengerError::InvalidAddress(_) | MessengerError::InvalidPayload(_) => {
                ErrorKind::Validation
            }
        }
    }
}

impl From<hub_server::ServerError> for MessengerError {
    fn from(err: hub_server::ServerError) -> Self {
        MessengerError::Transport(err.to_string())
    }
}
