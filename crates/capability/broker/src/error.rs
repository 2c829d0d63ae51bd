use domain::ErrorKind;
use hub_server::ServerError;

/// 消息通道错误。
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("broker already running")]
    AlreadyRunning,
    #[error("broker requires a tokio runtime")]
    NoRuntime,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Server(#[from] ServerError),
}

impl BrokerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BrokerError::AlreadyRunning => ErrorKind::Conflict,
            BrokerError::NoRuntime => ErrorKind::Internal,
            BrokerError::Io(_) => ErrorKind::Io,
            BrokerError::Server(err) => err.kind(),
        }
    }
}
