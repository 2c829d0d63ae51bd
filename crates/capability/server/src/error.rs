use domain::ErrorKind;

/// TLS 服务相关错误。
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("tls configuration error: {0}")]
    Tls(String),
    #[error("certificate error: {0}")]
    Certificate(String),
    #[error("no {kind} found in {path}")]
    MissingPem { kind: &'static str, path: String },
}

impl ServerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServerError::Io(_) => ErrorKind::Io,
            ServerError::Tls(_) | ServerError::Certificate(_) | ServerError::MissingPem { .. } => {
                ErrorKind::Validation
            }
        }
    }
}

impl From<rustls::Error> for ServerError {
    fn from(err: rustls::Error) -> Self {
        ServerError::Tls(err.to_string())
    }
}

impl From<rcgen::Error> for ServerError {
    fn from(err: rcgen::Error) -> Self {
        ServerError::Certificate(err.to_string())
    }
}
