use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpToolsError {
    #[error("invalid header: {0}")]
    Header(String),
    #[error("http transport error: {0}")]
    Transport(String),
    #[error("response too large: {0}")]
    TooLarge(String),
}

pub type Result<T> = std::result::Result<T, HttpToolsError>;

impl From<reqwest::Error> for HttpToolsError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(crate::redact::transport_error_message(&value))
    }
}
