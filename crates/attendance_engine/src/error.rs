use thiserror::Error;

/// Failure of a call to the attendance server.
///
/// `Display` is what ends up in the user's toast.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("http status {0}")]
    HttpStatus(u16),
    /// The server answered with `success: false` or an `error` body.
    #[error("{message}")]
    Server { status: Option<u16>, message: String },
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("io error: {0}")]
    Io(String),
}

impl ApiError {
    pub(crate) fn server(status: Option<u16>, message: impl Into<String>) -> Self {
        ApiError::Server {
            status,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ApiError::Timeout;
        }
        if err.is_decode() {
            return ApiError::Decode(err.to_string());
        }
        ApiError::Network(err.to_string())
    }
}

impl From<crate::persist::PersistError> for ApiError {
    fn from(err: crate::persist::PersistError) -> Self {
        ApiError::Io(err.to_string())
    }
}
